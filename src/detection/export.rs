/// Export of detection sets
///
/// Plain-text artifact, one line per detection:
/// `label\tconfidence\tx1,y1,x2,y2\tpx1,py1,...,px4,py4`
/// where the second group is the axis-aligned box around the polygon.
use std::borrow::Borrow;
use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use super::{polygon_bounds, Detection};
use crate::error::Result;

/// Accepts owned detections or the borrowed output of a filter pass.
pub fn to_labels_txt<D: Borrow<Detection>>(detections: &[D]) -> String {
    let mut out = String::new();
    for det in detections {
        let det: &Detection = det.borrow();
        let (x1, y1, x2, y2) = polygon_bounds(&det.polygon);
        let poly = det
            .polygon
            .iter()
            .flat_map(|p| [p.x as i64, p.y as i64])
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(
            "{}\t{:.6}\t{},{},{},{}\t{}\n",
            det.label, det.confidence, x1 as i64, y1 as i64, x2 as i64, y2 as i64, poly
        ));
    }
    out
}

pub fn write_labels_txt<D: Borrow<Detection>>(path: &Path, detections: &[D]) -> Result<()> {
    fs::write(path, to_labels_txt(detections))?;
    info!("Wrote {} detection(s) to {}", detections.len(), path.display());
    Ok(())
}

pub fn write_json<D: Serialize>(path: &Path, detections: &[D]) -> Result<()> {
    let json = serde_json::to_string_pretty(detections)?;
    fs::write(path, json)?;
    info!("Wrote {} detection(s) as JSON to {}", detections.len(), path.display());
    Ok(())
}
