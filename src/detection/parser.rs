/// Detector response normalization
///
/// The detector service has shipped several field-naming conventions over
/// time (`poly` vs `polygon` vs `bbox_xyxyxyxy`, `confidence` vs `conf`, ...).
/// This module folds all of them into the core `Detection` model so that no
/// foreign shape ever reaches geometry or color code. Entries that cannot be
/// normalized are dropped one by one; they never abort the batch.
use std::str::FromStr;

use log::{debug, warn};
use serde_json::{Map, Value};

use super::{Detection, ImageMeta, Point, Polygon};
use crate::error::{OverlayError, Result};

const CLASS_NAME_FIELDS: &[&str] = &["class_name", "class", "label", "name"];
const CLASS_ID_FIELDS: &[&str] = &["class_id", "cls"];
const CONFIDENCE_FIELDS: &[&str] = &["confidence", "conf", "score"];
const POLYGON_FIELDS: &[&str] = &["poly", "polygon", "xyxyxyxy", "bbox_xyxyxyxy", "points"];
const LIST_FIELDS: &[&str] = &["detections", "predictions", "results"];

/// A detector response after boundary normalization
#[derive(Debug, Default)]
pub struct ParsedResponse {
    /// Valid detections in response order.
    pub detections: Vec<Detection>,
    /// Image metadata, if the response carried usable dimensions.
    pub meta: Option<ImageMeta>,
    /// One `MalformedDetection` per dropped entry.
    pub skipped: Vec<OverlayError>,
}

impl FromStr for ParsedResponse {
    type Err = OverlayError;

    /// Parse a raw JSON response body
    fn from_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Ok(Self::from_value(&value))
    }
}

impl ParsedResponse {
    /// Normalize an already-decoded JSON response
    pub fn from_value(value: &Value) -> Self {
        let entries: &[Value] = match value {
            Value::Array(items) => items,
            Value::Object(obj) => LIST_FIELDS
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        };

        let mut parsed = ParsedResponse {
            meta: value.as_object().and_then(parse_meta),
            ..Default::default()
        };

        for (index, entry) in entries.iter().enumerate() {
            match normalize_detection(index, entry) {
                Ok(det) => parsed.detections.push(det),
                Err(e) => {
                    warn!("Skipping detection: {}", e);
                    parsed.skipped.push(e);
                }
            }
        }

        debug!(
            "Normalized response: {} detections kept, {} skipped, meta={:?}",
            parsed.detections.len(),
            parsed.skipped.len(),
            parsed.meta
        );
        parsed
    }
}

/// Read `{image_width, image_height}` or one of its aliases.
fn parse_meta(obj: &Map<String, Value>) -> Option<ImageMeta> {
    let pairs = [("image_width", "image_height"), ("width", "height")];

    for (w_key, h_key) in pairs {
        if let (Some(w), Some(h)) = (obj.get(w_key).and_then(as_int), obj.get(h_key).and_then(as_int)) {
            match ImageMeta::new(w, h) {
                Ok(meta) => return Some(meta),
                Err(e) => warn!("Ignoring response metadata: {}", e),
            }
        }
    }

    ["meta", "image"]
        .iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_object))
        .find_map(parse_meta)
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_detection(index: usize, entry: &Value) -> Result<Detection> {
    let malformed = |reason: &str| OverlayError::MalformedDetection {
        index,
        reason: reason.to_string(),
    };

    let obj = entry.as_object().ok_or_else(|| malformed("entry is not an object"))?;

    let confidence = first_field(obj, CONFIDENCE_FIELDS)
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("missing numeric confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(malformed(&format!("confidence {} outside [0, 1]", confidence)));
    }

    let raw_polygon = first_field(obj, POLYGON_FIELDS).ok_or_else(|| malformed("missing polygon"))?;
    let polygon = parse_polygon(raw_polygon).map_err(|reason| malformed(&reason))?;

    // `class` is the grouping key; `class_name` only changes what the label says.
    let class = obj.get("class").and_then(scalar_to_string);
    let class_id = first_field(obj, CLASS_ID_FIELDS).and_then(scalar_to_string);
    let class_key = class
        .or_else(|| class_id.clone())
        .unwrap_or_else(|| "obj".to_string());

    let label = first_field(obj, CLASS_NAME_FIELDS)
        .and_then(scalar_to_string)
        .or_else(|| class_id.map(|id| format!("cls {}", id)))
        .unwrap_or_else(|| "obj".to_string());

    Ok(Detection {
        class_key,
        label,
        confidence: confidence as f32,
        polygon,
    })
}

/// Accepts 8 flat numbers, 4 `[x, y]` pairs or 4 `{x, y}` objects.
fn parse_polygon(value: &Value) -> std::result::Result<Polygon, String> {
    let items = value.as_array().ok_or("polygon is not an array")?;

    let coords: Vec<f64> = if items.iter().all(Value::is_number) {
        items.iter().filter_map(Value::as_f64).collect()
    } else {
        let mut flat = Vec::with_capacity(items.len() * 2);
        for item in items {
            let (x, y) = match item {
                Value::Array(pair) if pair.len() == 2 => (pair[0].as_f64(), pair[1].as_f64()),
                Value::Object(p) => (
                    p.get("x").and_then(Value::as_f64),
                    p.get("y").and_then(Value::as_f64),
                ),
                _ => (None, None),
            };
            match (x, y) {
                (Some(x), Some(y)) => {
                    flat.push(x);
                    flat.push(y);
                }
                _ => return Err("polygon vertex is not a coordinate pair".to_string()),
            }
        }
        flat
    };

    if coords.len() != 8 {
        return Err(format!("expected 4 vertices, got {} coordinates", coords.len()));
    }
    if coords.iter().any(|c| !c.is_finite()) {
        return Err("polygon has non-finite coordinates".to_string());
    }

    let vertex = |i: usize| Point::new(coords[i * 2] as f32, coords[i * 2 + 1] as f32);
    Ok([vertex(0), vertex(1), vertex(2), vertex(3)])
}
