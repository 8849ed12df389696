/// Per-class count badges shown next to the detection view.
use std::collections::HashMap;
use std::fmt;

use crate::detection::{Detection, ImageMeta};
use super::color::{color_of, ClassColor};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassBadge {
    pub key: String,
    pub shown: usize,
    pub total: usize,
    pub color: ClassColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub badges: Vec<ClassBadge>,
    pub shown: usize,
    pub total: usize,
    pub meta: Option<ImageMeta>,
}

/// Badges ordered by raw count, most frequent first, ties broken by key.
pub fn summarize(raw: &[Detection], filtered: &[&Detection], meta: Option<ImageMeta>) -> Summary {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for det in raw {
        *totals.entry(det.class_key.as_str()).or_default() += 1;
    }
    let mut shown: HashMap<&str, usize> = HashMap::new();
    for det in filtered {
        *shown.entry(det.class_key.as_str()).or_default() += 1;
    }

    let mut badges: Vec<ClassBadge> = totals
        .into_iter()
        .map(|(key, total)| ClassBadge {
            key: key.to_string(),
            shown: shown.get(key).copied().unwrap_or(0),
            total,
            color: color_of(key),
        })
        .collect();
    badges.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));

    Summary {
        badges,
        shown: filtered.len(),
        total: raw.len(),
        meta,
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total: {} / {}", self.shown, self.total)?;
        if let Some(meta) = self.meta {
            write!(f, " ({}x{})", meta.source_width, meta.source_height)?;
        }
        for badge in &self.badges {
            write!(f, "\n  {}: {}/{}", badge.key, badge.shown, badge.total)?;
        }
        Ok(())
    }
}
