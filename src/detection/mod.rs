//! Detection data model
//!
//! Everything in here is already normalized: a `Detection` always carries a
//! class key, a confidence in [0, 1] and exactly four vertices. Foreign
//! response shapes are handled at the boundary by `parser`.

pub mod parser;
pub mod export;

use serde::Serialize;

use crate::error::{OverlayError, Result};

/// A point in either source or display pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Oriented quadrilateral, vertices in drawing order.
pub type Polygon = [Point; 4];

/// Axis-aligned bounds of a polygon as (min_x, min_y, max_x, max_y).
pub fn polygon_bounds(polygon: &Polygon) -> (f32, f32, f32, f32) {
    polygon.iter().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(x1, y1, x2, y2), p| (x1.min(p.x), y1.min(p.y), x2.max(p.x), y2.max(p.y)),
    )
}

/// A single detector result in source-image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Stable grouping/color key (class name, else numeric id, else "obj").
    pub class_key: String,
    /// Human-readable name shown in labels.
    pub label: String,
    pub confidence: f32,
    pub polygon: Polygon,
}

/// Pixel dimensions of the image the detector actually analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageMeta {
    pub source_width: u32,
    pub source_height: u32,
}

impl ImageMeta {
    pub fn new(width: i64, height: i64) -> Result<Self> {
        if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
            return Err(OverlayError::InvalidDimensions { width, height });
        }
        Ok(Self {
            source_width: width as u32,
            source_height: height as u32,
        })
    }
}
