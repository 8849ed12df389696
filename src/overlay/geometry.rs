/// Source space to display space mapping
///
/// Both axes scale independently: `sx = display_w / source_w`,
/// `sy = display_h / source_h`. Aspect is preserved only if the caller
/// already constrained the display size to the source aspect ratio, which
/// `DisplayTransform::fit` does.
use crate::detection::{ImageMeta, Point, Polygon};
use crate::error::{OverlayError, Result};

/// Axis-aligned rectangle in display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Display surface size in logical units plus the device pixel ratio.
///
/// Every view of the same image must be handed the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub display_width: f32,
    pub display_height: f32,
    pub device_pixel_ratio: f32,
}

impl DisplayTransform {
    pub fn new(display_width: f32, display_height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            display_width,
            display_height,
            device_pixel_ratio: if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
                device_pixel_ratio
            } else {
                1.0
            },
        }
    }

    /// Fit an image of `natural_w` x `natural_h` pixels into a view no wider
    /// than `max_width`, never narrower than `min_width`, keeping aspect.
    pub fn fit(natural_w: u32, natural_h: u32, max_width: f32, min_width: f32, device_pixel_ratio: f32) -> Result<Self> {
        if natural_w == 0 || natural_h == 0 {
            return Err(OverlayError::InvalidDimensions {
                width: natural_w as i64,
                height: natural_h as i64,
            });
        }

        let mut width = max_width.min(natural_w as f32);
        if width < min_width {
            width = min_width;
        }
        let width = width.round();
        let height = (width * natural_h as f32 / natural_w as f32).round();

        Ok(Self::new(width, height, device_pixel_ratio))
    }

    /// Backing-store size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.display_width * self.device_pixel_ratio).round().max(1.0) as u32,
            (self.display_height * self.device_pixel_ratio).round().max(1.0) as u32,
        )
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.display_width, self.display_height)
    }
}

/// Per-axis scale factors from source to display space.
pub fn scale_factors(source_w: f32, source_h: f32, display_w: f32, display_h: f32) -> Result<(f32, f32)> {
    if !(source_w > 0.0 && source_h > 0.0) {
        return Err(OverlayError::InvalidDimensions {
            width: source_w as i64,
            height: source_h as i64,
        });
    }
    Ok((display_w / source_w, display_h / source_h))
}

/// Map a source-space polygon into display space.
pub fn map_polygon(polygon: &Polygon, source_w: f32, source_h: f32, display_w: f32, display_h: f32) -> Result<Polygon> {
    let (sx, sy) = scale_factors(source_w, source_h, display_w, display_h)?;
    Ok(polygon.map(|p| Point::new(p.x * sx, p.y * sy)))
}

/// Inverse of `map_polygon`: display space back to source space.
pub fn unmap_polygon(polygon: &Polygon, source_w: f32, source_h: f32, display_w: f32, display_h: f32) -> Result<Polygon> {
    let (sx, sy) = scale_factors(source_w, source_h, display_w, display_h)?;
    if !(sx > 0.0 && sy > 0.0) {
        return Err(OverlayError::InvalidDimensions {
            width: display_w as i64,
            height: display_h as i64,
        });
    }
    Ok(polygon.map(|p| Point::new(p.x / sx, p.y / sy)))
}

/// Resolve the source dimensions used for mapping.
///
/// Authoritative response metadata wins; without it the decoded image's own
/// pixel size stands in.
pub fn source_size(meta: Option<ImageMeta>, natural_w: u32, natural_h: u32) -> Result<(f32, f32)> {
    match meta {
        Some(m) => Ok((m.source_width as f32, m.source_height as f32)),
        None => {
            let fallback = ImageMeta::new(natural_w as i64, natural_h as i64)?;
            Ok((fallback.source_width as f32, fallback.source_height as f32))
        }
    }
}
