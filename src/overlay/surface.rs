/// Drawing surface seam
///
/// The renderer talks to a `DrawSurface` in logical display units; the
/// surface owns the backing store and applies the device pixel ratio.
/// `RasterSurface` is the PNG-capable backend built on `image`/`imageproc`.
use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, Blend};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect as PixelRect;
use log::{debug, info, trace};

use crate::detection::Point;
use crate::error::{OverlayError, Result};
use super::geometry::{DisplayTransform, Rect};

/// Average glyph advance as a fraction of the font size, used when no font
/// file is available.
const APPROX_ADVANCE: f32 = 0.6;

/// Text measurement capability injected into label and legend layout.
pub trait TextMeasure {
    /// Advance width of `text` at `font_size`, in logical units.
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

/// Monospace estimate for when real glyph metrics are unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasure;

impl TextMeasure for ApproxTextMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * APPROX_ADVANCE
    }
}

pub trait DrawSurface: TextMeasure {
    /// Resize the backing store for `transform` and clear all of it.
    fn begin_frame(&mut self, transform: &DisplayTransform);

    /// Draw a decoded image scaled into `dest`. `image_id` identifies the
    /// pixels so a backend may cache the scaled copy.
    fn draw_image(&mut self, image_id: u64, pixels: &RgbaImage, dest: Rect);

    /// Drop any cached per-image resources.
    fn release_image_cache(&mut self) {}

    fn fill_polygon(&mut self, points: &[Point], color: Rgba<u8>);

    fn stroke_polygon(&mut self, points: &[Point], color: Rgba<u8>, line_width: f32);

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);

    fn stroke_rect(&mut self, rect: Rect, color: Rgba<u8>, line_width: f32);

    /// Draw `text` with its top-left corner at `origin`.
    fn fill_text(&mut self, text: &str, origin: Point, font_size: f32, color: Rgba<u8>);
}

struct ScaledImage {
    image_id: u64,
    pixels: RgbaImage,
}

/// CPU raster surface with alpha blending
pub struct RasterSurface {
    canvas: Blend<RgbaImage>,
    scale: f32,
    font: Option<FontVec>,
    scaled_image: Option<ScaledImage>,
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            canvas: Blend(RgbaImage::new(1, 1)),
            scale: 1.0,
            font: None,
            scaled_image: None,
        }
    }

    /// Surface that measures and draws text with the given TrueType/OpenType font.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| OverlayError::Font(format!("{}: {}", path.display(), e)))?;
        info!("Loaded label font from {}", path.display());
        Ok(Self {
            font: Some(font),
            ..Self::new()
        })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.canvas.0
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.canvas.0.save_with_format(path, image::ImageFormat::Png)?;
        info!("Saved render to {}", path.display());
        Ok(())
    }

    fn to_pixel(&self, p: Point) -> PixelPoint<i32> {
        PixelPoint::new((p.x * self.scale).round() as i32, (p.y * self.scale).round() as i32)
    }

    fn pixel_rect(&self, rect: Rect) -> Option<PixelRect> {
        let x0 = (rect.x * self.scale).round() as i32;
        let y0 = (rect.y * self.scale).round() as i32;
        let x1 = (rect.right() * self.scale).round() as i32;
        let y1 = (rect.bottom() * self.scale).round() as i32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// `draw_polygon_mut` rejects closed or degenerate point lists.
    fn fill_pixel_polygon(&mut self, mut points: Vec<PixelPoint<i32>>, color: Rgba<u8>) {
        points.dedup();
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return;
        }
        draw_polygon_mut(&mut self.canvas, &points, color);
    }

    fn draw_thick_line(&mut self, a: Point, b: Point, color: Rgba<u8>, line_width: f32) {
        let width = line_width * self.scale;
        let (ax, ay) = (a.x * self.scale, a.y * self.scale);
        let (bx, by) = (b.x * self.scale, b.y * self.scale);

        if width <= 1.5 {
            draw_line_segment_mut(&mut self.canvas, (ax, ay), (bx, by), color);
            return;
        }

        let (dx, dy) = (bx - ax, by - ay);
        let len = (dx * dx + dy * dy).sqrt();
        if len < f32::EPSILON {
            return;
        }
        let (nx, ny) = (-dy / len * width / 2.0, dx / len * width / 2.0);
        let corners = [(ax + nx, ay + ny), (bx + nx, by + ny), (bx - nx, by - ny), (ax - nx, ay - ny)];
        let points = corners
            .iter()
            .map(|(x, y)| PixelPoint::new(x.round() as i32, y.round() as i32))
            .collect();
        self.fill_pixel_polygon(points, color);
    }
}

impl TextMeasure for RasterSurface {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Some(font) = &self.font else {
            return ApproxTextMeasure.text_width(text, font_size);
        };

        let scaled = font.as_scaled(PxScale::from(font_size));
        let mut width = 0.0;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }
}

impl DrawSurface for RasterSurface {
    fn begin_frame(&mut self, transform: &DisplayTransform) {
        let (width, height) = transform.physical_size();
        self.scale = transform.device_pixel_ratio;

        if self.canvas.0.dimensions() == (width, height) {
            for pixel in self.canvas.0.pixels_mut() {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        } else {
            trace!("Reallocating raster surface at {}x{}", width, height);
            self.canvas = Blend(RgbaImage::new(width, height));
        }
    }

    fn draw_image(&mut self, image_id: u64, pixels: &RgbaImage, dest: Rect) {
        let Some(target) = self.pixel_rect(dest) else {
            return;
        };
        let (w, h) = (target.width(), target.height());

        let cached = matches!(
            &self.scaled_image,
            Some(s) if s.image_id == image_id && s.pixels.dimensions() == (w, h)
        );
        if !cached {
            debug!("Scaling image {} to {}x{}", image_id, w, h);
            self.scaled_image = Some(ScaledImage {
                image_id,
                pixels: imageops::resize(pixels, w, h, FilterType::Triangle),
            });
        }

        if let Some(scaled) = &self.scaled_image {
            imageops::overlay(&mut self.canvas.0, &scaled.pixels, target.left() as i64, target.top() as i64);
        }
    }

    fn release_image_cache(&mut self) {
        if let Some(old) = self.scaled_image.take() {
            debug!("Released scaled copy of image {}", old.image_id);
        }
    }

    fn fill_polygon(&mut self, points: &[Point], color: Rgba<u8>) {
        let pixels = points.iter().map(|p| self.to_pixel(*p)).collect();
        self.fill_pixel_polygon(pixels, color);
    }

    fn stroke_polygon(&mut self, points: &[Point], color: Rgba<u8>, line_width: f32) {
        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            self.draw_thick_line(*a, b, color, line_width);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        if let Some(r) = self.pixel_rect(rect) {
            draw_filled_rect_mut(&mut self.canvas, r, color);
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgba<u8>, line_width: f32) {
        let w = line_width;
        let edges = [
            Rect::new(rect.x, rect.y, rect.width, w),
            Rect::new(rect.x, rect.bottom() - w, rect.width, w),
            Rect::new(rect.x, rect.y + w, w, rect.height - 2.0 * w),
            Rect::new(rect.right() - w, rect.y + w, w, rect.height - 2.0 * w),
        ];
        for edge in edges {
            self.fill_rect(edge, color);
        }
    }

    fn fill_text(&mut self, text: &str, origin: Point, font_size: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            trace!("No font loaded, skipping text {:?}", text);
            return;
        };
        let at = PixelPoint::new((origin.x * self.scale).round() as i32, (origin.y * self.scale).round() as i32);
        draw_text_mut(
            &mut self.canvas,
            color,
            at.x,
            at.y,
            PxScale::from(font_size * self.scale),
            font,
            text,
        );
    }
}

/// Command-log surface for asserting what a redraw produced.
#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum DrawCommand {
        Clear { width: u32, height: u32 },
        Image { image_id: u64, dest: Rect },
        FillPolygon { points: Vec<Point>, color: Rgba<u8> },
        StrokePolygon { points: Vec<Point>, color: Rgba<u8>, line_width: f32 },
        FillRect { rect: Rect, color: Rgba<u8> },
        StrokeRect { rect: Rect, color: Rgba<u8> },
        Text { text: String, origin: Point, color: Rgba<u8> },
    }

    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub commands: Vec<DrawCommand>,
        pub frames: usize,
        pub cache_releases: usize,
    }

    impl RecordingSurface {
        pub fn count<F: Fn(&DrawCommand) -> bool>(&self, pred: F) -> usize {
            self.commands.iter().filter(|c| pred(c)).count()
        }

        pub fn polygons(&self) -> usize {
            self.count(|c| matches!(c, DrawCommand::FillPolygon { .. }))
        }

        pub fn texts(&self) -> Vec<&str> {
            self.commands
                .iter()
                .filter_map(|c| match c {
                    DrawCommand::Text { text, .. } => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl TextMeasure for RecordingSurface {
        fn text_width(&self, text: &str, _font_size: f32) -> f32 {
            text.chars().count() as f32 * 6.0
        }
    }

    impl DrawSurface for RecordingSurface {
        fn begin_frame(&mut self, transform: &DisplayTransform) {
            let (width, height) = transform.physical_size();
            self.frames += 1;
            self.commands.clear();
            self.commands.push(DrawCommand::Clear { width, height });
        }

        fn draw_image(&mut self, image_id: u64, _pixels: &RgbaImage, dest: Rect) {
            self.commands.push(DrawCommand::Image { image_id, dest });
        }

        fn release_image_cache(&mut self) {
            self.cache_releases += 1;
        }

        fn fill_polygon(&mut self, points: &[Point], color: Rgba<u8>) {
            self.commands.push(DrawCommand::FillPolygon { points: points.to_vec(), color });
        }

        fn stroke_polygon(&mut self, points: &[Point], color: Rgba<u8>, line_width: f32) {
            self.commands.push(DrawCommand::StrokePolygon { points: points.to_vec(), color, line_width });
        }

        fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
            self.commands.push(DrawCommand::FillRect { rect, color });
        }

        fn stroke_rect(&mut self, rect: Rect, color: Rgba<u8>, _line_width: f32) {
            self.commands.push(DrawCommand::StrokeRect { rect, color });
        }

        fn fill_text(&mut self, text: &str, origin: Point, _font_size: f32, color: Rgba<u8>) {
            self.commands.push(DrawCommand::Text { text: text.to_string(), origin, color });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_measure() {
        assert_eq!(ApproxTextMeasure.text_width("abcd", 10.0), 24.0);
        assert_eq!(ApproxTextMeasure.text_width("", 12.0), 0.0);
    }

    #[test]
    fn test_begin_frame_sizes_and_clears() {
        let mut surface = RasterSurface::new();
        let transform = DisplayTransform::new(20.0, 10.0, 2.0);
        surface.begin_frame(&transform);
        assert_eq!(surface.pixels().dimensions(), (40, 20));

        surface.fill_rect(Rect::new(0.0, 0.0, 20.0, 10.0), Rgba([255, 0, 0, 255]));
        assert_eq!(*surface.pixels().get_pixel(39, 19), Rgba([255, 0, 0, 255]));

        surface.begin_frame(&transform);
        assert!(surface.pixels().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_fill_polygon_blends() {
        let mut surface = RasterSurface::new();
        surface.begin_frame(&DisplayTransform::new(10.0, 10.0, 1.0));
        surface.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Rgba([255, 255, 255, 255]));

        let square = [
            Point::new(2.0, 2.0),
            Point::new(8.0, 2.0),
            Point::new(8.0, 8.0),
            Point::new(2.0, 8.0),
        ];
        surface.fill_polygon(&square, Rgba([0, 0, 0, 128]));

        let inside = surface.pixels().get_pixel(5, 5);
        assert!(inside.0[0] > 100 && inside.0[0] < 160, "got {:?}", inside);
        assert_eq!(*surface.pixels().get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_degenerate_polygon_is_skipped() {
        let mut surface = RasterSurface::new();
        surface.begin_frame(&DisplayTransform::new(10.0, 10.0, 1.0));
        surface.fill_polygon(&[Point::new(1.0, 1.0); 4], Rgba([255, 0, 0, 255]));
        surface.stroke_polygon(&[Point::new(1.0, 1.0); 4], Rgba([255, 0, 0, 255]), 3.0);
        assert!(surface.pixels().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_draw_image_scales_into_dest() {
        let mut surface = RasterSurface::new();
        let transform = DisplayTransform::new(8.0, 4.0, 1.0);
        surface.begin_frame(&transform);

        let source = RgbaImage::from_pixel(2, 1, Rgba([0, 128, 255, 255]));
        surface.draw_image(7, &source, transform.bounds());
        let corner = surface.pixels().get_pixel(7, 3);
        assert!(corner.0[1].abs_diff(128) <= 1 && corner.0[2] >= 254 && corner.0[3] >= 254, "got {:?}", corner);

        surface.release_image_cache();
        assert!(surface.scaled_image.is_none());
    }

    #[test]
    fn test_text_without_font_is_a_no_op() {
        let mut surface = RasterSurface::new();
        surface.begin_frame(&DisplayTransform::new(30.0, 10.0, 1.0));
        surface.fill_text("abc", Point::new(0.0, 0.0), 12.0, Rgba([255, 255, 255, 255]));
        assert!(!surface.has_font());
        assert!(surface.pixels().pixels().all(|p| p.0[3] == 0));
    }
}
