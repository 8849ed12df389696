/// The single redraw entry point
///
/// `OverlayRenderer` owns its drawing surface outright. Callers hand it a
/// `RenderState` snapshot and it repaints everything from scratch: clear,
/// base image, polygons, labels, legend. Nothing from a previous frame is
/// reused apart from the surface's scaled-image cache, which is keyed by
/// image id and dropped as soon as a different image shows up.
use image::{Rgba, RgbaImage};
use log::{debug, warn};

use crate::detection::{Detection, ImageMeta};
use super::color::color_of;
use super::geometry::{map_polygon, source_size, DisplayTransform};
use super::label::{label_text, LabelLayout, LabelOverflow, LabelStyle};
use super::legend::{layout_legend, legend_entries, LegendPanel, LegendStyle, LEGEND_TITLE};
use super::surface::DrawSurface;

const LABEL_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL_OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 64]);           // rgba(0,0,0,0.25)
const PANEL_FILL: Rgba<u8> = Rgba([255, 255, 255, 217]);       // rgba(255,255,255,0.85)
const PANEL_BORDER: Rgba<u8> = Rgba([0, 0, 0, 38]);            // rgba(0,0,0,0.15)
const LEGEND_TITLE_COLOR: Rgba<u8> = Rgba([0x33, 0x41, 0x55, 255]);
const LEGEND_TEXT_COLOR: Rgba<u8> = Rgba([0x11, 0x18, 0x27, 255]);

/// Visibility flags and stroke settings for the detection view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub show_labels: bool,
    pub show_legend: bool,
    pub line_width: f32,
    pub label_overflow: LabelOverflow,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_labels: true,
            show_legend: true,
            line_width: 2.0,
            label_overflow: LabelOverflow::Unclamped,
        }
    }
}

/// Decoded pixels plus the id they are cached under.
#[derive(Clone, Copy)]
pub struct RenderImage<'a> {
    pub id: u64,
    pub pixels: &'a RgbaImage,
}

/// Everything one redraw needs, borrowed from the session.
#[derive(Clone)]
pub struct RenderState<'a> {
    pub image: Option<RenderImage<'a>>,
    pub raw: &'a [Detection],
    pub filtered: Vec<&'a Detection>,
    pub meta: Option<ImageMeta>,
    pub transform: DisplayTransform,
    pub options: RenderOptions,
}

/// What the last redraw put on the surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub polygons: usize,
    pub labels: usize,
    pub legend_entries: usize,
}

pub struct OverlayRenderer<S: DrawSurface> {
    surface: S,
    label_style: LabelStyle,
    legend_style: LegendStyle,
    current_image: Option<u64>,
}

impl<S: DrawSurface> OverlayRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            label_style: LabelStyle::default(),
            legend_style: LegendStyle::default(),
            current_image: None,
        }
    }

    /// Read-only access for saving or inspecting the last frame.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Full repaint of the detection view.
    pub fn render(&mut self, state: &RenderState<'_>) -> RenderReport {
        let mut report = RenderReport::default();
        let Some(image) = self.begin(state) else {
            return report;
        };

        let (natural_w, natural_h) = image.pixels.dimensions();
        let (source_w, source_h) = match source_size(state.meta, natural_w, natural_h) {
            Ok(size) => size,
            Err(e) => {
                warn!("Cannot map detections for image {}: {}", image.id, e);
                return report;
            }
        };
        let (display_w, display_h) = (state.transform.display_width, state.transform.display_height);

        let mut mapped = Vec::with_capacity(state.filtered.len());
        for det in &state.filtered {
            match map_polygon(&det.polygon, source_w, source_h, display_w, display_h) {
                Ok(polygon) => mapped.push((*det, polygon)),
                Err(e) => warn!("Skipping detection {:?}: {}", det.label, e),
            }
        }

        for (det, polygon) in &mapped {
            let color = color_of(&det.class_key);
            self.surface.fill_polygon(polygon, color.fill);
            self.surface.stroke_polygon(polygon, color.stroke, state.options.line_width);
            report.polygons += 1;
        }

        if state.options.show_labels {
            let layout = LabelLayout::new(self.label_style, state.options.label_overflow);
            for (det, polygon) in &mapped {
                let color = color_of(&det.class_key);
                let text = label_text(&det.label, det.confidence);
                let chip = layout.layout(polygon, &text, &self.surface);
                self.surface.fill_rect(chip.rect, color.chip);
                self.surface.stroke_rect(chip.rect, LABEL_OUTLINE, 1.0);
                self.surface
                    .fill_text(&chip.text, chip.text_origin, self.label_style.font_size, LABEL_TEXT);
                report.labels += 1;
            }
        }

        if state.options.show_legend {
            let entries = legend_entries(mapped.iter().map(|(det, _)| *det));
            let panel = layout_legend(entries, state.transform.bounds(), &self.legend_style, &self.surface);
            if let Some(panel) = panel {
                report.legend_entries = panel.rows.len();
                self.draw_legend(&panel);
            }
        }

        debug!(
            "Redrew image {}: {} of {} detections, {} labels, {} legend entries",
            image.id,
            report.polygons,
            state.raw.len(),
            report.labels,
            report.legend_entries
        );
        report
    }

    /// Full repaint of the preview view: the base image only.
    pub fn render_base(&mut self, state: &RenderState<'_>) {
        self.begin(state);
    }

    /// Clear the surface and draw the base image, if any.
    fn begin<'a>(&mut self, state: &RenderState<'a>) -> Option<RenderImage<'a>> {
        let image_id = state.image.map(|i| i.id);
        if self.current_image.is_some() && self.current_image != image_id {
            self.surface.release_image_cache();
        }
        self.current_image = image_id;

        self.surface.begin_frame(&state.transform);
        let image = state.image?;
        self.surface.draw_image(image.id, image.pixels, state.transform.bounds());
        Some(image)
    }

    fn draw_legend(&mut self, panel: &LegendPanel) {
        let style = self.legend_style;
        self.surface.fill_rect(panel.rect, PANEL_FILL);
        self.surface.stroke_rect(panel.rect, PANEL_BORDER, 1.0);
        self.surface
            .fill_text(LEGEND_TITLE, panel.title_origin, style.font_size, LEGEND_TITLE_COLOR);

        for row in &panel.rows {
            self.surface.fill_rect(row.swatch, row.entry.color.chip);
            self.surface.stroke_rect(row.swatch, LABEL_OUTLINE, 1.0);
            self.surface
                .fill_text(&row.entry.key, row.text_origin, style.font_size, LEGEND_TEXT_COLOR);
        }
    }
}
