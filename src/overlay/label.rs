/// Label chip layout
///
/// A label is anchored at the top-left corner of the polygon's axis-aligned
/// bounds and sits just above it. Width comes from the injected text
/// measurement, so glyph metrics stay a surface concern.
///
/// Labels near the top edge can end up partly above the surface. With
/// `LabelOverflow::Unclamped` they are drawn at the computed position anyway
/// (and get cut off); `LabelOverflow::ClampToTop` pins them to y = 0.
use crate::detection::{polygon_bounds, Point, Polygon};
use super::geometry::Rect;
use super::surface::TextMeasure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelOverflow {
    #[default]
    Unclamped,
    ClampToTop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    pub font_size: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    /// Vertical gap between the chip and the polygon's top edge.
    pub gap: f32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            pad_x: 5.0,
            pad_y: 3.0,
            gap: 2.0,
        }
    }
}

/// Computed chip for one detection
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBox {
    pub rect: Rect,
    /// Top-left of the text run.
    pub text_origin: Point,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LabelLayout {
    pub style: LabelStyle,
    pub overflow: LabelOverflow,
}

impl LabelLayout {
    pub fn new(style: LabelStyle, overflow: LabelOverflow) -> Self {
        Self { style, overflow }
    }

    /// Lay out `text` for a polygon already mapped into display space.
    pub fn layout(&self, polygon: &Polygon, text: &str, measure: &dyn TextMeasure) -> LabelBox {
        let (min_x, min_y, _, _) = polygon_bounds(polygon);
        let style = &self.style;

        let text_width = measure.text_width(text, style.font_size);
        let height = style.font_size + 2.0 * style.pad_y;
        let width = text_width + 2.0 * style.pad_x;

        let mut y = min_y - height - style.gap;
        if self.overflow == LabelOverflow::ClampToTop {
            y = y.max(0.0);
        }

        LabelBox {
            rect: Rect::new(min_x, y, width, height),
            text_origin: Point::new(min_x + style.pad_x, y + style.pad_y),
            text: text.to_string(),
        }
    }
}

/// `"{label} {pct}%"` with one decimal, dropping a trailing `.0`.
pub fn label_text(label: &str, confidence: f32) -> String {
    format!("{} {}%", label, format_percent(confidence))
}

pub fn format_percent(confidence: f32) -> String {
    let pct = (confidence as f64 * 1000.0).round() / 10.0;
    if pct.fract() == 0.0 {
        format!("{:.0}", pct)
    } else {
        format!("{:.1}", pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is exactly 6 units wide.
    struct FixedWidth;

    impl TextMeasure for FixedWidth {
        fn text_width(&self, text: &str, _font_size: f32) -> f32 {
            text.chars().count() as f32 * 6.0
        }
    }

    fn poly_at(x: f32, y: f32) -> Polygon {
        [
            Point::new(x + 10.0, y),
            Point::new(x + 40.0, y + 5.0),
            Point::new(x + 30.0, y + 30.0),
            Point::new(x, y + 25.0),
        ]
    }

    #[test]
    fn test_label_anchored_above_bounds() {
        let layout = LabelLayout::default();
        let label = layout.layout(&poly_at(100.0, 50.0), "spike 88%", &FixedWidth);

        // 9 chars * 6 + 2 * 5 padding; 12 + 2 * 3 tall; 2 gap above min y.
        assert_eq!(label.rect, Rect::new(100.0, 50.0 - 18.0 - 2.0, 64.0, 18.0));
        assert_eq!(label.text_origin, Point::new(105.0, 33.0));
        assert_eq!(label.text, "spike 88%");
    }

    #[test]
    fn test_unclamped_label_can_leave_the_surface() {
        let layout = LabelLayout::new(LabelStyle::default(), LabelOverflow::Unclamped);
        let label = layout.layout(&poly_at(0.0, 5.0), "a", &FixedWidth);
        assert_eq!(label.rect.y, -15.0);
        assert_eq!(label.text_origin.y, -12.0);
    }

    #[test]
    fn test_clamped_label_stays_on_surface() {
        let layout = LabelLayout::new(LabelStyle::default(), LabelOverflow::ClampToTop);
        let label = layout.layout(&poly_at(0.0, 5.0), "a", &FixedWidth);
        assert_eq!(label.rect.y, 0.0);
        assert_eq!(label.text_origin.y, 3.0);

        // Far from the edge the policy makes no difference.
        let far = layout.layout(&poly_at(0.0, 100.0), "a", &FixedWidth);
        assert_eq!(far.rect.y, 80.0);
    }

    #[test]
    fn test_label_text_formatting() {
        assert_eq!(label_text("spike", 0.875), "spike 87.5%");
        assert_eq!(label_text("spike", 0.88), "spike 88%");
        assert_eq!(label_text("obj", 1.0), "obj 100%");
        assert_eq!(format_percent(0.0), "0");
        assert_eq!(format_percent(0.1234), "12.3");
    }
}
