/// Legend panel layout
///
/// One entry per distinct class key of the currently filtered set, in
/// first-seen order. The panel is rebuilt from scratch on every redraw since
/// the class set grows and shrinks as the threshold moves.
use std::collections::HashSet;

use crate::detection::{Detection, Point};
use super::color::{color_of, ClassColor};
use super::geometry::Rect;
use super::surface::TextMeasure;

pub const LEGEND_TITLE: &str = "Legend";

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub key: String,
    pub color: ClassColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegendStyle {
    pub font_size: f32,
    pub padding: f32,
    pub swatch: f32,
    /// Space between a swatch and its text.
    pub swatch_gap: f32,
    /// Distance from the display's top and right edges.
    pub inset: f32,
}

impl Default for LegendStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            padding: 8.0,
            swatch: 14.0,
            swatch_gap: 8.0,
            inset: 10.0,
        }
    }
}

impl LegendStyle {
    pub fn title_line_height(&self) -> f32 {
        self.font_size + 6.0
    }

    pub fn entry_line_height(&self) -> f32 {
        (self.font_size + 6.0).max(18.0)
    }
}

/// Positioned legend row
#[derive(Debug, Clone, PartialEq)]
pub struct LegendRow {
    pub entry: LegendEntry,
    pub swatch: Rect,
    pub text_origin: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendPanel {
    pub rect: Rect,
    pub title_origin: Point,
    pub rows: Vec<LegendRow>,
}

/// Distinct class keys in first-seen order.
pub fn legend_entries<'a, I>(detections: I) -> Vec<LegendEntry>
where
    I: IntoIterator<Item = &'a Detection>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries = Vec::new();
    for det in detections {
        if seen.insert(det.class_key.as_str()) {
            entries.push(LegendEntry {
                key: det.class_key.clone(),
                color: color_of(&det.class_key),
            });
        }
    }
    entries
}

/// Lay out the panel against the display bounds. `None` for no entries.
pub fn layout_legend(
    entries: Vec<LegendEntry>,
    display: Rect,
    style: &LegendStyle,
    measure: &dyn TextMeasure,
) -> Option<LegendPanel> {
    if entries.is_empty() {
        return None;
    }

    let content_width = entries
        .iter()
        .map(|e| style.swatch + style.swatch_gap + measure.text_width(&e.key, style.font_size))
        .fold(measure.text_width(LEGEND_TITLE, style.font_size), f32::max);

    let line_h = style.entry_line_height();
    let width = (content_width + style.padding * 2.0).ceil();
    let height = (style.padding * 2.0 + style.title_line_height() + line_h * entries.len() as f32).ceil();

    let x0 = display.right() - width - style.inset;
    let y0 = display.y + style.inset;

    let mut y = y0 + style.padding + style.title_line_height();
    let rows = entries
        .into_iter()
        .map(|entry| {
            let row = LegendRow {
                swatch: Rect::new(x0 + style.padding, y + (line_h - style.swatch) / 2.0, style.swatch, style.swatch),
                text_origin: Point::new(
                    x0 + style.padding + style.swatch + style.swatch_gap,
                    y + (line_h - style.font_size) / 2.0,
                ),
                entry,
            };
            y += line_h;
            row
        })
        .collect();

    Some(LegendPanel {
        rect: Rect::new(x0, y0, width, height),
        title_origin: Point::new(x0 + style.padding, y0 + style.padding),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedWidth;

    impl TextMeasure for FixedWidth {
        fn text_width(&self, text: &str, _font_size: f32) -> f32 {
            text.chars().count() as f32 * 6.0
        }
    }

    fn det(key: &str) -> Detection {
        Detection {
            class_key: key.to_string(),
            label: key.to_string(),
            confidence: 0.5,
            polygon: [Point::new(0.0, 0.0); 4],
        }
    }

    #[test]
    fn test_entries_unique_in_first_seen_order() {
        let dets = vec![det("spikelet"), det("spike"), det("spikelet"), det("fhb"), det("spike")];
        let keys: Vec<String> = legend_entries(&dets).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["spikelet", "spike", "fhb"]);
    }

    #[test]
    fn test_entry_colors_match_assigner() {
        let dets = vec![det("spike")];
        let entries = legend_entries(&dets);
        assert_eq!(entries[0].color, color_of("spike"));
    }

    #[test]
    fn test_panel_geometry() {
        let entries = legend_entries(&vec![det("spikelet"), det("a")]);
        let display = Rect::new(0.0, 0.0, 800.0, 600.0);
        let panel = layout_legend(entries, display, &LegendStyle::default(), &FixedWidth).unwrap();

        // widest line: 14 + 8 + 8 * 6 = 70 vs title 36
        assert_eq!(panel.rect.width, 86.0);
        // 8 * 2 + 18 title + 2 * 18 rows
        assert_eq!(panel.rect.height, 70.0);
        assert_eq!(panel.rect.x, 800.0 - 86.0 - 10.0);
        assert_eq!(panel.rect.y, 10.0);
        assert_eq!(panel.title_origin, Point::new(712.0, 18.0));

        assert_eq!(panel.rows.len(), 2);
        assert_eq!(panel.rows[0].swatch, Rect::new(712.0, 38.0, 14.0, 14.0));
        assert_eq!(panel.rows[0].text_origin, Point::new(734.0, 39.0));
        assert_eq!(panel.rows[1].swatch.y, 56.0);
    }

    #[test]
    fn test_title_can_set_width() {
        let entries = legend_entries(&vec![det("a")]);
        let panel = layout_legend(entries, Rect::new(0.0, 0.0, 300.0, 300.0), &LegendStyle::default(), &FixedWidth).unwrap();
        // title 36 vs 14 + 8 + 6 = 28
        assert_eq!(panel.rect.width, 52.0);
    }

    #[test]
    fn test_empty_set_has_no_panel() {
        let panel = layout_legend(Vec::new(), Rect::new(0.0, 0.0, 100.0, 100.0), &LegendStyle::default(), &FixedWidth);
        assert!(panel.is_none());
    }
}
