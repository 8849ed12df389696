/// Deterministic per-class colors
///
/// A class key is hashed (32-bit FNV-1a over its UTF-8 bytes) onto the hue
/// circle. Saturation and lightness are fixed, so the color is a pure function
/// of the key: overlay strokes, label chips, legend swatches and summary
/// badges agree without any shared registry.
use image::Rgba;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const SATURATION: f32 = 72.0;
const LIGHTNESS: f32 = 52.0;
const STROKE_DARKEN: f32 = 8.0;
const STROKE_MIN_LIGHTNESS: f32 = 30.0;
const FILL_ALPHA: f32 = 0.18;

/// Render-specific derivations of one class hue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassColor {
    pub hue: u16,
    /// Polygon outline, darker for contrast.
    pub stroke: Rgba<u8>,
    /// Translucent polygon interior.
    pub fill: Rgba<u8>,
    /// Opaque base color for label chips, swatches and badges.
    pub chip: Rgba<u8>,
}

pub fn fnv1a(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

pub fn hue_of(key: &str) -> u16 {
    (fnv1a(key) % 360) as u16
}

pub fn color_of(key: &str) -> ClassColor {
    let hue = hue_of(key);
    let h = hue as f32;
    let stroke_l = (LIGHTNESS - STROKE_DARKEN).max(STROKE_MIN_LIGHTNESS);

    ClassColor {
        hue,
        stroke: hsla(h, SATURATION, stroke_l, 1.0),
        fill: hsla(h, SATURATION, LIGHTNESS, FILL_ALPHA),
        chip: hsla(h, SATURATION, LIGHTNESS, 1.0),
    }
}

/// CSS-style HSL (degrees, percent, percent) plus alpha in [0, 1].
pub fn hsla(h: f32, s: f32, l: f32, a: f32) -> Rgba<u8> {
    let s = (s / 100.0).clamp(0.0, 1.0);
    let l = (l / 100.0).clamp(0.0, 1.0);
    let h = h.rem_euclid(360.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([to_u8(r), to_u8(g), to_u8(b), (a.clamp(0.0, 1.0) * 255.0).round() as u8])
}
