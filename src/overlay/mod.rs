pub mod color;
pub mod filter;
pub mod geometry;
pub mod label;
pub mod legend;
pub mod renderer;
pub mod summary;
pub mod surface;

pub use geometry::{DisplayTransform, Rect};
pub use renderer::{OverlayRenderer, RenderImage, RenderOptions, RenderReport, RenderState};
pub use surface::{ApproxTextMeasure, DrawSurface, RasterSurface, TextMeasure};
