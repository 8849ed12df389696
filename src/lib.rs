//! Detection overlay rendering and client-side filtering
//!
//! One image goes to a remote detector exactly once. The oriented-polygon
//! result set is then filtered, colored, labeled and drawn locally as many
//! times as the confidence threshold or the display size changes.

pub mod build_info;
pub mod client;
pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod overlay;
pub mod session;
pub mod settings;

pub use client::{DetectRequest, DetectorClient, HttpDetectorClient, SavedResponseClient};
pub use config::Config;
pub use detection::{Detection, ImageMeta, Point, Polygon};
pub use error::{OverlayError, Result};
pub use overlay::{DisplayTransform, DrawSurface, OverlayRenderer, RasterSurface, RenderState};
pub use session::{DetectionSession, SessionState};
pub use settings::UserSettings;
