/// Error taxonomy for the overlay engine
///
/// Nothing here is fatal to the process. The worst outcome of any of these is
/// "nothing rendered, message shown".
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// Source or display dimensions that cannot define a scale transform.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    /// One entry of a detector response that cannot enter the data model.
    #[error("malformed detection #{index}: {reason}")]
    MalformedDetection { index: usize, reason: String },

    /// Transport failure or non-2xx response from the detector service.
    #[error("{}", request_failed_message(*status, message))]
    RequestFailed { status: Option<u16>, message: String },

    /// A response for a request the session no longer cares about.
    #[error("stale response for request {generation} (current is {current})")]
    StaleResponse { generation: u64, current: u64 },

    #[error("no image selected")]
    NoImage,

    #[error("a detection request is already in flight")]
    RequestInFlight,

    #[error("detections were already fetched for this image")]
    AlreadyFetched,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("font error: {0}")]
    Font(String),
}

fn request_failed_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) if message.is_empty() => format!("HTTP {}", code),
        Some(code) => format!("HTTP {} {}", code, message),
        None => format!("request failed: {}", message),
    }
}

impl OverlayError {
    /// Whether a UI shell should show this condition to the user.
    ///
    /// Stale responses and single malformed entries are swallowed; they only
    /// reach the log.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            OverlayError::StaleResponse { .. } | OverlayError::MalformedDetection { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
