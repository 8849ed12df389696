/// Detection session state machine
///
/// One image, one outbound request, then any number of local filter and
/// redraw cycles:
///
/// ```text
/// Empty -> ImageLoaded -> Requesting -> Ready (threshold/display changes loop here)
///                              |
///                              +-> Failed -> Requesting (explicit retry only)
/// ```
///
/// Selecting an image resets to `ImageLoaded` from any state. Every request
/// carries a generation number; a response whose generation no longer
/// matches is stale and gets dropped, so the last selected image always wins.
use image::RgbaImage;
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::client::{DetectRequest, DetectorClient};
use crate::config::Config;
use crate::detection::parser::ParsedResponse;
use crate::detection::{Detection, ImageMeta};
use crate::error::{OverlayError, Result};
use crate::overlay::filter::{filter, suggest_threshold};
use crate::overlay::geometry::DisplayTransform;
use crate::overlay::label::LabelOverflow;
use crate::overlay::renderer::{RenderImage, RenderOptions, RenderState};
use crate::overlay::summary::{summarize, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    ImageLoaded,
    Requesting,
    Ready,
    Failed,
}

/// The selected image: encoded bytes for upload plus decoded pixels for drawing.
///
/// Released when the session replaces or drops it, exactly once.
pub struct LoadedImage {
    id: u64,
    file_name: String,
    bytes: Vec<u8>,
    pixels: RgbaImage,
}

impl LoadedImage {
    fn decode(id: u64, file_name: String, bytes: Vec<u8>) -> Result<Self> {
        let pixels = image::load_from_memory(&bytes)?.to_rgba8();
        debug!("Decoded image {} ({}): {}x{}", id, file_name, pixels.width(), pixels.height());
        Ok(Self { id, file_name, bytes, pixels })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn natural_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

impl Drop for LoadedImage {
    fn drop(&mut self) {
        debug!("Released image {} ({})", self.id, self.file_name);
    }
}

/// Handed out by `begin_request`; its generation must come back with the response.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub generation: u64,
    pub request: DetectRequest,
}

pub struct DetectionSession {
    config: Config,
    state: SessionState,
    image: Option<LoadedImage>,
    raw: Vec<Detection>,
    meta: Option<ImageMeta>,
    threshold: f32,
    transform: Option<DisplayTransform>,
    device_pixel_ratio: f32,
    options: RenderOptions,
    generation: u64,
    next_image_id: u64,
    skipped: usize,
    last_error: Option<String>,
}

impl DetectionSession {
    pub fn new(config: Config) -> Self {
        Self {
            state: SessionState::Empty,
            image: None,
            raw: Vec::new(),
            meta: None,
            threshold: config.initial_threshold.clamp(0.0, 1.0),
            transform: None,
            device_pixel_ratio: config.device_pixel_ratio,
            options: config.render,
            generation: 0,
            next_image_id: 1,
            skipped: 0,
            last_error: None,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    /// The full detector result. Never mutated after it arrives.
    pub fn raw(&self) -> &[Detection] {
        &self.raw
    }

    pub fn meta(&self) -> Option<ImageMeta> {
        self.meta
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn transform(&self) -> Option<DisplayTransform> {
        self.transform
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entries dropped while normalizing the last response.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Message for the last failed request, cleared by the next selection.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replace the current image. Any in-flight request becomes stale.
    ///
    /// On a decode error the session is left untouched.
    pub fn select_image(&mut self, file_name: impl Into<String>, bytes: Vec<u8>) -> Result<u64> {
        let image = LoadedImage::decode(self.next_image_id, file_name.into(), bytes)?;
        let (w, h) = image.natural_size();
        let transform = DisplayTransform::fit(
            w,
            h,
            self.config.max_display_width,
            self.config.min_display_width,
            self.device_pixel_ratio,
        )?;

        self.next_image_id += 1;
        self.generation += 1;
        let id = image.id;
        info!("Selected image {} ({}x{} shown at {}x{})", image.file_name, w, h, transform.display_width, transform.display_height);

        self.image = Some(image);
        self.raw.clear();
        self.meta = None;
        self.skipped = 0;
        self.last_error = None;
        self.transform = Some(transform);
        self.state = SessionState::ImageLoaded;
        Ok(id)
    }

    /// Start the one request for the current image.
    ///
    /// Allowed from `ImageLoaded` and, as an explicit retry, from `Failed`.
    pub fn begin_request(&mut self) -> Result<RequestTicket> {
        match self.state {
            SessionState::Empty => return Err(OverlayError::NoImage),
            SessionState::Requesting => return Err(OverlayError::RequestInFlight),
            SessionState::Ready => return Err(OverlayError::AlreadyFetched),
            SessionState::ImageLoaded | SessionState::Failed => {}
        }
        let image = self.image.as_ref().ok_or(OverlayError::NoImage)?;

        self.generation += 1;
        let request = DetectRequest {
            file_name: image.file_name.clone(),
            bytes: image.bytes.clone(),
            model: self.config.model.clone(),
            min_confidence: self.config.min_confidence_hint,
        };
        self.state = SessionState::Requesting;
        self.last_error = None;
        info!("Requesting detections for {} (generation {})", request.file_name, self.generation);

        Ok(RequestTicket {
            generation: self.generation,
            request,
        })
    }

    /// Apply the outcome of the request started with `generation`.
    pub fn finish_request(&mut self, generation: u64, result: Result<Value>) -> Result<()> {
        if generation != self.generation || self.state != SessionState::Requesting {
            debug!("Dropping stale response for generation {} (current {})", generation, self.generation);
            return Err(OverlayError::StaleResponse {
                generation,
                current: self.generation,
            });
        }

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                error!("Detection request failed: {}", e);
                self.state = SessionState::Failed;
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let parsed = ParsedResponse::from_value(&body);
        if !parsed.skipped.is_empty() {
            warn!("Dropped {} malformed detections", parsed.skipped.len());
        }
        if parsed.meta.is_none() {
            warn!("Response has no usable image size, mapping against the decoded image");
        }

        self.skipped = parsed.skipped.len();
        self.raw = parsed.detections;
        self.meta = parsed.meta;
        self.state = SessionState::Ready;

        if let Some(t) = suggest_threshold(&self.raw, self.config.suggest_min, self.config.suggest_max) {
            info!("Suggested threshold {:.3} from {} detections", t, self.raw.len());
            self.threshold = t;
        }
        Ok(())
    }

    /// Begin, await and finish a request in one go.
    pub async fn detect_once(&mut self, client: &dyn DetectorClient) -> Result<()> {
        let ticket = self.begin_request()?;
        let result = client.detect(&ticket.request).await;
        self.finish_request(ticket.generation, result)
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        if threshold.is_nan() {
            return;
        }
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    /// Recompute the display transform for a new width cap and pixel ratio.
    pub fn set_display(&mut self, max_width: f32, device_pixel_ratio: f32) -> Result<()> {
        self.config.max_display_width = max_width;
        self.device_pixel_ratio = device_pixel_ratio;
        if let Some(image) = &self.image {
            let (w, h) = image.natural_size();
            self.transform = Some(DisplayTransform::fit(
                w,
                h,
                max_width,
                self.config.min_display_width.min(max_width),
                device_pixel_ratio,
            )?);
        }
        Ok(())
    }

    pub fn set_show_labels(&mut self, show: bool) {
        self.options.show_labels = show;
    }

    pub fn set_show_legend(&mut self, show: bool) {
        self.options.show_legend = show;
    }

    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.options.line_width = width;
        }
    }

    pub fn set_label_overflow(&mut self, overflow: LabelOverflow) {
        self.options.label_overflow = overflow;
    }

    /// Detections passing the current threshold, recomputed on every call.
    pub fn filtered(&self) -> Vec<&Detection> {
        filter(&self.raw, self.threshold)
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.raw, &self.filtered(), self.meta)
    }

    /// Snapshot for `OverlayRenderer::render`; `None` before an image is selected.
    pub fn render_state(&self) -> Option<RenderState<'_>> {
        let image = self.image.as_ref()?;
        let transform = self.transform?;
        Some(RenderState {
            image: Some(RenderImage {
                id: image.id,
                pixels: &image.pixels,
            }),
            raw: &self.raw,
            filtered: self.filtered(),
            meta: self.meta,
            transform,
            options: self.options,
        })
    }
}
