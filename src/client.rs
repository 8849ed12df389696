/// Detector service seam
///
/// `DetectionSession` only ever sees a `DetectorClient`. The HTTP
/// implementation posts one multipart form per call; `SavedResponseClient`
/// replays a response captured earlier, which keeps the CLI usable offline.
use std::path::PathBuf;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::error::{OverlayError, Result};

pub const DETECT_PATH: &str = "/api/detect/basic/";

/// Everything sent for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub model: String,
    pub min_confidence: f32,
}

pub trait DetectorClient {
    /// Submit one image and return the raw response body.
    fn detect<'a>(&'a self, request: &'a DetectRequest) -> BoxFuture<'a, Result<Value>>;
}

pub fn detect_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), DETECT_PATH)
}

fn transport_error(e: reqwest::Error) -> OverlayError {
    OverlayError::RequestFailed {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

pub struct HttpDetectorClient {
    client: reqwest::Client,
    url: String,
}

impl HttpDetectorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("obbview/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            url: detect_url(base_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &DetectRequest) -> Result<Value> {
        let part = Part::bytes(request.bytes.clone()).file_name(request.file_name.clone());
        let form = Form::new()
            .part("image", part)
            .text("model", request.model.clone())
            .text("conf", request.min_confidence.to_string());

        info!("POST {} ({}, {} bytes, model={})", self.url, request.file_name, request.bytes.len(), request.model);
        let resp = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(OverlayError::RequestFailed {
                status: Some(status.as_u16()),
                message: message.trim().to_string(),
            });
        }

        let body = resp.json::<Value>().await.map_err(transport_error)?;
        debug!("Detector answered {}", status);
        Ok(body)
    }
}

impl DetectorClient for HttpDetectorClient {
    fn detect<'a>(&'a self, request: &'a DetectRequest) -> BoxFuture<'a, Result<Value>> {
        self.post(request).boxed()
    }
}

/// Replays a detector response saved to disk.
pub struct SavedResponseClient {
    path: PathBuf,
}

impl SavedResponseClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self, request: &DetectRequest) -> Result<Value> {
        info!("Replaying saved response {} for {}", self.path.display(), request.file_name);
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl DetectorClient for SavedResponseClient {
    fn detect<'a>(&'a self, request: &'a DetectRequest) -> BoxFuture<'a, Result<Value>> {
        self.read(request).boxed()
    }
}
