//! Prediction and text-to-GIF service client
//!
//! Every request is bounded by the configured timeout and aborted when its
//! cancellation token fires.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::capture::{CapturedImage, UPLOAD_FILE_NAME};
use crate::config::ServerConfig;
use crate::{Error, Result};

/// Body returned by the prediction endpoint
///
/// Other fields (the service may attach a `gif`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PredictResponse {
    /// Recognized gesture label
    #[serde(default)]
    pub gesture: Option<String>,

    /// Reason the image was not recognized
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GifResponse {
    #[serde(default)]
    gif: Option<String>,
}

/// HTTP client for the gesture services
#[derive(Debug, Clone)]
pub struct GestureService {
    client: Client,
    base_url: Url,
    predict_url: Url,
    gif_url: Url,
    timeout: Duration,
}

impl GestureService {
    /// Create a client for the configured endpoints
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint path does not form a valid URL
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let predict_url = config.base_url.join(&config.predict_path)?;
        let gif_url = config.base_url.join(&config.gif_path)?;

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            predict_url,
            gif_url,
            timeout: config.request_timeout,
        })
    }

    /// Prediction endpoint URL
    #[must_use]
    pub const fn predict_url(&self) -> &Url {
        &self.predict_url
    }

    /// Submit an image for gesture prediction
    ///
    /// The body is parsed whatever the HTTP status, since the service
    /// reports rejections as `{"error": ...}` with 4xx/5xx codes.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, cancellation or a body
    /// that is not a JSON object
    pub async fn predict(
        &self,
        image: &CapturedImage,
        cancel: &CancellationToken,
    ) -> Result<PredictResponse> {
        tracing::debug!(bytes = image.len(), url = %self.predict_url, "sending prediction request");

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(image.mime_type())
            .map_err(|e| Error::Service(format!("invalid MIME type: {e}")))?;
        let form = Form::new().part("file", part);

        let request = async {
            let response = self
                .client
                .post(self.predict_url.clone())
                .multipart(form)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            tracing::debug!(status = %status, "received prediction response");

            serde_json::from_str::<PredictResponse>(&body).map_err(|e| {
                tracing::warn!(status = %status, error = %e, "malformed prediction response");
                Error::from(e)
            })
        };

        self.bounded("prediction", cancel, request).await
    }

    /// Look up the GIF for a phrase
    ///
    /// Returns `None` when the service has no GIF for it.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, cancellation or a
    /// malformed body
    pub async fn text_to_gif(&self, text: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        tracing::debug!(text, url = %self.gif_url, "sending gif lookup");

        let request = async {
            let response = self
                .client
                .get(self.gif_url.clone())
                .query(&[("text", text)])
                .send()
                .await?;

            let body: GifResponse = response.json().await?;
            Ok(body.gif.filter(|g| !g.is_empty()))
        };

        let gif = self.bounded("gif lookup", cancel, request).await?;
        Ok(gif.map(|g| self.resolve_gif(&g)))
    }

    /// Resolve a GIF reference against the service base URL
    ///
    /// `data:` URIs and absolute URLs are returned unchanged.
    #[must_use]
    pub fn resolve_gif(&self, gif: &str) -> String {
        if gif.starts_with("data:") || Url::parse(gif).is_ok() {
            return gif.to_string();
        }
        self.base_url
            .join(gif)
            .map_or_else(|_| gif.to_string(), String::from)
    }

    async fn bounded<T, F>(&self, what: &str, cancel: &CancellationToken, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(what, "request cancelled");
                Err(Error::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, request) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    tracing::warn!(what, timeout = ?self.timeout, "request timed out");
                    Err(Error::Timeout(format!("{what} exceeded {:?}", self.timeout)))
                }
            },
        }
    }
}
