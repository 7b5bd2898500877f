//! Camera capability
//!
//! The controller only sees these traits; the device behind them may be a
//! real webcam or [`StillCamera`] serving frames from disk.

mod still;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::Result;

pub use still::StillCamera;

/// Requested stream shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Requested width in pixels
    pub width: u32,
    /// Requested height in pixels
    pub height: u32,
    /// Whether an audio track is wanted
    pub audio: bool,
}

impl StreamConstraints {
    /// Video-only constraints at the given resolution
    #[must_use]
    pub const fn video(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            audio: false,
        }
    }
}

/// Stream properties known once the device has started delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Actual frame width
    pub width: u32,
    /// Actual frame height
    pub height: u32,
}

/// A video input device
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Acquire a stream matching the constraints
    ///
    /// Fails when access is denied or no device is present.
    async fn open(&self, constraints: StreamConstraints) -> Result<Arc<dyn VideoStream>>;
}

/// A live video stream
#[async_trait]
pub trait VideoStream: Send + Sync {
    /// Resolve once the stream's metadata is available
    async fn metadata(&self) -> Result<StreamMetadata>;

    /// The frame currently being shown
    fn current_frame(&self) -> Result<RgbImage>;
}

/// The active camera stream and its readiness
pub struct MediaSession {
    stream: Arc<dyn VideoStream>,
    metadata: Option<StreamMetadata>,
}

impl MediaSession {
    /// Bind a freshly opened stream; not ready until metadata arrives
    #[must_use]
    pub fn new(stream: Arc<dyn VideoStream>) -> Self {
        Self {
            stream,
            metadata: None,
        }
    }

    /// Record the stream metadata, making the session ready
    pub const fn mark_ready(&mut self, metadata: StreamMetadata) {
        self.metadata = Some(metadata);
    }

    /// Whether frames can be captured
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.metadata.is_some()
    }

    /// Stream metadata, once known
    #[must_use]
    pub const fn metadata(&self) -> Option<StreamMetadata> {
        self.metadata
    }

    /// The underlying stream
    #[must_use]
    pub fn stream(&self) -> Arc<dyn VideoStream> {
        Arc::clone(&self.stream)
    }
}

impl std::fmt::Debug for MediaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSession")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
