//! Camera backed by still images on disk
//!
//! Frames are decoded when the stream opens, scaled to the requested
//! resolution, and served round-robin on each capture.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::RgbImage;
use image::imageops::{self, FilterType};

use super::{CameraDevice, StreamConstraints, StreamMetadata, VideoStream};
use crate::{Error, Result};

/// Image extensions picked up from a frames directory
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Where the still camera gets its frames
#[derive(Debug, Clone)]
enum FrameSource {
    Path(PathBuf),
    Memory(Vec<RgbImage>),
}

/// Serves frames from an image file, a directory of images, or memory
#[derive(Debug, Clone)]
pub struct StillCamera {
    source: FrameSource,
}

impl StillCamera {
    /// Camera reading a single image or every image in a directory
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: FrameSource::Path(path.into()),
        }
    }

    /// Camera serving in-memory frames
    #[must_use]
    pub const fn from_frames(frames: Vec<RgbImage>) -> Self {
        Self {
            source: FrameSource::Memory(frames),
        }
    }
}

#[async_trait]
impl CameraDevice for StillCamera {
    async fn open(&self, constraints: StreamConstraints) -> Result<Arc<dyn VideoStream>> {
        let source = self.source.clone();
        let frames = tokio::task::spawn_blocking(move || match source {
            FrameSource::Path(path) => load_frames(&path),
            FrameSource::Memory(frames) => Ok(frames),
        })
        .await
        .map_err(|e| Error::Camera(format!("frame loader panicked: {e}")))??;

        if frames.is_empty() {
            return Err(Error::Camera("no frames available".to_string()));
        }

        let frames: Vec<RgbImage> = frames
            .iter()
            .map(|f| {
                if f.dimensions() == (constraints.width, constraints.height) {
                    f.clone()
                } else {
                    imageops::resize(f, constraints.width, constraints.height, FilterType::Triangle)
                }
            })
            .collect();

        tracing::debug!(
            frames = frames.len(),
            width = constraints.width,
            height = constraints.height,
            "still camera opened"
        );

        Ok(Arc::new(StillStream {
            frames,
            cursor: AtomicUsize::new(0),
            metadata: StreamMetadata {
                width: constraints.width,
                height: constraints.height,
            },
        }))
    }
}

struct StillStream {
    frames: Vec<RgbImage>,
    cursor: AtomicUsize,
    metadata: StreamMetadata,
}

#[async_trait]
impl VideoStream for StillStream {
    async fn metadata(&self) -> Result<StreamMetadata> {
        Ok(self.metadata)
    }

    fn current_frame(&self) -> Result<RgbImage> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Ok(self.frames[idx].clone())
    }
}

fn load_frames(path: &Path) -> Result<Vec<RgbImage>> {
    if !path.exists() {
        return Err(Error::Camera(format!("no such frame source: {}", path.display())));
    }

    if path.is_file() {
        return Ok(vec![image::open(path)?.to_rgb8()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_frame_extension(p))
        .collect();
    files.sort();

    let mut frames = Vec::with_capacity(files.len());
    for file in files {
        match image::open(&file) {
            Ok(img) => frames.push(img.to_rgb8()),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "skipping unreadable frame");
            }
        }
    }

    Ok(frames)
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
