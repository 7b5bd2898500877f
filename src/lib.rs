//! Signova - webcam, voice and upload client for sign gesture prediction
//!
//! This library drives a remote gesture-prediction service from local
//! inputs:
//! - Camera frames captured on demand or on a timer
//! - Image uploads
//! - Voice commands ("capture", "predict")
//! - Text-to-GIF lookups
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Inputs                            │
//! │  Camera  │  Upload  │  Voice  │  Auto timer  │  Text  │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │                CaptureController                      │
//! │  MediaSession │ CapturedImage │ in-flight guard       │
//! └──────────┬─────────────────────────────┬─────────────┘
//!            │                             │
//! ┌──────────▼──────────┐      ┌───────────▼─────────────┐
//! │   GestureService    │      │      DisplayState       │
//! │ /predict /text_to_gif│      │  status, gesture, GIF   │
//! └─────────────────────┘      └─────────────────────────┘
//! ```

pub mod camera;
pub mod capture;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod service;
pub mod voice;

pub use camera::{CameraDevice, MediaSession, StillCamera, StreamConstraints, VideoStream};
pub use capture::{CapturedImage, ImageSource, UploadedFile};
pub use config::Config;
pub use controller::{CaptureController, GifOutcome, PredictOutcome, SkipReason};
pub use display::{DisplayState, text};
pub use error::{Error, Result};
pub use service::{GestureService, PredictResponse};
pub use voice::{ChannelRecognizer, RecognizerHandle, SpeechRecognizer, VoiceCommand};
