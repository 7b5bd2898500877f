//! User-facing display state
//!
//! The controller never touches a UI directly. It publishes a
//! [`DisplayState`] that front ends subscribe to and render.

use tokio::sync::watch;

/// Status and result texts shown to the user
pub mod text {
    pub const STARTING: &str = "Starting webcam...";
    pub const WEBCAM_READY: &str = "Webcam ready. Show your hand or say 'capture'.";
    pub const WEBCAM_UNAVAILABLE: &str = "Unable to access webcam.";
    pub const WEBCAM_STOPPED: &str = "Webcam stopped.";
    pub const FRAME_CAPTURED: &str = "Frame captured! Press Predict or say 'predict'.";
    pub const CAPTURE_FAILED: &str = "Could not capture a frame.";
    pub const PREDICTING: &str = "Predicting...";
    pub const GESTURE_DETECTED: &str = "Gesture detected!";
    pub const TRY_AGAIN: &str = "Try again!";
    pub const NOT_RECOGNIZED: &str = "Not recognized!";
    pub const PREDICTION_ERROR: &str = "Prediction error!";
    pub const AUTO_STARTED: &str = "Auto capture started.";
    pub const AUTO_STOPPED: &str = "Auto capture stopped.";
    pub const AUTO_LABEL_START: &str = "Auto";
    pub const AUTO_LABEL_STOP: &str = "Stop Auto";
    pub const GIF_NOT_FOUND: &str = "No GIF found for that text.";
    pub const GIF_FAILED: &str = "GIF lookup failed. Try again!";
}

/// Everything the user sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Instruction/status line
    pub status: String,
    /// Gesture result line
    pub gesture: String,
    /// GIF source; empty when nothing is shown
    pub gif: String,
    /// Preview image source, once something was captured or uploaded
    pub preview: Option<String>,
    /// Label of the auto-capture button
    pub auto_label: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            status: String::new(),
            gesture: String::new(),
            gif: String::new(),
            preview: None,
            auto_label: text::AUTO_LABEL_START.to_string(),
        }
    }
}

/// Publisher of [`DisplayState`] changes
#[derive(Debug)]
pub struct Display {
    tx: watch::Sender<DisplayState>,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    /// Create a display showing the initial state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DisplayState::default());
        Self { tx }
    }

    /// Apply a change and notify subscribers
    pub fn update(&self, change: impl FnOnce(&mut DisplayState)) {
        self.tx.send_modify(change);
    }

    /// Replace the status line
    pub fn set_status(&self, status: &str) {
        self.update(|s| status.clone_into(&mut s.status));
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> DisplayState {
        self.tx.borrow().clone()
    }

    /// Receive every future change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.tx.subscribe()
    }
}
