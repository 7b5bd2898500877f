//! Voice command parsing and debouncing

use std::time::{Duration, Instant};

/// Commands recognized in speech
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    /// Capture a frame
    Capture,
    /// Predict the last captured image
    Predict,
}

impl VoiceCommand {
    /// Find a command in a transcript
    ///
    /// Matching is case-insensitive and by substring; "capture" wins over
    /// "predict" when both occur.
    #[must_use]
    pub fn parse(transcript: &str) -> Option<Self> {
        let normalized = transcript.trim().to_lowercase();
        if normalized.contains("capture") {
            Some(Self::Capture)
        } else if normalized.contains("predict") {
            Some(Self::Predict)
        } else {
            None
        }
    }
}

impl std::fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => write!(f, "capture"),
            Self::Predict => write!(f, "predict"),
        }
    }
}

/// Drops results that arrive too soon after the last accepted one
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet window
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Accept or drop a result arriving at `now`
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}
