//! Speech recognition capability

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::{Error, Result};

/// Options for a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Keep listening after a result
    pub continuous: bool,
    /// Deliver partial hypotheses
    pub interim_results: bool,
    /// Recognition locale (e.g. "en-US")
    pub locale: String,
}

impl RecognitionOptions {
    /// Continuous, final-results-only recognition in a locale
    #[must_use]
    pub fn continuous(locale: impl Into<String>) -> Self {
        Self {
            continuous: true,
            interim_results: false,
            locale: locale.into(),
        }
    }
}

/// Events produced by a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A recognized utterance
    Result {
        /// Best transcript
        transcript: String,
        /// Whether the hypothesis is final
        is_final: bool,
    },
    /// A recoverable recognition error
    Error(String),
}

/// A speech recognition engine
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Start a new session
    async fn start(&self, options: &RecognitionOptions) -> Result<Box<dyn RecognitionSession>>;
}

/// A running recognition session
#[async_trait]
pub trait RecognitionSession: Send {
    /// Next event, or `None` once the session has ended
    async fn next_event(&mut self) -> Option<SpeechEvent>;
}

enum Feed {
    Event(SpeechEvent),
    EndSession,
}

/// Recognizer fed with transcripts from elsewhere
///
/// Sessions read from one shared queue. Ending a session through the
/// handle makes the current session return `None`; dropping every handle
/// ends the session and makes further `start` calls fail.
pub struct ChannelRecognizer {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Feed>>>,
}

/// Feeding side of a [`ChannelRecognizer`]
#[derive(Clone)]
pub struct RecognizerHandle {
    tx: mpsc::UnboundedSender<Feed>,
}

impl ChannelRecognizer {
    /// Create a recognizer and the handle that feeds it
    #[must_use]
    pub fn new() -> (Self, RecognizerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
            RecognizerHandle { tx },
        )
    }
}

impl RecognizerHandle {
    /// Deliver a final transcript
    pub fn say(&self, transcript: impl Into<String>) {
        self.send(Feed::Event(SpeechEvent::Result {
            transcript: transcript.into(),
            is_final: true,
        }));
    }

    /// Deliver an arbitrary event
    pub fn event(&self, event: SpeechEvent) {
        self.send(Feed::Event(event));
    }

    /// Deliver a recognition error
    pub fn fail(&self, message: impl Into<String>) {
        self.send(Feed::Event(SpeechEvent::Error(message.into())));
    }

    /// End the current session
    pub fn end_session(&self) {
        self.send(Feed::EndSession);
    }

    fn send(&self, feed: Feed) {
        if self.tx.send(feed).is_err() {
            tracing::debug!("recognizer dropped, discarding speech input");
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&self, options: &RecognitionOptions) -> Result<Box<dyn RecognitionSession>> {
        if self.rx.lock().await.is_closed() {
            return Err(Error::Voice("speech input closed".to_string()));
        }
        tracing::debug!(locale = %options.locale, "recognition session started");
        Ok(Box::new(ChannelSession {
            rx: Arc::clone(&self.rx),
        }))
    }
}

struct ChannelSession {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Feed>>>,
}

#[async_trait]
impl RecognitionSession for ChannelSession {
    async fn next_event(&mut self) -> Option<SpeechEvent> {
        match self.rx.lock().await.recv().await {
            Some(Feed::Event(event)) => Some(event),
            Some(Feed::EndSession) | None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_yields_events_until_end() {
        let (recognizer, handle) = ChannelRecognizer::new();
        let mut session = recognizer
            .start(&RecognitionOptions::continuous("en-US"))
            .await
            .unwrap();

        handle.say("capture");
        handle.fail("no-speech");
        handle.end_session();
        handle.say("predict");

        assert_eq!(
            session.next_event().await,
            Some(SpeechEvent::Result {
                transcript: "capture".to_string(),
                is_final: true
            })
        );
        assert_eq!(
            session.next_event().await,
            Some(SpeechEvent::Error("no-speech".to_string()))
        );
        assert_eq!(session.next_event().await, None);

        let mut next = recognizer
            .start(&RecognitionOptions::continuous("en-US"))
            .await
            .unwrap();
        assert!(matches!(
            next.next_event().await,
            Some(SpeechEvent::Result { transcript, .. }) if transcript == "predict"
        ));
    }

    #[tokio::test]
    async fn test_start_fails_once_handles_dropped() {
        let (recognizer, handle) = ChannelRecognizer::new();
        drop(handle);

        let result = recognizer
            .start(&RecognitionOptions::continuous("en-US"))
            .await;
        assert!(matches!(result, Err(Error::Voice(_))));
    }

    #[test]
    fn test_continuous_options() {
        let options = RecognitionOptions::continuous("en-US");
        assert!(options.continuous);
        assert!(!options.interim_results);
        assert_eq!(options.locale, "en-US");
    }
}
