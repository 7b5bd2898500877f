//! Voice command processing
//!
//! Speech recognition is a platform capability behind [`SpeechRecognizer`].
//! The supervised [`VoiceListener`] turns its results into [`VoiceCommand`]s.

mod command;
mod listener;
mod recognizer;

pub use command::{Debouncer, VoiceCommand};
pub use listener::{ListenerExit, RestartPolicy, VoiceListener};
pub use recognizer::{
    ChannelRecognizer, RecognitionOptions, RecognitionSession, RecognizerHandle, SpeechEvent,
    SpeechRecognizer,
};
