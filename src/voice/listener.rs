//! Supervised voice command listener
//!
//! Runs recognition sessions back to back on a task, forwarding debounced
//! commands over a channel. A session that ends cleanly (silence included)
//! is restarted after the initial delay. Failed starts and sessions that end on an error
//! are retried with exponential backoff until the restart budget is spent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::command::{Debouncer, VoiceCommand};
use super::recognizer::{RecognitionOptions, RecognitionSession, SpeechEvent, SpeechRecognizer};
use crate::config::VoiceConfig;

/// Bounds on restarting failed sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Consecutive failed sessions tolerated before giving up
    pub max_restarts: u32,
    /// Delay before the first retry, and before restarting a clean session
    pub initial_backoff: Duration,
    /// Upper bound on the delay
    pub max_backoff: Duration,
}

impl RestartPolicy {
    /// Policy from voice configuration
    #[must_use]
    pub const fn from_config(config: &VoiceConfig) -> Self {
        Self {
            max_restarts: config.max_restarts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }

    /// Delay before restart number `attempt` (0-based)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Why the listener stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// Stopped through its cancellation token
    Cancelled,
    /// Too many consecutive failed sessions
    RestartLimit,
    /// Nobody receives commands anymore
    Closed,
}

enum SessionEnd {
    /// `failed` when an error was reported after the last final result
    Ended { failed: bool },
    Cancelled,
    Closed,
}

/// Handle to a running listener task
pub struct VoiceListener {
    cancel: CancellationToken,
    handle: JoinHandle<ListenerExit>,
}

impl VoiceListener {
    /// Spawn the listener
    #[must_use]
    pub fn spawn(
        recognizer: Arc<dyn SpeechRecognizer>,
        options: RecognitionOptions,
        policy: RestartPolicy,
        debounce: Duration,
        commands: mpsc::Sender<VoiceCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(run_listener(
            recognizer,
            options,
            policy,
            Debouncer::new(debounce),
            commands,
            cancel.clone(),
        ));
        Self { cancel, handle }
    }

    /// Whether the task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the listener and wait for it to exit
    pub async fn stop(self) -> ListenerExit {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the listener to exit on its own
    pub async fn join(self) -> ListenerExit {
        self.handle.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "voice listener task failed");
            ListenerExit::Cancelled
        })
    }
}

async fn run_listener(
    recognizer: Arc<dyn SpeechRecognizer>,
    options: RecognitionOptions,
    policy: RestartPolicy,
    mut debouncer: Debouncer,
    commands: mpsc::Sender<VoiceCommand>,
    cancel: CancellationToken,
) -> ListenerExit {
    let mut failures: u32 = 0;

    loop {
        let started = tokio::select! {
            biased;
            () = cancel.cancelled() => return ListenerExit::Cancelled,
            started = recognizer.start(&options) => started,
        };

        let failed = match started {
            Ok(session) => {
                tracing::debug!(locale = %options.locale, "listening for voice commands");
                match run_session(session, &mut debouncer, &commands, &cancel).await {
                    SessionEnd::Ended { failed } => failed,
                    SessionEnd::Cancelled => return ListenerExit::Cancelled,
                    SessionEnd::Closed => return ListenerExit::Closed,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to start speech recognition");
                true
            }
        };

        let delay = if failed {
            if failures >= policy.max_restarts {
                tracing::error!(failures, "speech recognition keeps failing, voice commands disabled");
                return ListenerExit::RestartLimit;
            }
            let delay = policy.backoff(failures);
            failures += 1;
            delay
        } else {
            failures = 0;
            policy.initial_backoff
        };
        tracing::debug!(failures, delay = ?delay, "restarting speech recognition");

        tokio::select! {
            biased;
            () = cancel.cancelled() => return ListenerExit::Cancelled,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_session(
    mut session: Box<dyn RecognitionSession>,
    debouncer: &mut Debouncer,
    commands: &mpsc::Sender<VoiceCommand>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let mut failed = false;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            event = session.next_event() => event,
        };

        match event {
            None => {
                tracing::debug!(failed, "speech recognition session ended");
                return SessionEnd::Ended { failed };
            }
            Some(SpeechEvent::Error(message)) => {
                tracing::warn!(error = %message, "speech recognition error");
                failed = true;
            }
            Some(SpeechEvent::Result { is_final: false, .. }) => {}
            Some(SpeechEvent::Result {
                transcript,
                is_final: true,
            }) => {
                failed = false;
                if !debouncer.accept(Instant::now()) {
                    tracing::trace!(transcript = %transcript, "debounced speech result");
                    continue;
                }
                let Some(command) = VoiceCommand::parse(&transcript) else {
                    tracing::trace!(transcript = %transcript, "no command in speech");
                    continue;
                };
                tracing::info!(%command, transcript = %transcript, "voice command");
                if commands.send(command).await.is_err() {
                    return SessionEnd::Closed;
                }
            }
        }
    }
}
