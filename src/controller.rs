//! Capture controller
//!
//! Owns the camera session, the last captured image, the in-flight
//! prediction guard, the auto-capture task and the voice listener. Every
//! user action (button, upload, voice command, timer tick) goes through a
//! [`CaptureController`] handle; clones share the same state.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraDevice, MediaSession, StreamConstraints};
use crate::capture::{CapturedImage, UploadedFile, encode_capture};
use crate::config::Config;
use crate::display::{Display, DisplayState, text};
use crate::service::GestureService;
use crate::voice::{
    ListenerExit, RecognitionOptions, RestartPolicy, SpeechRecognizer, VoiceCommand, VoiceListener,
};
use crate::{Error, Result};

/// Result of a prediction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictOutcome {
    /// Nothing was sent
    Skipped(SkipReason),
    /// The service recognized a gesture
    Recognized(String),
    /// The service answered without a gesture; carries the message shown
    NotRecognized(String),
    /// Transport failure, timeout or malformed response
    Failed(String),
    /// Cancelled before a response arrived; only the "predicting" status
    /// is rolled back
    Cancelled,
}

/// Why a prediction was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No image captured or uploaded yet
    NoImage,
    /// Another prediction is still in flight
    InFlight,
}

/// Result of a GIF lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GifOutcome {
    /// Blank text; nothing was sent
    Skipped,
    /// GIF source now displayed
    Found(String),
    /// The service has no GIF for the text
    NotFound,
    /// Transport failure, timeout or malformed response
    Failed(String),
    /// Cancelled before a response arrived
    Cancelled,
}

struct AutoCapture {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct VoiceTask {
    listener: VoiceListener,
    dispatcher: JoinHandle<()>,
}

struct Inner {
    config: Config,
    camera: Arc<dyn CameraDevice>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    service: GestureService,
    display: Display,
    session: Mutex<Option<MediaSession>>,
    last_image: Mutex<Option<CapturedImage>>,
    predicting: AtomicBool,
    auto_capture: Mutex<Option<AutoCapture>>,
    voice: Mutex<Option<VoiceTask>>,
    requests: CancellationToken,
}

/// Holds the in-flight flag; releasing it on drop covers every exit path
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to the capture/predict state machine
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Inner>,
}

impl CaptureController {
    /// Create a controller
    ///
    /// Pass `None` as recognizer when speech recognition is unavailable;
    /// voice commands then degrade to a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(
        config: Config,
        camera: Arc<dyn CameraDevice>,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
    ) -> Result<Self> {
        config.validate()?;
        let service = GestureService::new(&config.server)?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                camera,
                recognizer,
                service,
                display: Display::new(),
                session: Mutex::new(None),
                last_image: Mutex::new(None),
                predicting: AtomicBool::new(false),
                auto_capture: Mutex::new(None),
                voice: Mutex::new(None),
                requests: CancellationToken::new(),
            }),
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current display state
    #[must_use]
    pub fn display(&self) -> DisplayState {
        self.inner.display.snapshot()
    }

    /// Subscribe to display changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.inner.display.subscribe()
    }

    /// The most recently captured or uploaded image
    pub async fn last_image(&self) -> Option<CapturedImage> {
        self.inner.last_image.lock().await.clone()
    }

    /// Whether the camera is delivering frames
    pub async fn is_camera_ready(&self) -> bool {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(MediaSession::is_ready)
    }

    /// Whether a prediction request is outstanding
    #[must_use]
    pub fn is_predicting(&self) -> bool {
        self.inner.predicting.load(Ordering::Acquire)
    }

    /// Whether auto-capture mode is on
    pub async fn is_auto_capturing(&self) -> bool {
        self.inner.auto_capture.lock().await.is_some()
    }

    /// Whether the voice listener is running
    pub async fn is_listening(&self) -> bool {
        self.inner
            .voice
            .lock()
            .await
            .as_ref()
            .is_some_and(|v| !v.listener.is_finished())
    }

    /// Acquire the camera stream and wait until it is ready
    ///
    /// On failure the session stays not-ready and the status reports that
    /// the webcam is unavailable. There is no automatic retry.
    ///
    /// # Errors
    ///
    /// Returns the camera error after updating the status
    pub async fn start_camera(&self) -> Result<()> {
        let camera = &self.inner.config.camera;
        let constraints = StreamConstraints::video(camera.width, camera.height);
        self.inner.display.set_status(text::STARTING);

        let stream = match self.inner.camera.open(constraints).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.camera_failed(e).await),
        };
        *self.inner.session.lock().await = Some(MediaSession::new(Arc::clone(&stream)));

        let metadata = match stream.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => return Err(self.camera_failed(e).await),
        };

        if let Some(session) = self.inner.session.lock().await.as_mut() {
            session.mark_ready(metadata);
        }
        self.inner.display.set_status(text::WEBCAM_READY);
        tracing::info!(width = metadata.width, height = metadata.height, "webcam ready");
        Ok(())
    }

    async fn camera_failed(&self, error: Error) -> Error {
        tracing::error!(error = %error, "webcam error");
        *self.inner.session.lock().await = None;
        self.inner.display.set_status(text::WEBCAM_UNAVAILABLE);
        error
    }

    /// Release the camera stream
    pub async fn stop_camera(&self) {
        if self.inner.session.lock().await.take().is_some() {
            self.inner.display.set_status(text::WEBCAM_STOPPED);
            tracing::debug!("webcam released");
        }
    }

    /// Capture the current frame
    ///
    /// Returns `Ok(None)` without touching any state when the camera is not
    /// ready. Otherwise the encoded prediction image replaces the last
    /// image and the preview shows the full-resolution frame.
    ///
    /// # Errors
    ///
    /// Returns error if the frame cannot be read or encoded
    pub async fn capture_frame(&self) -> Result<Option<CapturedImage>> {
        let stream = {
            let session = self.inner.session.lock().await;
            match session.as_ref() {
                Some(s) if s.is_ready() => s.stream(),
                _ => {
                    tracing::debug!("camera not ready, ignoring capture");
                    return Ok(None);
                }
            }
        };

        let camera = &self.inner.config.camera;
        let (size, quality) = (camera.prediction_size, camera.jpeg_quality);

        let encoded = async {
            let frame = stream.current_frame()?;
            tokio::task::spawn_blocking(move || encode_capture(&frame, size, quality))
                .await
                .map_err(|e| Error::Capture(format!("encoder task failed: {e}")))?
        }
        .await;

        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed");
                self.inner.display.set_status(text::CAPTURE_FAILED);
                return Err(e);
            }
        };

        *self.inner.last_image.lock().await = Some(encoded.image.clone());
        self.inner.display.update(|s| {
            s.preview = Some(encoded.preview);
            text::FRAME_CAPTURED.clone_into(&mut s.status);
        });

        tracing::debug!(bytes = encoded.image.len(), "frame captured");
        Ok(Some(encoded.image))
    }

    /// Predict the gesture in an image
    ///
    /// Only one prediction may be in flight; calls made meanwhile return
    /// [`SkipReason::InFlight`] without queuing.
    pub async fn predict(&self, image: Option<CapturedImage>) -> PredictOutcome {
        let cancel = self.inner.requests.child_token();
        self.predict_with(image, &cancel).await
    }

    /// Predict the most recently captured or uploaded image
    pub async fn predict_last(&self) -> PredictOutcome {
        let image = self.last_image().await;
        self.predict(image).await
    }

    async fn predict_with(
        &self,
        image: Option<CapturedImage>,
        cancel: &CancellationToken,
    ) -> PredictOutcome {
        let Some(image) = image else {
            tracing::debug!("no image to predict");
            return PredictOutcome::Skipped(SkipReason::NoImage);
        };
        let Some(_guard) = InFlight::acquire(&self.inner.predicting) else {
            tracing::debug!("prediction already in flight");
            return PredictOutcome::Skipped(SkipReason::InFlight);
        };

        let display = &self.inner.display;
        let mut previous_status = String::new();
        display.update(|s| {
            previous_status = std::mem::replace(&mut s.status, text::PREDICTING.to_string());
        });

        match self.inner.service.predict(&image, cancel).await {
            Ok(response) => {
                if let Some(gesture) = response.gesture.filter(|g| !g.is_empty()) {
                    tracing::info!(gesture = %gesture, "gesture detected");
                    display.update(|s| {
                        s.gesture.clone_from(&gesture);
                        s.gif.clear();
                        text::GESTURE_DETECTED.clone_into(&mut s.status);
                    });
                    PredictOutcome::Recognized(gesture)
                } else {
                    let message = response
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| text::NOT_RECOGNIZED.to_string());
                    tracing::info!(message = %message, "gesture not recognized");
                    display.update(|s| {
                        s.gesture.clone_from(&message);
                        s.gif.clear();
                        text::TRY_AGAIN.clone_into(&mut s.status);
                    });
                    PredictOutcome::NotRecognized(message)
                }
            }
            Err(Error::Cancelled) => {
                tracing::debug!("prediction cancelled");
                display.update(|s| {
                    if s.status == text::PREDICTING {
                        s.status = previous_status;
                    }
                });
                PredictOutcome::Cancelled
            }
            Err(e) => {
                tracing::warn!(error = %e, "prediction error");
                display.update(|s| {
                    text::PREDICTION_ERROR.clone_into(&mut s.gesture);
                    s.gif.clear();
                    text::TRY_AGAIN.clone_into(&mut s.status);
                });
                PredictOutcome::Failed(e.to_string())
            }
        }
    }

    /// Flip auto-capture mode, returning whether it is now on
    ///
    /// While on, every period captures a frame and then predicts the last
    /// image, strictly in that order.
    pub async fn toggle_auto_capture(&self) -> bool {
        let mut slot = self.inner.auto_capture.lock().await;

        if let Some(auto) = slot.take() {
            auto.cancel.cancel();
            drop(auto.handle);
            self.inner.display.update(|s| {
                text::AUTO_LABEL_START.clone_into(&mut s.auto_label);
                text::AUTO_STOPPED.clone_into(&mut s.status);
            });
            tracing::info!("auto capture stopped");
            return false;
        }

        let cancel = self.inner.requests.child_token();
        let handle = tokio::spawn(self.clone().auto_capture_loop(cancel.clone()));
        *slot = Some(AutoCapture { cancel, handle });

        self.inner.display.update(|s| {
            text::AUTO_LABEL_STOP.clone_into(&mut s.auto_label);
            text::AUTO_STARTED.clone_into(&mut s.status);
        });
        tracing::info!(interval = ?self.inner.config.auto_capture.interval, "auto capture started");
        true
    }

    async fn auto_capture_loop(self, cancel: CancellationToken) {
        let period = self.inner.config.auto_capture.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // runs to completion; the prediction itself observes `cancel`
            self.auto_capture_tick(&cancel).await;
        }

        tracing::debug!("auto capture loop exited");
    }

    async fn auto_capture_tick(&self, cancel: &CancellationToken) {
        if let Err(e) = self.capture_frame().await {
            tracing::debug!(error = %e, "auto capture frame failed");
        }
        if cancel.is_cancelled() {
            return;
        }
        let image = self.last_image().await;
        let outcome = self.predict_with(image, cancel).await;
        tracing::debug!(?outcome, "auto capture tick");
    }

    /// Use an uploaded file as the image and predict it
    ///
    /// `None` (no file chosen) is a no-op. Any file is accepted; a format
    /// the service cannot read comes back as an unrecognized prediction.
    pub async fn handle_upload(&self, file: Option<UploadedFile>) -> PredictOutcome {
        let Some(file) = file else {
            return PredictOutcome::Skipped(SkipReason::NoImage);
        };

        let name = file.name.clone();
        let image = file.into_image();

        *self.inner.last_image.lock().await = Some(image.clone());
        let preview = image.to_data_uri();
        self.inner.display.update(|s| s.preview = Some(preview));
        tracing::info!(file = %name, mime = image.mime_type(), bytes = image.len(), "image uploaded");

        self.predict(Some(image)).await
    }

    /// Read a file from disk and handle it as an upload
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn upload_path(&self, path: &Path) -> Result<PredictOutcome> {
        let file = UploadedFile::read(path).await?;
        Ok(self.handle_upload(Some(file)).await)
    }

    /// Look up and display the GIF for a phrase
    ///
    /// Blank text is a no-op. A missing GIF or a failed lookup clears the
    /// GIF and says so in the status line.
    pub async fn lookup_gif(&self, phrase: &str) -> GifOutcome {
        let query = phrase.trim();
        if query.is_empty() {
            return GifOutcome::Skipped;
        }

        let cancel = self.inner.requests.child_token();
        let display = &self.inner.display;

        match self.inner.service.text_to_gif(query, &cancel).await {
            Ok(Some(gif)) => {
                tracing::info!(text = query, gif = %gif, "gif found");
                display.update(|s| s.gif.clone_from(&gif));
                GifOutcome::Found(gif)
            }
            Ok(None) => {
                tracing::info!(text = query, "no gif for text");
                display.update(|s| {
                    s.gif.clear();
                    text::GIF_NOT_FOUND.clone_into(&mut s.status);
                });
                GifOutcome::NotFound
            }
            Err(Error::Cancelled) => GifOutcome::Cancelled,
            Err(e) => {
                tracing::warn!(error = %e, "gif lookup error");
                display.update(|s| {
                    s.gif.clear();
                    text::GIF_FAILED.clone_into(&mut s.status);
                });
                GifOutcome::Failed(e.to_string())
            }
        }
    }

    /// Start listening for voice commands
    ///
    /// Returns `false` when speech recognition is unavailable or disabled.
    /// Commands run one after another in the order spoken.
    pub async fn start_voice_commands(&self) -> bool {
        let voice = &self.inner.config.voice;
        let Some(recognizer) = self.inner.recognizer.clone().filter(|_| voice.enabled) else {
            tracing::debug!("speech recognition unavailable");
            return false;
        };

        let mut slot = self.inner.voice.lock().await;
        if slot.as_ref().is_some_and(|v| !v.listener.is_finished()) {
            return true;
        }

        let (tx, mut rx) = mpsc::channel(8);
        let listener = VoiceListener::spawn(
            recognizer,
            RecognitionOptions::continuous(voice.locale.clone()),
            RestartPolicy::from_config(voice),
            voice.debounce,
            tx,
            self.inner.requests.child_token(),
        );

        let controller = self.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                controller.run_voice_command(command).await;
            }
        });

        *slot = Some(VoiceTask {
            listener,
            dispatcher,
        });
        true
    }

    async fn run_voice_command(&self, command: VoiceCommand) {
        match command {
            VoiceCommand::Capture => {
                if let Err(e) = self.capture_frame().await {
                    tracing::debug!(error = %e, "voice capture failed");
                }
            }
            VoiceCommand::Predict => {
                let outcome = self.predict_last().await;
                tracing::debug!(?outcome, "voice prediction");
            }
        }
    }

    /// Stop the voice listener, returning why it exited
    pub async fn stop_voice_commands(&self) -> Option<ListenerExit> {
        let task = self.inner.voice.lock().await.take()?;
        let exit = task.listener.stop().await;
        task.dispatcher.abort();
        tracing::debug!(?exit, "voice commands stopped");
        Some(exit)
    }

    /// Stop every background task, cancel outstanding requests and release
    /// the camera
    pub async fn shutdown(&self) {
        if let Some(auto) = self.inner.auto_capture.lock().await.take() {
            auto.cancel.cancel();
            auto.handle.abort();
        }
        self.stop_voice_commands().await;
        self.inner.requests.cancel();
        self.stop_camera().await;
        tracing::info!("capture controller shut down");
    }
}
