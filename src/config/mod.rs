//! Configuration management for Signova
//!
//! Values resolve with priority env > TOML file > default. CLI flags are
//! applied on top by the binary.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::{Error, Result};

pub use file::{SignovaConfigFile, config_file_path, load_config_file};

/// Default prediction service base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Signova client configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Prediction service configuration
    pub server: ServerConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Auto-capture configuration
    pub auto_capture: AutoCaptureConfig,

    /// Voice command configuration
    pub voice: VoiceConfig,
}

/// Prediction service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL; relative GIF paths resolve against it
    pub base_url: Url,

    /// Path of the prediction endpoint
    pub predict_path: String,

    /// Path of the text-to-GIF endpoint
    pub gif_path: String,

    /// Deadline for every request
    pub request_timeout: Duration,
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Requested stream width
    pub width: u32,

    /// Requested stream height
    pub height: u32,

    /// Edge length of the square prediction image
    pub prediction_size: u32,

    /// JPEG quality (1-100) of the prediction image
    pub jpeg_quality: u8,

    /// Image file or directory served as camera frames
    pub frames: Option<PathBuf>,
}

/// Auto-capture configuration
#[derive(Debug, Clone)]
pub struct AutoCaptureConfig {
    /// Period between capture-then-predict cycles
    pub interval: Duration,
}

/// Voice command configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice commands
    pub enabled: bool,

    /// Recognition locale
    pub locale: String,

    /// Minimum gap between accepted commands
    pub debounce: Duration,

    /// Consecutive failed recognition sessions before the listener gives up
    pub max_restarts: u32,

    /// First restart delay
    pub initial_backoff: Duration,

    /// Upper bound on the restart delay
    pub max_backoff: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_SERVER_URL).expect("default server url is valid"),
            predict_path: "/predict".to_string(),
            gif_path: "/text_to_gif".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            prediction_size: 128,
            jpeg_quality: 80,
            frames: None,
        }
    }
}

impl Default for AutoCaptureConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: "en-US".to_string(),
            debounce: Duration::from_millis(200),
            max_restarts: 10,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn resolve<F>(fc: SignovaConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = match env("SIGNOVA_SERVER_URL").or(fc.server.url) {
            Some(url) => Url::parse(&url)
                .map_err(|e| Error::Config(format!("invalid server url {url:?}: {e}")))?,
            None => defaults.server.base_url,
        };

        let timeout_secs = match env("SIGNOVA_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("SIGNOVA_REQUEST_TIMEOUT_SECS is not a number: {raw}"))
            })?),
            None => fc.server.request_timeout_secs,
        };

        let server = ServerConfig {
            base_url,
            predict_path: fc.server.predict_path.unwrap_or(defaults.server.predict_path),
            gif_path: fc.server.gif_path.unwrap_or(defaults.server.gif_path),
            request_timeout: timeout_secs
                .map_or(defaults.server.request_timeout, Duration::from_secs),
        };

        let camera = CameraConfig {
            width: fc.camera.width.unwrap_or(defaults.camera.width),
            height: fc.camera.height.unwrap_or(defaults.camera.height),
            prediction_size: fc
                .camera
                .prediction_size
                .unwrap_or(defaults.camera.prediction_size),
            jpeg_quality: fc.camera.jpeg_quality.unwrap_or(defaults.camera.jpeg_quality),
            frames: env("SIGNOVA_FRAMES").map(PathBuf::from).or(fc.camera.frames),
        };

        let auto_capture = AutoCaptureConfig {
            interval: fc
                .auto_capture
                .interval_ms
                .map_or(defaults.auto_capture.interval, Duration::from_millis),
        };

        let disabled = env("SIGNOVA_DISABLE_VOICE").is_some_and(|v| is_truthy(&v));
        let voice = VoiceConfig {
            enabled: !disabled && fc.voice.enabled.unwrap_or(defaults.voice.enabled),
            locale: env("SIGNOVA_VOICE_LOCALE")
                .or(fc.voice.locale)
                .unwrap_or(defaults.voice.locale),
            debounce: fc
                .voice
                .debounce_ms
                .map_or(defaults.voice.debounce, Duration::from_millis),
            max_restarts: fc.voice.max_restarts.unwrap_or(defaults.voice.max_restarts),
            initial_backoff: fc
                .voice
                .initial_backoff_ms
                .map_or(defaults.voice.initial_backoff, Duration::from_millis),
            max_backoff: fc
                .voice
                .max_backoff_ms
                .map_or(defaults.voice.max_backoff, Duration::from_millis),
        };

        let config = Self {
            server,
            camera,
            auto_capture,
            voice,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config("camera resolution must be non-zero".to_string()));
        }
        if self.camera.prediction_size == 0 {
            return Err(Error::Config("prediction size must be non-zero".to_string()));
        }
        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg quality must be within 1-100, got {}",
                self.camera.jpeg_quality
            )));
        }
        if self.auto_capture.interval.is_zero() {
            return Err(Error::Config("auto-capture interval must be positive".to_string()));
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(SignovaConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.server.base_url.as_str(), "http://127.0.0.1:5000/");
        assert_eq!(config.server.predict_path, "/predict");
        assert_eq!(config.server.gif_path, "/text_to_gif");
        assert_eq!(config.camera.width, 320);
        assert_eq!(config.camera.height, 240);
        assert_eq!(config.camera.prediction_size, 128);
        assert_eq!(config.camera.jpeg_quality, 80);
        assert_eq!(config.auto_capture.interval, Duration::from_secs(2));
        assert_eq!(config.voice.locale, "en-US");
        assert_eq!(config.voice.debounce, Duration::from_millis(200));
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: SignovaConfigFile = toml::from_str(
            r#"
            [server]
            url = "http://from-file:1"
            request_timeout_secs = 30

            [voice]
            locale = "fr-FR"
            "#,
        )
        .unwrap();

        let config = Config::resolve(
            fc,
            env_from(&[
                ("SIGNOVA_SERVER_URL", "http://from-env:2"),
                ("SIGNOVA_VOICE_LOCALE", "de-DE"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.base_url.as_str(), "http://from-env:2/");
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.voice.locale, "de-DE");
    }

    #[test]
    fn test_disable_voice_env() {
        let config = Config::resolve(
            SignovaConfigFile::default(),
            env_from(&[("SIGNOVA_DISABLE_VOICE", "true")]),
        )
        .unwrap();
        assert!(!config.voice.enabled);

        let config = Config::resolve(
            SignovaConfigFile::default(),
            env_from(&[("SIGNOVA_DISABLE_VOICE", "0")]),
        )
        .unwrap();
        assert!(config.voice.enabled);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = Config::resolve(
            SignovaConfigFile::default(),
            env_from(&[("SIGNOVA_SERVER_URL", "not a url")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = Config::resolve(
            SignovaConfigFile::default(),
            env_from(&[("SIGNOVA_REQUEST_TIMEOUT_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::resolve(
            SignovaConfigFile::default(),
            env_from(&[("SIGNOVA_REQUEST_TIMEOUT_SECS", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_jpeg_quality_range() {
        let fc: SignovaConfigFile = toml::from_str("[camera]\njpeg_quality = 0").unwrap();
        assert!(Config::resolve(fc, env_from(&[])).is_err());
    }
}
