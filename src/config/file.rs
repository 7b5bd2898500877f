//! TOML configuration file loading
//!
//! Supports `~/.config/signova/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SignovaConfigFile {
    /// Prediction service endpoints
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Camera and frame encoding
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Auto-capture mode
    #[serde(default)]
    pub auto_capture: AutoCaptureFileConfig,

    /// Voice commands
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Prediction service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Base URL of the service (e.g. "http://127.0.0.1:5000")
    pub url: Option<String>,

    /// Path of the prediction endpoint
    pub predict_path: Option<String>,

    /// Path of the text-to-GIF endpoint
    pub gif_path: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Requested stream width
    pub width: Option<u32>,

    /// Requested stream height
    pub height: Option<u32>,

    /// Edge length of the square prediction image
    pub prediction_size: Option<u32>,

    /// JPEG quality (1-100) of the prediction image
    pub jpeg_quality: Option<u8>,

    /// Image file or directory served as camera frames
    pub frames: Option<PathBuf>,
}

/// Auto-capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AutoCaptureFileConfig {
    /// Period between captures in milliseconds
    pub interval_ms: Option<u64>,
}

/// Voice command configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice commands
    pub enabled: Option<bool>,

    /// Recognition locale (e.g. "en-US")
    pub locale: Option<String>,

    /// Minimum gap between accepted commands in milliseconds
    pub debounce_ms: Option<u64>,

    /// Consecutive failed recognition sessions before the listener gives up
    pub max_restarts: Option<u32>,

    /// First restart delay in milliseconds
    pub initial_backoff_ms: Option<u64>,

    /// Upper bound on the restart delay in milliseconds
    pub max_backoff_ms: Option<u64>,
}

/// Location of the config file: `~/.config/signova/config.toml` on Linux
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("signova").join("config.toml"))
}

/// Load the config file, falling back to defaults when absent or invalid
#[must_use]
pub fn load_config_file() -> SignovaConfigFile {
    let Some(path) = config_file_path() else {
        return SignovaConfigFile::default();
    };

    if !path.exists() {
        return SignovaConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SignovaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SignovaConfigFile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let fc: SignovaConfigFile = toml::from_str("").unwrap();
        assert!(fc.server.url.is_none());
        assert!(fc.voice.enabled.is_none());
        assert!(fc.camera.frames.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let fc: SignovaConfigFile = toml::from_str(
            r#"
            [server]
            url = "http://gestures.local:8080"
            request_timeout_secs = 3

            [voice]
            enabled = false
            locale = "en-GB"
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.url.as_deref(), Some("http://gestures.local:8080"));
        assert_eq!(fc.server.request_timeout_secs, Some(3));
        assert!(fc.server.predict_path.is_none());
        assert_eq!(fc.voice.enabled, Some(false));
        assert_eq!(fc.voice.locale.as_deref(), Some("en-GB"));
        assert!(fc.auto_capture.interval_ms.is_none());
    }

    #[test]
    fn test_rejects_wrong_types() {
        let result: Result<SignovaConfigFile, _> = toml::from_str("[camera]\nwidth = \"wide\"");
        assert!(result.is_err());
    }
}
