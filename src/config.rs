//! Configuration loading and management
//!
//! Everything comes from environment variables with sensible defaults;
//! `ISHARA_*` variables override individual settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default confidence gate for observations
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.65;
/// Default steady-hold duration before a gesture is captured
const DEFAULT_HOLD_SECS: f64 = 1.5;
/// Default number of captures per prediction submission
const DEFAULT_SUBMIT_BATCH: usize = 3;
/// Default word prediction endpoint
const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:5000/predict";

/// Recognition tuning for the accumulation state machine
#[derive(Debug, Clone, Copy)]
pub struct RecognitionSettings {
    /// Observations below this confidence are treated as noise
    pub confidence_threshold: f32,

    /// How long a gesture must be held steadily before capture
    pub hold_duration: Duration,

    /// Captured letters per prediction submission
    pub submit_batch: usize,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            hold_duration: Duration::from_secs_f64(DEFAULT_HOLD_SECS),
            submit_batch: DEFAULT_SUBMIT_BATCH,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for UI clients
    pub control_socket: PathBuf,

    /// Path to the Unix domain socket the frame classifier streams to
    pub observation_socket: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Word prediction endpoint URL
    pub predict_url: String,

    /// State machine tuning
    pub recognition: RecognitionSettings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = match std::env::var("ISHARA_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(&home)
                .join(".local")
                .join("share")
                .join("ishara"),
        };

        let control_socket = data_dir.join("control.sock");
        let observation_socket = data_dir.join("observations.sock");

        let predict_url = std::env::var("ISHARA_PREDICT_URL")
            .unwrap_or_else(|_| DEFAULT_PREDICT_URL.to_string());

        let mut recognition = RecognitionSettings::default();
        if let Ok(value) = std::env::var("ISHARA_CONFIDENCE_THRESHOLD") {
            recognition.confidence_threshold = value
                .parse()
                .context("ISHARA_CONFIDENCE_THRESHOLD must be a number in [0, 1]")?;
        }
        if let Ok(value) = std::env::var("ISHARA_HOLD_SECS") {
            let secs: f64 = value.parse().context("ISHARA_HOLD_SECS must be a number")?;
            recognition.hold_duration = Duration::from_secs_f64(secs);
        }
        if let Ok(value) = std::env::var("ISHARA_SUBMIT_BATCH") {
            recognition.submit_batch = value
                .parse()
                .context("ISHARA_SUBMIT_BATCH must be a positive integer")?;
        }

        Ok(Self {
            control_socket,
            observation_socket,
            data_dir,
            predict_url,
            recognition,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.control_socket.to_string_lossy().contains("ishara"));
        assert!(config
            .observation_socket
            .to_string_lossy()
            .contains("observations"));
        assert!(config.predict_url.contains("/predict"));
    }

    #[test]
    fn test_recognition_defaults() {
        let settings = RecognitionSettings::default();
        assert!((settings.confidence_threshold - 0.65).abs() < f32::EPSILON);
        assert_eq!(settings.hold_duration, Duration::from_millis(1500));
        assert_eq!(settings.submit_batch, 3);
    }
}
