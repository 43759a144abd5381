use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub estimation: EstimationConfig,
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Loads a JSON configuration file. Missing sections and fields fall
    /// back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        tracing::debug!(?path, ?config, "loaded configuration");
        Ok(config)
    }
}

/// Controls the PCM window handed to tempo detection. Autocorrelation cost
/// grows with the window length, so whole tracks are never analysed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub window_seconds: f64,
    pub offset_seconds: f64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            window_seconds: 12.0,
            offset_seconds: 0.0,
        }
    }
}

/// Configuration for offline render loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub frame_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { frame_rate: 60 }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_files_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"estimation": {{"window_seconds": 8.0}}}}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.estimation.window_seconds, 8.0);
        assert_eq!(config.estimation.offset_seconds, 0.0);
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn malformed_files_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(AppConfig::load(file.path()).is_err());
    }
}
