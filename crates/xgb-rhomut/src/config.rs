//! Predictor configuration

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `RHOMUT_MODEL_DIR`
pub const ENV_PREFIX: &str = "RHOMUT";

/// Predictor configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorConfig {
    /// Directory holding regressor, scaler and dispersion artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Keep loaded artifacts in memory
    #[serde(default = "default_cache_artifacts")]
    pub cache_artifacts: bool,

    /// Deadline for async predictions in milliseconds
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_cache_artifacts() -> bool {
    true
}

fn default_deadline_ms() -> u64 {
    5000
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            cache_artifacts: default_cache_artifacts(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl PredictorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file, overridden by the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PredictorConfig::default();
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert!(config.cache_artifacts);
        assert_eq!(config.deadline(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rhomut.toml");
        fs::write(&path, "model_dir = \"/opt/models\"\ndeadline_ms = 250\n").unwrap();

        let config = PredictorConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.deadline_ms, 250);
        assert!(config.cache_artifacts);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = PredictorConfig::load_from(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }
}
