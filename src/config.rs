//! File-backed configuration for the midstac front end.
//!
//! The file is TOML with one table per component. Every table and field is
//! optional; anything missing takes its default.
//!
//! ```toml
//! [logging]
//! level = "midstac=info,midstac_search=info"
//!
//! [extractor]
//! default_limit = 10
//!
//! [dispatch]
//! per_source_limit = 10
//! backend_timeout_seconds = 20
//! dispatch_timeout_seconds = 45
//! interval_policy = "per_interval"
//!
//! [[dispatch.backends]]
//! kind = "cmr"
//! name = "cmr"
//! base_url = "https://cmr.earthdata.nasa.gov"
//!
//! [geocoder]
//! api_key = "..."
//! ```

use std::path::{Path, PathBuf};

use midstac_search::{DispatchConfig, ExtractorConfig, GeocoderConfig};
use serde::{Deserialize, Serialize};

use crate::error::{MidstacError, Result};

/// Default tracing filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "midstac=info,midstac_search=info";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidstacConfig {
    pub logging: LoggingConfig,
    pub extractor: ExtractorConfig,
    pub dispatch: DispatchConfig,
    pub geocoder: GeocoderConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"midstac_search=debug"`.
    /// `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl MidstacConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| MidstacError::Config(e.to_string()))
    }

    /// Load `path` if it exists, else the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MidstacError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/midstac/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("midstac").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("midstac")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/midstac-config/config.toml")
        }
    }

    /// Validates every component configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            return Err(MidstacError::Config("logging.level must not be empty".into()));
        }
        self.extractor.validate()?;
        self.dispatch.validate()?;
        self.geocoder.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MidstacConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, DEFAULT_LOG_FILTER);
        assert_eq!(config.dispatch.per_source_limit, 10);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = MidstacConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(MidstacError::Io(_))));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: MidstacConfig = toml::from_str(
            r#"
            [dispatch]
            per_source_limit = 5
            "#,
        )
        .expect("parse");
        assert_eq!(config.dispatch.per_source_limit, 5);
        assert_eq!(config.dispatch.backends.len(), 2);
        assert_eq!(config.extractor, ExtractorConfig::default());
    }

    #[test]
    fn zero_limit_fails_validation() {
        let mut config = MidstacConfig::default();
        config.dispatch.per_source_limit = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("per_source_limit"));
    }

    #[test]
    fn empty_log_level_fails_validation() {
        let mut config = MidstacConfig::default();
        config.logging.level = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = MidstacConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("midstac"));
    }
}
