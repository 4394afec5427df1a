//! Configuration loading: TOML file with environment variable overrides.
//!
//! Reads `fanzone.toml` from the working directory unless another path is
//! given on the command line. Every field has a sensible default so the file
//! is optional. Environment variables take precedence over file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use fanzone_domain::layout::Layout;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fan control settings.
    pub control: ControlConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Fan control configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Zone layout file.
    pub layout: PathBuf,
    /// Directory holding persisted per-zone state.
    pub persist_root: PathBuf,
    /// Objects to publish on the virtual bus before the zones start.
    pub simulation: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FANZONE_LAYOUT") {
            self.control.layout = val.into();
        }
        if let Ok(val) = std::env::var("FANZONE_PERSIST_ROOT") {
            self.control.persist_root = val.into();
        }
        if let Ok(val) = std::env::var("FANZONE_SIMULATION") {
            self.control.simulation = Some(val.into());
        }
        if let Ok(val) = std::env::var("FANZONE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.control.layout.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "control.layout must name a file".to_string(),
            ));
        }
        if self.control.persist_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "control.persist_root must name a directory".to_string(),
            ));
        }
        Ok(())
    }

    /// Read and deserialize the zone layout.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid layout.
    pub fn load_layout(&self) -> Result<Layout, ConfigError> {
        let content = std::fs::read_to_string(&self.control.layout)?;
        toml::from_str(&content).map_err(ConfigError::Layout)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            layout: PathBuf::from("/etc/fanzone/layout.toml"),
            persist_root: PathBuf::from("/var/lib/fanzone/control"),
            simulation: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fanzoned=info,fanzone_app=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[source] toml::de::Error),
    /// The zone layout is not valid.
    #[error("failed to parse zone layout")]
    Layout(#[source] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
