//! Configuration loading and validation
//!
//! Configuration is read from a TOML file with a `[tracker]` table for the
//! remote API and a `[logger]` table for submission behaviour. Every field
//! has a default, so an empty file is a valid configuration.

mod options;

pub use options::{ItemType, LoggerOptions, PreprocessorRule, SessionVars};

use crate::error::ConfigError;
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `tracker.access_token`
pub const ACCESS_TOKEN_ENV: &str = "ISSUELOG_ACCESS_TOKEN";

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Remote ticket tracker connection
    pub tracker: TrackerConfig,
    /// Submission and formatting behaviour
    pub logger: LoggerOptions,
}

/// Connection settings for the ticket tracker API
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL of the tracker, e.g. `https://example.axosoft.com`
    pub base_url: String,
    /// OAuth access token sent as a bearer token
    pub access_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: None,
            timeout_seconds: 30,
        }
    }
}

impl TrackerConfig {
    /// Check that the connection settings can be used for real requests
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "tracker.base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "tracker.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, a parse
    /// error for malformed TOML, or a validation error for bad values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        debug!("Read {} bytes of configuration from {}", text.len(), path.display());
        Self::from_toml_str(&text)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides taken from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.tracker.access_token = Some(token);
            }
        }
    }

    /// Validate logger options
    ///
    /// Tracker settings are validated separately when an HTTP client is
    /// built, so dry runs work without a tracker configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logger.validate()
    }
}
