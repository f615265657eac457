//! Configuration Loader
//!
//! Reads the configuration file, layers environment overrides on top, applies
//! defaults and validates the result.

use ::config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::NotifierConfig;

/// Prefix of environment overrides, e.g. `CALNOTIFY__PUBLISHER__URL`
pub const ENV_PREFIX: &str = "CALNOTIFY";

const ENV_SEPARATOR: &str = "__";

const SENSITIVE_PATTERNS: &[&str] = &["password", "credential", "token", "secret"];

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: NotifierConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load, default and validate the configuration at `path`.
    ///
    /// The format follows the file extension (`.yaml`, `.yml`, `.toml`,
    /// `.json`). Environment variables prefixed with `CALNOTIFY__` override
    /// individual keys, with `__` separating nested sections.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_env_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let file_path = path.display().to_string();
        debug!(path = %file_path, "Loading configuration");

        let mut config: NotifierConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(&file_path, e))?
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_error(&file_path, e))?;

        config.apply_defaults();
        config.validate()?;

        info!(
            path = %file_path,
            calendars = config.calendars.len(),
            publisher_subject = %config.publisher.subject,
            "✅ Configuration loaded successfully"
        );

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory configuration, applying the same defaults and checks
    /// as a file load
    pub fn from_config(mut config: NotifierConfig) -> ConfigResult<Self> {
        config.apply_defaults();
        config.validate()?;
        Ok(Self {
            config,
            source: None,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// JSON view of the configuration with secrets masked, safe to log
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null);
        mask_sensitive(&mut value);
        value
    }
}

fn mask_sensitive(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key = key.to_lowercase();
                if SENSITIVE_PATTERNS.iter().any(|pattern| key.contains(pattern)) {
                    *val = match val {
                        serde_json::Value::String(s) if s.is_empty() => {
                            serde_json::Value::String(String::new())
                        }
                        _ => serde_json::Value::String("[MASKED]".to_string()),
                    };
                } else {
                    mask_sensitive(val);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                mask_sensitive(item);
            }
        }
        _ => {}
    }
}
