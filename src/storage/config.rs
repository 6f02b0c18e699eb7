//! TOML Configuration Loading
//!
//! Reads `config.toml`, applies environment overrides and validates the
//! result. Called once at process start; the returned config is shared
//! read-only from then on.

use std::fs;
use std::path::Path;

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{default_config_path, resolve_relative};

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigService;

impl ConfigService {
    /// Load configuration from `path`, or from the default location if it exists.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> AppResult<AppConfig> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match default_config_path() {
                Ok(default) if default.exists() => Self::load_from_file(&default)?,
                _ => AppConfig::default(),
            },
        };

        config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .map_err(AppError::config)?;
        config.validate().map_err(AppError::config)?;
        Ok(config)
    }

    /// Parse a config file without applying environment overrides.
    ///
    /// A relative `catalog.db_path` is resolved against the file's directory.
    pub fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("Invalid {}: {}", path.display(), e)))?;

        if let (Some(db_path), Some(dir)) = (&config.catalog.db_path, path.parent()) {
            if !dir.as_os_str().is_empty() {
                config.catalog.db_path = Some(resolve_relative(dir, db_path));
            }
        }

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}
