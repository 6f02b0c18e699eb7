//! Cross-Platform Path Utilities
//!
//! Resolves the default locations of the config file and the rules database.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

const APP_DIR: &str = "society-scribe";

/// Get the user's config directory (e.g. ~/.config on Linux)
pub fn config_dir() -> AppResult<PathBuf> {
    dirs::config_dir().ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the Society Scribe config directory (~/.config/society-scribe/)
pub fn scribe_dir() -> AppResult<PathBuf> {
    Ok(config_dir()?.join(APP_DIR))
}

/// Get the default config file path (~/.config/society-scribe/config.toml)
pub fn default_config_path() -> AppResult<PathBuf> {
    Ok(scribe_dir()?.join("config.toml"))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
