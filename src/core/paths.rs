// src/core/paths.rs

use crate::constants::{GLOBAL_CONFIG_DIRNAME, GLOBAL_CONFIG_FILENAME, PROJECT_CONFIG_FILENAME};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref GLOBAL_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Failures locating or expanding configuration paths.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform has no configuration directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// A `~` or variable could not be expanded.
    #[error("Failed to expand path '{template}': {message}")]
    Expansion { template: String, message: String },
}

/// Returns the global configuration directory (`~/.config/cmdtree` on Linux).
///
/// Memoized: the system lookup runs once per process. The directory is not created.
pub fn global_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = GLOBAL_CONFIG_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(GLOBAL_CONFIG_DIRNAME);
    *cached = Some(path.clone());
    Ok(path)
}

/// Returns the path of the global configuration file.
pub fn global_config_path() -> Result<PathBuf, PathError> {
    global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILENAME))
}

/// Finds the engine configuration file to load.
///
/// # Logic:
/// 1. An explicit path is always used, whether it exists or not (a missing
///    explicit file is reported by the loader).
/// 2. `cmdtree.toml` in `cwd`.
/// 3. The global configuration file.
///
/// Returns `None` when no file applies and defaults should be used.
pub fn find_config_file(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = cwd.join(PROJECT_CONFIG_FILENAME);
    if local.is_file() {
        return Some(local);
    }

    match global_config_path() {
        Ok(global) if global.is_file() => Some(global),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Skipping global configuration: {}", e);
            None
        }
    }
}

/// Expands `~` and environment variables in a path, then resolves a relative
/// result against `base` (the directory of the file the path was read from).
pub fn expand_path(template: &str, base: Option<&Path>) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    let path = PathBuf::from(expanded.into_owned());

    let path = match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    };
    Ok(dunce::simplified(&path).to_path_buf())
}
