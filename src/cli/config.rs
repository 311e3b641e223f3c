// src/cli/config.rs

use crate::constants::DEFAULT_COMMANDS_DIR;
use crate::core::paths;
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of the `cmdtree` binary, read from `cmdtree.toml`.
///
/// ```toml
/// commands_dir = "~/tools/commands"
/// default_command = "help"
/// prompt = true
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Root of the command tree. Relative paths are resolved against the
    /// directory of the configuration file.
    pub commands_dir: PathBuf,
    /// Prefixed to the command line when it is empty or starts with an option.
    pub default_command: Option<String>,
    /// Whether missing option values may be asked interactively.
    pub prompt: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commands_dir: PathBuf::from(DEFAULT_COMMANDS_DIR),
            default_command: None,
            prompt: true,
        }
    }
}

impl EngineConfig {
    /// Loads the configuration found by [`paths::find_config_file`], or the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, EngineError> {
        let cwd = std::env::current_dir()
            .map_err(|e| EngineError::Config(format!("cannot read working directory: {}", e)))?;
        match paths::find_config_file(explicit, &cwd) {
            Some(path) => Self::from_file(&path),
            None => {
                log::debug!("No configuration file found, using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Reads a configuration file and resolves its paths.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        log::debug!("Loading configuration from '{}'.", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content, path.parent())
    }

    /// Parses a configuration; `base` is the directory relative paths start from.
    pub fn from_toml(content: &str, base: Option<&Path>) -> Result<Self, EngineError> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.commands_dir = paths::expand_path(&config.commands_dir.to_string_lossy(), base)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(config)
    }
}
