// src/core/manifest.rs

//! # Manifest Command Trees
//!
//! Routes a directory of TOML manifests. `deploy.toml` defines the `deploy`
//! command, `deploy/index.toml` defines it too (for a directory with children),
//! `users/[id].toml` binds a parameter.
//!
//! ```toml
//! description = "Deploy an app"
//! is_middleware = true
//! requires_subcommand = false
//! handler = "print"
//!
//! [options.env]
//! type = "string"
//! alias = ["e"]
//! choices = ["dev", "prod"]
//! ```
//!
//! Manifests cannot carry code, so `handler` names an entry of a [`HandlerTable`].
//! A manifest without `handler` forwards its data unchanged.

use crate::constants::{INDEX_UNIT_NAME, MANIFEST_EXTENSION};
use crate::core::command_tree::CommandTree;
use crate::core::options::OptionSchema;
use crate::errors::{EngineError, UsageError};
use crate::models::{CommandHandler, CommandUnit, PassThrough};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

fn default_true() -> bool {
    true
}

/// The on-disk shape of a command unit.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UnitManifest {
    /// Shown by help renderers.
    #[serde(default)]
    pub description: Option<String>,
    /// Runs even when a deeper subcommand follows.
    #[serde(default = "default_true")]
    pub is_middleware: bool,
    /// Resolution must not stop at this unit.
    #[serde(default)]
    pub requires_subcommand: bool,
    /// Name of a registered handler.
    #[serde(default)]
    pub handler: Option<String>,
    /// Option declarations, keyed by option name.
    #[serde(default)]
    pub options: OptionSchema,
}

/// Named handlers manifests can refer to.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `name`.
    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.insert(name, handler);
        self
    }

    /// The handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// A command tree read from manifest files on disk.
#[derive(Debug, Clone, Default)]
pub struct FsCommandTree {
    handlers: HandlerTable,
}

impl FsCommandTree {
    /// A tree resolving manifest handler names in `handlers`.
    pub fn new(handlers: HandlerTable) -> Self {
        Self { handlers }
    }

    fn build_unit(&self, path: &Path, manifest: UnitManifest) -> Result<CommandUnit, EngineError> {
        manifest.options.validate_config()?;
        let handler = match manifest.handler.as_deref() {
            None => Arc::new(PassThrough) as Arc<dyn CommandHandler>,
            Some(name) => self.handlers.get(name).ok_or_else(|| {
                log::debug!("Manifest '{}' names unknown handler '{}'.", path.display(), name);
                UsageError::MissingDefinition {
                    path: path.to_path_buf(),
                }
            })?,
        };
        let mut unit = CommandUnit::new(handler)
            .middleware(manifest.is_middleware)
            .requires_subcommand(manifest.requires_subcommand)
            .options(manifest.options);
        unit.description = manifest.description;
        Ok(unit)
    }
}

/// `deploy` -> `deploy.toml`. Appends rather than replaces, so `[...ids]`
/// and dotted names keep their full stem.
fn manifest_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(MANIFEST_EXTENSION);
    PathBuf::from(raw)
}

/// Reads and decodes a manifest.
pub fn read_manifest(path: &Path) -> Result<UnitManifest, EngineError> {
    let load_error = |source: anyhow::Error| EngineError::Load {
        path: path.to_path_buf(),
        source,
    };
    let content = fs::read_to_string(path).map_err(|e| load_error(e.into()))?;
    toml::from_str(&content).map_err(|e| load_error(e.into()))
}

#[async_trait]
impl CommandTree for FsCommandTree {
    async fn load(&self, path: &Path) -> Result<Option<Arc<CommandUnit>>, EngineError> {
        let candidates = [manifest_path(path), manifest_path(&path.join(INDEX_UNIT_NAME))];
        let Some(file) = candidates.iter().find(|c| c.is_file()) else {
            return Ok(None);
        };
        log::trace!("Loading command manifest '{}'.", file.display());
        let manifest = read_manifest(file)?;
        self.build_unit(file, manifest).map(|unit| Some(Arc::new(unit)))
    }

    async fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<String>, EngineError> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = BTreeSet::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| EngineError::Load {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            let entry_path = entry.path();
            let name = if entry.file_type().is_dir() {
                entry_path.file_name()
            } else if entry_path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
                entry_path.file_stem()
            } else {
                None
            };
            if let Some(name) = name.map(|n| n.to_string_lossy().into_owned())
                && name != INDEX_UNIT_NAME
            {
                names.insert(name);
            }
        }
        Ok(names.into_iter().collect())
    }
}

// MARK: --- UNIT TESTS ---
