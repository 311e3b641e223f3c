// src/core/command_tree.rs

//! # Command Trees
//!
//! The resolver never touches the filesystem directly. It asks a [`CommandTree`]
//! three questions: is there a unit at this path, is this path a directory, and
//! which entries does this directory contain. Any routing source can answer them:
//! the manifest directories of [`crate::core::manifest::FsCommandTree`], or the
//! compiled registry in [`MemoryCommandTree`].
//!
//! A path `p` holds a unit when `p` itself defines one or when `p/index` does.

use crate::constants::INDEX_UNIT_NAME;
use crate::errors::EngineError;
use crate::models::CommandUnit;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lookup capability the resolver routes through.
#[async_trait]
pub trait CommandTree: Send + Sync {
    /// Loads the unit defined at `path`. `Ok(None)` means no unit is defined there.
    async fn load(&self, path: &Path) -> Result<Option<Arc<CommandUnit>>, EngineError>;

    /// Whether `path` is a directory that may contain subcommands.
    async fn is_dir(&self, path: &Path) -> bool;

    /// Entry names of a directory without extensions, sorted lexically, with the
    /// index unit excluded. A path that is not a directory has no entries.
    async fn read_dir(&self, path: &Path) -> Result<Vec<String>, EngineError>;
}

/// A command tree compiled into memory.
///
/// Units are registered under slash separated paths (`"commands/users/[id]"`);
/// every ancestor of a registered path is a directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCommandTree {
    units: BTreeMap<PathBuf, Arc<CommandUnit>>,
}

impl MemoryCommandTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit, replacing any previous one at the same path.
    pub fn insert(&mut self, path: impl Into<PathBuf>, unit: CommandUnit) {
        self.units.insert(path.into(), Arc::new(unit));
    }

    /// Builder form of [`MemoryCommandTree::insert`].
    pub fn with(mut self, path: impl Into<PathBuf>, unit: CommandUnit) -> Self {
        self.insert(path, unit);
        self
    }

    fn descendants<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        self.units
            .keys()
            .filter_map(move |key| key.strip_prefix(dir).ok())
            .filter(|rest| rest.components().next().is_some())
    }
}

#[async_trait]
impl CommandTree for MemoryCommandTree {
    async fn load(&self, path: &Path) -> Result<Option<Arc<CommandUnit>>, EngineError> {
        Ok(self
            .units
            .get(path)
            .or_else(|| self.units.get(&path.join(INDEX_UNIT_NAME)))
            .cloned())
    }

    async fn is_dir(&self, path: &Path) -> bool {
        self.descendants(path).next().is_some()
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<String>, EngineError> {
        let entries: BTreeSet<String> = self
            .descendants(path)
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .filter(|name| name != INDEX_UNIT_NAME)
            .collect();
        Ok(entries.into_iter().collect())
    }
}
