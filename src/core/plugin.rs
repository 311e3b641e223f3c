// src/core/plugin.rs

use crate::core::context::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Trusted code that extends the engine through the context's hooks.
///
/// `init` runs once per context, before resolution. It typically registers hook
/// handlers and may declare extra options with [`Context::add_options`].
/// Returning `false` marks the plugin as not ready without aborting the run.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique name, used by [`Context::plugin`](crate::core::context::Context::plugin).
    fn name(&self) -> &str;

    /// Version string, reported in plugin info.
    fn version(&self) -> &str;

    /// Short human readable summary.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Free-form data other plugins may inspect.
    fn meta(&self) -> Option<Value> {
        None
    }

    /// Registers hooks and options. Returns whether the plugin is ready.
    async fn init(&self, context: &Arc<Context>) -> anyhow::Result<bool>;
}

/// The frozen record of a plugin after its `init` ran.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Plugin summary.
    pub description: Option<String>,
    /// Free-form plugin metadata.
    pub meta: Option<Value>,
    /// What `init` returned.
    pub is_ready: bool,
}

impl PluginInfo {
    pub(crate) fn new(plugin: &dyn Plugin, is_ready: bool) -> Self {
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            description: plugin.description().map(String::from),
            meta: plugin.meta(),
            is_ready,
        }
    }
}
