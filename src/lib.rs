//! A filesystem-routed CLI construction engine.
//!
//! A command line is resolved against a tree of command units (`users/[id]`),
//! its options are parsed and validated against the schemas the resolved units
//! declare, and the chain then runs through a [`state::State`] cursor. Every
//! step fires an event on the context's [`core::hooks::HookRegistry`], so
//! plugins can rewrite input, add commands, replace results or swallow errors.

/// The `cmdtree` binary's argument surface, configuration and built-in handlers.
pub mod cli;
/// File names and defaults shared across the crate.
pub mod constants;
/// Parsing, resolution, hooks and the execution context.
pub mod core;
pub mod errors;
/// Command units, handlers and resolved links.
pub mod models;
pub mod state;
pub mod system;

#[cfg(test)]
mod dev_utils;

pub use crate::core::context::{Context, ContextOptions, RunOptions, run};
pub use crate::errors::EngineError;
pub use crate::models::{Action, CommandHandler, CommandUnit};
pub use crate::state::State;
