// src/models.rs

use crate::core::options::OptionSchema;
use crate::core::parameters::Params;
use crate::state::State;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

// --- CONTROL FLOW ---

/// What a command handler asks the execution loop to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Advance to the next command with this data (or finish if none is left).
    Next(Value),
    /// Skip every remaining command and finish with this data.
    End(Value),
}

/// The body of a command unit.
///
/// Handlers read the execution through the [`State`] (data, params, option getter)
/// and return an [`Action`]. Errors are funnelled through the context's `error` hook.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command.
    async fn handle(&self, state: &State) -> anyhow::Result<Action>;
}

/// Forwards the current data unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl CommandHandler for PassThrough {
    async fn handle(&self, state: &State) -> anyhow::Result<Action> {
        Ok(Action::Next(state.data()))
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Action>> + Send + 'static,
{
    async fn handle(&self, state: &State) -> anyhow::Result<Action> {
        (self.0)(state.clone()).await
    }
}

/// Wraps an async closure into a command handler.
///
/// ```ignore
/// let greet = handler_fn(|state: State| async move {
///     let name = state.options().get_value("name", None).await?;
///     Ok(Action::Next(json!({ "greeting": format!("hello {}", name) })))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Action>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// --- COMMAND UNITS ---

/// The declarative definition of one path segment.
#[derive(Clone)]
pub struct CommandUnit {
    /// Shown by help renderers.
    pub description: Option<String>,
    /// Runs even when a deeper subcommand follows.
    pub is_middleware: bool,
    /// Resolution must not stop at this unit.
    pub requires_subcommand: bool,
    /// Options this unit declares.
    pub options: OptionSchema,
    /// The body run when the link is reached.
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandUnit {
    /// A middleware unit with the given handler and no options.
    pub fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            description: None,
            is_middleware: true,
            requires_subcommand: false,
            options: OptionSchema::new(),
            handler,
        }
    }

    /// The implicit unit of a directory without its own definition.
    pub fn pass_through() -> Self {
        Self {
            requires_subcommand: true,
            ..Self::new(Arc::new(PassThrough))
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets whether the unit runs before its subcommands.
    pub fn middleware(mut self, is_middleware: bool) -> Self {
        self.is_middleware = is_middleware;
        self
    }

    /// Sets whether a subcommand is mandatory.
    pub fn requires_subcommand(mut self, requires_subcommand: bool) -> Self {
        self.requires_subcommand = requires_subcommand;
        self
    }

    /// Sets the option declarations.
    pub fn options(mut self, options: OptionSchema) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for CommandUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandUnit")
            .field("description", &self.description)
            .field("is_middleware", &self.is_middleware)
            .field("requires_subcommand", &self.requires_subcommand)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// --- RESOLUTION RESULTS ---

/// One link of a resolved chain.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    /// The unit to run (possibly with its body replaced).
    pub command: Arc<CommandUnit>,
    /// The token that selected the unit (for a parameterized unit, the entry
    /// name such as `[id]`).
    pub command_name: String,
    /// Path of the unit, relative to the root of its command tree.
    pub command_path: PathBuf,
    /// Parameters captured by this link only.
    pub params: Params,
    /// The input this link did not consume, with leading options stripped.
    pub remaining_command_string: String,
    /// Where the next link is looked up.
    pub subcommands_dir: PathBuf,
    /// Whether another resolution step follows.
    pub has_next: bool,
}

impl ResolvedCommand {
    /// A terminal link built by hand, used for forks and plugin-supplied chains.
    pub fn from_unit(name: impl Into<String>, command: Arc<CommandUnit>) -> Self {
        let command_name = name.into();
        Self {
            command,
            command_path: PathBuf::from(&command_name),
            subcommands_dir: PathBuf::from(&command_name),
            command_name,
            params: Params::new(),
            remaining_command_string: String::new(),
            has_next: false,
        }
    }

    /// Attaches parameters to a hand-built link.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}
