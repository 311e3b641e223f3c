// src/core/context.rs

//! # Execution Context
//!
//! The per-invocation orchestrator. A [`Context`] owns the command string, the
//! command tree, the hook registry, the merged option schema and the resolved
//! chain, and moves through these phases:
//!
//! ```text
//! Uninitialized -> PluginsInitialized -> Resolved -> Parsed -> Ready
//!                                                      Ready -> Executing <-> Idle
//! ```
//!
//! `prepare` is idempotent and resumes from the last completed phase. The chain
//! and schema are frozen once it completes; forks extend copies of them.
//!
//! Every error escaping `execute` (and `run`) passes through the `error` hook,
//! which may replace it or swallow it.

use crate::constants::DEFAULT_COMMANDS_DIR;
use crate::core::arg_parser::parse_command;
use crate::core::command_tree::CommandTree;
use crate::core::events::{
    AfterExecute, AfterParse, AfterResolve, AfterResolveNext, BeforeExecute, BeforeParse,
    BeforeResolve, BeforeResolveNext, ErrorEvent, ExitEvent,
};
use crate::core::hooks::HookRegistry;
use crate::core::options::{OptionSchema, OptionValues};
use crate::core::options_getter::OptionsGetter;
use crate::core::plugin::{Plugin, PluginInfo};
use crate::core::resolver::{resolve_command, resolve_next};
use crate::core::validation::{ValidationFlags, validate_options};
use crate::errors::{EngineError, UsageError};
use crate::models::ResolvedCommand;
use crate::state::State;
use crate::system::prompt::{Prompter, TerminalPrompter};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle phase of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Nothing has run yet.
    Uninitialized,
    /// Plugins ran their `init`.
    PluginsInitialized,
    /// The chain is resolved.
    Resolved,
    /// Options are parsed and validated.
    Parsed,
    /// `prepare` completed.
    Ready,
    /// A chain is running.
    Executing,
    /// The last execution finished.
    Idle,
}

impl Phase {
    /// Whether `prepare` has completed.
    pub fn is_prepared(self) -> bool {
        self >= Self::Ready
    }
}

/// Everything a [`Context`] is built from.
pub struct ContextOptions {
    /// The command line to resolve.
    pub command_string: String,
    /// Root directory of the command tree.
    pub commands_dir: PathBuf,
    /// Where command units are loaded from.
    pub tree: Arc<dyn CommandTree>,
    /// Initialized in order during `prepare`.
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Asks for option values the command line did not give.
    pub prompter: Arc<dyn Prompter>,
}

impl ContextOptions {
    /// Options with no plugins and a terminal prompter.
    pub fn new(
        command_string: impl Into<String>,
        commands_dir: impl Into<PathBuf>,
        tree: Arc<dyn CommandTree>,
    ) -> Self {
        Self {
            command_string: command_string.into(),
            commands_dir: commands_dir.into(),
            tree,
            plugins: Vec::new(),
            prompter: Arc::new(TerminalPrompter),
        }
    }

    /// Adds a plugin.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Replaces the prompter.
    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("command_string", &self.command_string)
            .field("commands_dir", &self.commands_dir)
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

struct ContextInner {
    phase: Phase,
    command_string: String,
    plugins: Vec<PluginInfo>,
    options: OptionSchema,
    resolved_commands: Vec<ResolvedCommand>,
    parsed: OptionValues,
    result: Option<Value>,
}

/// The per-invocation orchestrator.
pub struct Context {
    commands_dir: PathBuf,
    tree: Arc<dyn CommandTree>,
    plugins: Vec<Arc<dyn Plugin>>,
    prompter: Arc<dyn Prompter>,
    hooks: HookRegistry,
    inner: Mutex<ContextInner>,
    prepare_lock: tokio::sync::Mutex<()>,
}

impl Context {
    /// Creates a context in the `Uninitialized` phase.
    pub fn new(options: ContextOptions) -> Arc<Self> {
        Arc::new(Self {
            commands_dir: options.commands_dir,
            tree: options.tree,
            plugins: options.plugins,
            prompter: options.prompter,
            hooks: HookRegistry::new(),
            inner: Mutex::new(ContextInner {
                phase: Phase::Uninitialized,
                command_string: options.command_string,
                plugins: Vec::new(),
                options: OptionSchema::new(),
                resolved_commands: Vec::new(),
                parsed: OptionValues::new(),
                result: None,
            }),
            prepare_lock: tokio::sync::Mutex::new(()),
        })
    }

    // --- Accessors ---

    /// The registry plugins attach their hooks to.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// The command string being resolved, after any `beforeResolve` rewrite.
    pub fn command_string(&self) -> String {
        self.lock().command_string.clone()
    }

    /// Root directory of the command tree.
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// The tree units are loaded from.
    pub fn tree(&self) -> &Arc<dyn CommandTree> {
        &self.tree
    }

    /// The prompter option getters ask through.
    pub fn prompter(&self) -> &Arc<dyn Prompter> {
        &self.prompter
    }

    /// The resolved chain, in execution order.
    pub fn resolved_commands(&self) -> Vec<ResolvedCommand> {
        self.lock().resolved_commands.clone()
    }

    /// The merged option schema.
    pub fn options(&self) -> OptionSchema {
        self.lock().options.clone()
    }

    /// Option values as parsed from the command line.
    pub fn parsed_options(&self) -> OptionValues {
        self.lock().parsed.clone()
    }

    /// Result of the most recent `execute`.
    pub fn result(&self) -> Option<Value> {
        self.lock().result.clone()
    }

    /// Every plugin with its readiness, in initialization order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.lock().plugins.clone()
    }

    /// A plugin by name.
    pub fn plugin(&self, name: &str) -> Option<PluginInfo> {
        self.lock().plugins.iter().find(|p| p.name == name).cloned()
    }

    /// Merges extra declarations into the context's schema.
    pub fn add_options(&self, options: &OptionSchema) -> Result<(), EngineError> {
        self.lock().options.merge(options)?;
        Ok(())
    }

    // --- Lifecycle ---

    /// Initializes plugins, resolves the chain and parses the command line.
    /// Calling it again after it succeeded does nothing.
    pub async fn prepare(self: &Arc<Self>) -> Result<(), EngineError> {
        let _guard = self.prepare_lock.lock().await;

        if self.phase() == Phase::Uninitialized {
            let mut infos = Vec::with_capacity(self.plugins.len());
            for plugin in &self.plugins {
                let is_ready = plugin.init(self).await.map_err(EngineError::from_handler)?;
                log::debug!(
                    "Plugin '{}' v{} initialized (ready: {}).",
                    plugin.name(),
                    plugin.version(),
                    is_ready
                );
                infos.push(PluginInfo::new(plugin.as_ref(), is_ready));
            }
            let mut inner = self.lock();
            inner.plugins = infos;
            inner.phase = Phase::PluginsInitialized;
        }

        if self.phase() == Phase::PluginsInitialized {
            let chain = self.resolve().await?;
            let mut inner = self.lock();
            log::debug!("Resolved {} command(s).", chain.len());
            inner.resolved_commands = chain;
            inner.phase = Phase::Resolved;
        }

        if self.phase() == Phase::Resolved {
            let parsed = self.parse().await?;
            let mut inner = self.lock();
            inner.parsed = parsed;
            inner.phase = Phase::Parsed;
        }

        if self.phase() == Phase::Parsed {
            self.lock().phase = Phase::Ready;
        }
        Ok(())
    }

    async fn resolve(&self) -> Result<Vec<ResolvedCommand>, EngineError> {
        let before = self
            .hooks
            .call(BeforeResolve::new(
                self.command_string(),
                self.commands_dir.clone(),
            ))
            .await?;
        let (command_string, added, skipped) = before.into_parts();
        self.lock().command_string = command_string.clone();

        let mut chain = Vec::new();
        self.absorb(&mut chain, added)?;

        if skipped {
            log::debug!("Resolution skipped by a 'beforeResolve' hook.");
        } else {
            let first = resolve_command(self.tree.as_ref(), &command_string, &self.commands_dir).await?;
            self.absorb(&mut chain, [first.clone()])?;
            self.resolve_rest(&mut chain, first).await?;
        }

        let after = self.hooks.call(AfterResolve::new(chain.clone())).await?;
        self.absorb(&mut chain, after.into_added())?;
        Ok(chain)
    }

    async fn resolve_rest(
        &self,
        chain: &mut Vec<ResolvedCommand>,
        first: ResolvedCommand,
    ) -> Result<(), EngineError> {
        let mut last = first;
        while last.has_next {
            let before = self.hooks.call(BeforeResolveNext::new(last.clone())).await?;
            let (next_input, added, skipped) = before.into_parts();
            self.absorb(chain, added)?;
            if skipped {
                log::debug!("Resolution stopped by a 'beforeResolveNext' hook.");
                return Ok(());
            }

            let Some(next) = resolve_next(self.tree.as_ref(), &next_input).await? else {
                break;
            };
            let after = self.hooks.call(AfterResolveNext::new(next)).await?;
            let (next, added) = after.into_parts();
            self.absorb(chain, [next.clone()])?;
            self.absorb(chain, added)?;
            last = next;
        }

        if last.command.requires_subcommand {
            return Err(UsageError::RequiredSubcommand {
                name: last.command_name,
            }
            .into());
        }
        Ok(())
    }

    /// Appends links to the chain, merging each link's schema as it is discovered.
    fn absorb(
        &self,
        chain: &mut Vec<ResolvedCommand>,
        commands: impl IntoIterator<Item = ResolvedCommand>,
    ) -> Result<(), EngineError> {
        for command in commands {
            self.add_options(&command.command.options)?;
            chain.push(command);
        }
        Ok(())
    }

    async fn parse(&self) -> Result<OptionValues, EngineError> {
        let before = self
            .hooks
            .call(BeforeParse::new(self.command_string(), self.options()))
            .await?;
        let (command_string, schema, parsed, skipped) = before.into_parts();
        // A schema installed by the hook is the one options are read through from now on.
        self.lock().options = schema.clone();

        let values = if skipped {
            parsed.unwrap_or_default()
        } else {
            parse_command(&command_string, &schema)?.options
        };

        let values = self.hooks.call(AfterParse::new(values)).await?.into_parsed();
        validate_options(&schema, &values, ValidationFlags::eager())?;
        Ok(values)
    }

    /// Runs the resolved chain with `initial_data`, preparing first if needed.
    ///
    /// Returns `Ok(None)` when an `error` hook swallowed a failure or a
    /// `beforeExecute` hook skipped execution without providing a result.
    pub async fn execute(self: &Arc<Self>, initial_data: Value) -> Result<Option<Value>, EngineError> {
        let outcome = match self.execute_inner(initial_data).await {
            Ok(result) => Ok(result),
            Err(error) => self.handle_error(error).await,
        };

        let mut inner = self.lock();
        inner.result = outcome.as_ref().ok().cloned().flatten();
        if inner.phase == Phase::Executing {
            inner.phase = Phase::Idle;
        }
        outcome
    }

    async fn execute_inner(self: &Arc<Self>, initial_data: Value) -> Result<Option<Value>, EngineError> {
        self.prepare().await?;
        self.lock().phase = Phase::Executing;

        let before = self.hooks.call(BeforeExecute::new(initial_data)).await?;
        let (initial_data, result, skipped) = before.into_parts();

        let result = if skipped {
            log::debug!("Execution skipped by a 'beforeExecute' hook.");
            result
        } else {
            let (schema, parsed, commands) = {
                let inner = self.lock();
                (
                    inner.options.clone(),
                    inner.parsed.clone(),
                    inner.resolved_commands.clone(),
                )
            };
            let getter = OptionsGetter::new(schema, parsed, self.prompter.clone());
            let state = State::new(self.clone(), commands, getter);
            Some(state.start(initial_data).await?)
        };

        let after = self.hooks.call(AfterExecute::new(result)).await?;
        Ok(after.into_result())
    }

    /// Passes an error through the `error` hook.
    async fn handle_error(&self, error: EngineError) -> Result<Option<Value>, EngineError> {
        log::debug!("Funnelling error through hooks: {}", error);
        let (error, ignored) = self.hooks.call(ErrorEvent::new(error)).await?.into_parts();
        if ignored {
            log::debug!("Error ignored by an 'error' hook.");
            Ok(None)
        } else {
            Err(error)
        }
    }

    /// Runs a hand-built chain in an isolated state and returns its final data.
    ///
    /// The fork sees the context's schema extended with the schemas of
    /// `commands`, and starts from `option_values` instead of the parsed ones.
    pub async fn fork(
        self: &Arc<Self>,
        commands: Vec<ResolvedCommand>,
        initial_data: Value,
        option_values: OptionValues,
    ) -> Result<Value, EngineError> {
        let mut schema = self.options();
        for command in &commands {
            schema.merge(&command.command.options)?;
        }
        log::debug!("Forking execution over {} command(s).", commands.len());
        let getter = OptionsGetter::new(schema, option_values, self.prompter.clone());
        State::new(self.clone(), commands, getter)
            .start(initial_data)
            .await
    }

    /// Requests process termination through the `exit` hook.
    ///
    /// Returns only if a hook cancelled the exit.
    pub async fn exit(&self, code: i32, message: Option<String>) -> Result<(), EngineError> {
        let event = self.hooks.call(ExitEvent::new(code, message)).await?;
        if event.is_cancelled() {
            log::debug!("Exit({}) cancelled by an 'exit' hook.", event.code());
            return Ok(());
        }
        if let Some(message) = event.message() {
            if event.code() == 0 {
                println!("{}", message);
            } else {
                eprintln!("{}", message);
            }
        }
        std::process::exit(event.code())
    }

    fn lock(&self) -> MutexGuard<'_, ContextInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Context")
            .field("phase", &inner.phase)
            .field("command_string", &inner.command_string)
            .field("commands_dir", &self.commands_dir)
            .field("resolved_commands", &inner.resolved_commands.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// --- One-Call Entry Point ---

/// Inputs of [`run`].
pub struct RunOptions {
    /// `None` reads the process arguments (minus the binary name).
    pub command_string: Option<String>,
    /// Root directory of the command tree.
    pub commands_dir: PathBuf,
    /// Used when the input is empty or starts with an option.
    pub default_command: Option<String>,
    /// Data handed to the first command.
    pub initial_data: Value,
    /// Where command units are loaded from.
    pub tree: Arc<dyn CommandTree>,
    /// Initialized in order before resolution.
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Asks for option values the command line did not give.
    pub prompter: Arc<dyn Prompter>,
}

impl RunOptions {
    /// Options reading the process arguments from `commands` with no plugins.
    pub fn new(tree: Arc<dyn CommandTree>) -> Self {
        Self {
            command_string: None,
            commands_dir: PathBuf::from(DEFAULT_COMMANDS_DIR),
            default_command: None,
            initial_data: Value::Null,
            tree,
            plugins: Vec::new(),
            prompter: Arc::new(TerminalPrompter),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("command_string", &self.command_string)
            .field("commands_dir", &self.commands_dir)
            .field("default_command", &self.default_command)
            .finish_non_exhaustive()
    }
}

/// Builds a context, prepares it and executes it through one error funnel.
pub async fn run(options: RunOptions) -> Result<Option<Value>, EngineError> {
    let input = options
        .command_string
        .unwrap_or_else(command_string_from_args);
    let command_string = apply_default_command(&input, options.default_command.as_deref());
    log::debug!("Running '{}'.", command_string);

    let context = Context::new(ContextOptions {
        command_string,
        commands_dir: options.commands_dir,
        tree: options.tree,
        plugins: options.plugins,
        prompter: options.prompter,
    });
    context.execute(options.initial_data).await
}

/// Prefixes the default command when the input names no command.
pub fn apply_default_command(input: &str, default_command: Option<&str>) -> String {
    let trimmed = input.trim();
    match default_command {
        Some(default) if trimmed.is_empty() || trimmed.starts_with('-') => {
            format!("{} {}", default, trimmed).trim_end().to_string()
        }
        _ => input.to_string(),
    }
}

fn command_string_from_args() -> String {
    let args: Vec<String> = std::env::args().skip(1).collect();
    shlex::try_join(args.iter().map(String::as_str)).unwrap_or_else(|_| args.join(" "))
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command_tree::MemoryCommandTree;
    use crate::core::events::{AfterStateChange, BeforeStateChange};
    use crate::core::options::{OptionConfig, OptionType, OptionValue};
    use crate::errors::OptionsError;
    use crate::models::{Action, CommandHandler, CommandUnit, handler_fn};
    use crate::system::prompt::NonInteractivePrompter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Appends its name to the log and to the data array.
    fn recorder(log: &Log, name: &'static str) -> Arc<dyn CommandHandler> {
        let log = log.clone();
        handler_fn(move |state: State| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name.to_string());
                let mut items = state.data().as_array().cloned().unwrap_or_default();
                items.push(json!(name));
                Ok(Action::Next(Value::Array(items)))
            }
        })
    }

    fn unit(handler: Arc<dyn CommandHandler>) -> CommandUnit {
        CommandUnit::new(handler)
    }

    fn context(tree: MemoryCommandTree, line: &str) -> Arc<Context> {
        Context::new(
            ContextOptions::new(line, "cmds", Arc::new(tree))
                .prompter(Arc::new(NonInteractivePrompter)),
        )
    }

    fn abc_tree(log: &Log) -> MemoryCommandTree {
        MemoryCommandTree::new()
            .with("cmds/a", unit(recorder(log, "a")))
            .with("cmds/a/b", unit(recorder(log, "b")))
            .with("cmds/a/b/c", unit(recorder(log, "c")))
    }

    struct TestPlugin {
        inits: AtomicUsize,
        setup: Box<dyn Fn(&Arc<Context>) -> anyhow::Result<()> + Send + Sync>,
    }

    impl TestPlugin {
        fn new(setup: impl Fn(&Arc<Context>) -> anyhow::Result<()> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                inits: AtomicUsize::new(0),
                setup: Box::new(setup),
            })
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            "test"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn init(&self, context: &Arc<Context>) -> anyhow::Result<bool> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            (self.setup)(context)?;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let log = Log::default();
        let ctx = context(abc_tree(&log), "a b c");

        let result = ctx.execute(json!([])).await.unwrap();
        assert_eq!(result, Some(json!(["a", "b", "c"])));
        assert_eq!(ctx.resolved_commands().len(), 3);
        assert_eq!(ctx.phase(), Phase::Idle);
        assert_eq!(ctx.result(), result);
    }

    #[tokio::test]
    async fn test_end_skips_remaining_commands() {
        let log = Log::default();
        let inner_log = log.clone();
        let stop = handler_fn(move |_state: State| {
            let log = inner_log.clone();
            async move {
                log.lock().unwrap().push("a".to_string());
                Ok(Action::End(json!("x")))
            }
        });
        let tree = MemoryCommandTree::new()
            .with("cmds/a", unit(stop))
            .with("cmds/a/b", unit(recorder(&log, "b")))
            .with("cmds/a/b/c", unit(recorder(&log, "c")));
        let ctx = context(tree, "a b c");

        assert_eq!(ctx.execute(Value::Null).await.unwrap(), Some(json!("x")));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_non_middleware_body_skipped_but_options_parsed() {
        let log = Log::default();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_bar = seen.clone();
        let bar = handler_fn(move |state: State| {
            let seen = seen_in_bar.clone();
            async move {
                let value = state.options().get_value("label", None).await?;
                *seen.lock().unwrap() = value;
                Ok(Action::Next(state.data()))
            }
        });
        let foo_options = OptionSchema::new()
            .with("label", OptionConfig::string().alias("l"))
            .unwrap();
        let tree = MemoryCommandTree::new()
            .with(
                "cmds/foo",
                unit(recorder(&log, "foo")).middleware(false).options(foo_options),
            )
            .with("cmds/foo/bar", unit(bar));
        let ctx = context(tree, "foo -l hello bar");

        ctx.execute(Value::Null).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            *seen.lock().unwrap(),
            Some(OptionValue::String("hello".into()))
        );
    }

    #[tokio::test]
    async fn test_options_with_separate_values_reach_their_commands() {
        let deploy_options = OptionSchema::new()
            .with("region", OptionConfig::string())
            .unwrap();
        let web_options = OptionSchema::new()
            .with("env", OptionConfig::string().alias("e"))
            .unwrap();
        let web = handler_fn(|state: State| async move {
            let region = state.options().get_string("region").await?;
            let env = state.options().get_string("env").await?;
            Ok(Action::Next(json!({ "region": region, "env": env })))
        });
        let tree = MemoryCommandTree::new()
            .with(
                "cmds/deploy",
                unit(handler_fn(|s: State| async move { Ok(Action::Next(s.data())) }))
                    .options(deploy_options),
            )
            .with("cmds/deploy/web", unit(web).options(web_options));

        let ctx = context(tree.clone(), "deploy web --env prod");
        assert_eq!(
            ctx.execute(Value::Null).await.unwrap(),
            Some(json!({ "region": null, "env": "prod" }))
        );
        assert_eq!(ctx.resolved_commands().len(), 2);

        let ctx = context(tree, "deploy --region eu web -e prod");
        assert_eq!(
            ctx.execute(Value::Null).await.unwrap(),
            Some(json!({ "region": "eu", "env": "prod" }))
        );
    }

    #[tokio::test]
    async fn test_before_parse_schema_is_used_for_validation() {
        let options = OptionSchema::new()
            .with("count", OptionConfig::string())
            .unwrap();
        let count = handler_fn(|state: State| async move {
            let count = state.options().get_number("count").await?;
            Ok(Action::Next(json!(count)))
        });
        let tree = MemoryCommandTree::new().with("cmds/export", unit(count).options(options));
        let as_number = |ctx: &Arc<Context>| {
            let schema = OptionSchema::new()
                .with("count", OptionConfig::number())
                .unwrap();
            ctx.hooks().on(move |mut e: BeforeParse| {
                let schema = schema.clone();
                async move {
                    e.set_options(schema);
                    Ok(e)
                }
            });
        };

        let ctx = context(tree.clone(), "export --count 3");
        as_number(&ctx);
        assert_eq!(ctx.execute(Value::Null).await.unwrap(), Some(json!(3.0)));
        assert_eq!(ctx.options().get("count").unwrap().kind, OptionType::Number);

        let ctx = context(tree, "export --count many");
        as_number(&ctx);
        let err = ctx.execute(Value::Null).await.unwrap_err();
        assert!(matches!(err.as_options_error(), Some(OptionsError::Type { .. })));
    }

    #[tokio::test]
    async fn test_eager_validation_rejects_conflicts() {
        let options = OptionSchema::new()
            .with("json", OptionConfig::boolean().conflicts("yaml"))
            .unwrap()
            .with("yaml", OptionConfig::boolean())
            .unwrap();
        let tree = MemoryCommandTree::new().with(
            "cmds/export",
            unit(handler_fn(|s: State| async move { Ok(Action::Next(s.data())) })).options(options),
        );
        let err = context(tree, "export --json --yaml")
            .execute(Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_options_error(),
            Some(OptionsError::Conflict { other, .. }) if other == "yaml"
        ));
    }

    #[tokio::test]
    async fn test_required_subcommand() {
        let log = Log::default();
        let tree = MemoryCommandTree::new().with("cmds/db/migrate", unit(recorder(&log, "m")));
        let err = context(tree, "db").execute(Value::Null).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Usage(UsageError::RequiredSubcommand { ref name }) if name == "db"
        ));
    }

    #[tokio::test]
    async fn test_error_hook_can_ignore() {
        let failing = handler_fn(|_: State| async move { Err(anyhow::anyhow!("boom")) });
        let tree = MemoryCommandTree::new().with("cmds/fail", unit(failing));
        let ctx = context(tree, "fail");
        ctx.hooks().on(|mut e: ErrorEvent| async move {
            e.ignore();
            Ok(e)
        });

        assert_eq!(ctx.execute(Value::Null).await.unwrap(), None);
        assert_eq!(ctx.result(), None);
    }

    #[tokio::test]
    async fn test_error_without_hook_surfaces() {
        let failing = handler_fn(|_: State| async move { Err(anyhow::anyhow!("boom")) });
        let tree = MemoryCommandTree::new().with("cmds/fail", unit(failing));
        let err = context(tree, "fail").execute(Value::Null).await.unwrap_err();
        assert!(matches!(err, EngineError::Handler(_)));
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_error_hook_can_replace_error() {
        let tree = MemoryCommandTree::new();
        let ctx = context(tree, "anything");
        ctx.hooks().on(|mut e: ErrorEvent| async move {
            e.set_error(EngineError::Config("replaced".to_string()));
            Ok(e)
        });
        let err = ctx.execute(Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: replaced");
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent_and_execute_repeatable() {
        let log = Log::default();
        let plugin = TestPlugin::new(|_| Ok(()));
        let ctx = Context::new(
            ContextOptions::new("a b c", "cmds", Arc::new(abc_tree(&log)))
                .plugin(plugin.clone())
                .prompter(Arc::new(NonInteractivePrompter)),
        );

        ctx.prepare().await.unwrap();
        ctx.prepare().await.unwrap();
        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.phase(), Phase::Ready);
        assert!(ctx.plugin("test").unwrap().is_ready);

        assert_eq!(ctx.execute(json!([])).await.unwrap(), Some(json!(["a", "b", "c"])));
        assert_eq!(ctx.execute(json!(["z"])).await.unwrap(), Some(json!(["z", "a", "b", "c"])));
        assert_eq!(ctx.result(), Some(json!(["z", "a", "b", "c"])));
        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plugin_options_are_parsed() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_handler = seen.clone();
        let build = handler_fn(move |state: State| {
            let seen = seen_in_handler.clone();
            async move {
                if state.options().get_bool("verbose").await? {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Action::Next(state.data()))
            }
        });
        let plugin = TestPlugin::new(|ctx| {
            let extra = OptionSchema::new().with("verbose", OptionConfig::boolean().alias("v"))?;
            ctx.add_options(&extra)?;
            Ok(())
        });
        let tree = MemoryCommandTree::new().with("cmds/build", unit(build));
        let ctx = Context::new(
            ContextOptions::new("build -v", "cmds", Arc::new(tree))
                .plugin(plugin)
                .prompter(Arc::new(NonInteractivePrompter)),
        );

        ctx.execute(Value::Null).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.parsed_options()["verbose"], OptionValue::Boolean(true));
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_fire_in_order() {
        let log = Log::default();
        let ctx = context(abc_tree(&log), "a b c");
        let events = Log::default();

        macro_rules! track {
            ($event:ty) => {{
                let events = events.clone();
                ctx.hooks().on(move |e: $event| {
                    let events = events.clone();
                    async move {
                        events
                            .lock()
                            .unwrap()
                            .push(<$event as crate::core::hooks::HookEvent>::NAME.to_string());
                        Ok(e)
                    }
                });
            }};
        }
        track!(BeforeResolve);
        track!(BeforeResolveNext);
        track!(AfterResolveNext);
        track!(AfterResolve);
        track!(BeforeParse);
        track!(AfterParse);
        track!(BeforeExecute);
        track!(AfterExecute);

        ctx.execute(json!([])).await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "beforeResolve",
                "beforeResolveNext",
                "afterResolveNext",
                "beforeResolveNext",
                "afterResolveNext",
                "afterResolve",
                "beforeParse",
                "afterParse",
                "beforeExecute",
                "afterExecute",
            ]
        );
    }

    #[tokio::test]
    async fn test_before_resolve_can_supply_the_chain() {
        let log = Log::default();
        let ctx = context(MemoryCommandTree::new(), "does not exist");
        let handler = recorder(&log, "injected");
        ctx.hooks().on(move |mut e: BeforeResolve| {
            let unit = Arc::new(CommandUnit::new(handler.clone()));
            async move {
                e.add_resolved_commands([ResolvedCommand::from_unit("injected", unit)]);
                e.skip();
                Ok(e)
            }
        });
        assert_eq!(ctx.execute(json!([])).await.unwrap(), Some(json!(["injected"])));
    }

    #[tokio::test]
    async fn test_before_execute_can_short_circuit() {
        let log = Log::default();
        let ctx = context(abc_tree(&log), "a");
        ctx.hooks().on(|mut e: BeforeExecute| async move {
            e.set_result_and_skip(json!("cached"));
            Ok(e)
        });
        assert_eq!(ctx.execute(Value::Null).await.unwrap(), Some(json!("cached")));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vetoed_transition_completes_with_current_data() {
        let log = Log::default();
        let ctx = context(abc_tree(&log), "a b c");
        ctx.hooks().on(|mut e: BeforeStateChange| async move {
            if e.changes().index == Some(1) {
                e.skip();
            }
            Ok(e)
        });
        let empty_after = Arc::new(AtomicUsize::new(0));
        let empty_in_hook = empty_after.clone();
        ctx.hooks().on(move |e: AfterStateChange| {
            let counter = empty_in_hook.clone();
            async move {
                if e.changed.is_empty() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(e)
            }
        });

        // The data `a` proposed went with the vetoed change.
        assert_eq!(ctx.execute(json!([])).await.unwrap(), Some(json!([])));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(empty_after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fork_runs_hand_built_chain() {
        let log = Log::default();
        let inner_unit = Arc::new(unit(recorder(&log, "inner")));
        let outer = handler_fn(move |state: State| {
            let inner_unit = inner_unit.clone();
            async move {
                let forked = state
                    .fork(
                        vec![ResolvedCommand::from_unit("inner", inner_unit)],
                        json!(["forked"]),
                    )
                    .await?;
                Ok(Action::Next(json!({ "fork": forked })))
            }
        });
        let tree = MemoryCommandTree::new().with("cmds/outer", unit(outer));
        let ctx = context(tree, "outer");

        assert_eq!(
            ctx.execute(Value::Null).await.unwrap(),
            Some(json!({ "fork": ["forked", "inner"] }))
        );
        assert_eq!(ctx.resolved_commands().len(), 1);
    }

    #[tokio::test]
    async fn test_exit_can_be_cancelled() {
        let ctx = context(MemoryCommandTree::new(), "");
        ctx.hooks().on(|mut e: ExitEvent| async move {
            assert_eq!(e.code(), 3);
            e.cancel();
            Ok(e)
        });
        ctx.exit(3, Some("bye".to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_applies_default_command_and_funnels_errors() {
        let log = Log::default();
        let mut options = RunOptions::new(Arc::new(abc_tree(&log)));
        options.command_string = Some(String::new());
        options.commands_dir = PathBuf::from("cmds");
        options.default_command = Some("a".to_string());
        options.initial_data = json!([]);
        options.prompter = Arc::new(NonInteractivePrompter);
        assert_eq!(run(options).await.unwrap(), Some(json!(["a"])));

        let mut options = RunOptions::new(Arc::new(MemoryCommandTree::new()));
        options.command_string = Some(String::new());
        let err = run(options).await.unwrap_err();
        assert!(matches!(err, EngineError::Usage(UsageError::CommandRequired)));
    }

    #[tokio::test]
    async fn test_run_resolves_to_none_when_plugin_ignores_errors() {
        let failing = handler_fn(|_: State| async move { Err(anyhow::anyhow!("boom")) });
        let plugin = TestPlugin::new(|ctx| {
            ctx.hooks().on(|mut e: ErrorEvent| async move {
                e.ignore();
                Ok(e)
            });
            Ok(())
        });

        let mut options = RunOptions::new(Arc::new(
            MemoryCommandTree::new().with("cmds/fail", unit(failing)),
        ));
        options.command_string = Some("fail".to_string());
        options.commands_dir = PathBuf::from("cmds");
        options.plugins = vec![plugin.clone()];
        options.prompter = Arc::new(NonInteractivePrompter);

        assert_eq!(run(options).await.unwrap(), None);
        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_apply_default_command() {
        assert_eq!(apply_default_command("", Some("help")), "help");
        assert_eq!(apply_default_command("--verbose", Some("help")), "help --verbose");
        assert_eq!(apply_default_command("build", Some("help")), "build");
        assert_eq!(apply_default_command("", None), "");
    }
}
