// src/core/events.rs

//! # Lifecycle Events
//!
//! One payload per named phase. A hook handler can observe a payload, replace a
//! value before it takes effect, or veto the default action.
//!
//! Terminal actions (`skip`, `set_*_and_skip`, `ignore`, `cancel`) are sticky:
//! the first one recorded during a call wins and later ones are ignored.
//!
//! | Phase               | Payload                 |
//! |---------------------|-------------------------|
//! | `beforeResolve`     | [`BeforeResolve`]       |
//! | `afterResolve`      | [`AfterResolve`]        |
//! | `beforeResolveNext` | [`BeforeResolveNext`]   |
//! | `afterResolveNext`  | [`AfterResolveNext`]    |
//! | `beforeParse`       | [`BeforeParse`]         |
//! | `afterParse`        | [`AfterParse`]          |
//! | `beforeExecute`     | [`BeforeExecute`]       |
//! | `afterExecute`      | [`AfterExecute`]        |
//! | `beforeStateChange` | [`BeforeStateChange`]   |
//! | `afterStateChange`  | [`AfterStateChange`]    |
//! | `beforeNext`        | [`BeforeNext`]          |
//! | `beforeEnd`         | [`BeforeEnd`]           |
//! | `error`             | [`ErrorEvent`]          |
//! | `exit`              | [`ExitEvent`]           |

use crate::core::hooks::HookEvent;
use crate::core::options::{OptionSchema, OptionValues};
use crate::core::parameters::Params;
use crate::errors::EngineError;
use crate::models::ResolvedCommand;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

// --- Shared Views ---

/// A read-only copy of an execution cursor at the time an event was raised.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    /// `None` before the first command has run.
    pub index: Option<usize>,
    /// The in-flight data.
    pub data: Value,
    /// Parameters accumulated so far.
    pub params: Params,
}

/// A proposed (or applied) cursor update. Absent fields stay unchanged.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct StateChanges {
    /// The new cursor position.
    pub index: Option<usize>,
    /// The new data.
    pub data: Option<Value>,
    /// The new accumulated parameters.
    pub params: Option<Params>,
}

impl StateChanges {
    /// Whether the change set would leave the state untouched.
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.data.is_none() && self.params.is_none()
    }
}

// --- Resolution ---

/// Raised once before the command string is resolved.
#[derive(Debug)]
pub struct BeforeResolve {
    command_string: String,
    commands_dir: PathBuf,
    added: Vec<ResolvedCommand>,
    skipped: bool,
}

impl HookEvent for BeforeResolve {
    const NAME: &'static str = "beforeResolve";
}

impl BeforeResolve {
    pub(crate) fn new(command_string: String, commands_dir: PathBuf) -> Self {
        Self {
            command_string,
            commands_dir,
            added: Vec::new(),
            skipped: false,
        }
    }

    /// The command string about to be resolved.
    pub fn command_string(&self) -> &str {
        &self.command_string
    }

    /// The root directory of the lookup.
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// Resolves this string instead of the one the context was created with.
    pub fn set_command_string(&mut self, command_string: impl Into<String>) {
        self.command_string = command_string.into();
    }

    /// Puts commands at the head of the chain, ahead of anything resolved.
    pub fn add_resolved_commands(&mut self, commands: impl IntoIterator<Item = ResolvedCommand>) {
        self.added.extend(commands);
    }

    /// Skips resolution. The chain consists of the added commands only.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Whether a hook skipped resolution.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn into_parts(self) -> (String, Vec<ResolvedCommand>, bool) {
        (self.command_string, self.added, self.skipped)
    }
}

/// Raised once after the whole chain has been resolved.
#[derive(Debug)]
pub struct AfterResolve {
    resolved_commands: Vec<ResolvedCommand>,
    added: Vec<ResolvedCommand>,
}

impl HookEvent for AfterResolve {
    const NAME: &'static str = "afterResolve";
}

impl AfterResolve {
    pub(crate) fn new(resolved_commands: Vec<ResolvedCommand>) -> Self {
        Self {
            resolved_commands,
            added: Vec::new(),
        }
    }

    /// The chain as resolved.
    pub fn resolved_commands(&self) -> &[ResolvedCommand] {
        &self.resolved_commands
    }

    /// Appends commands to the end of the chain.
    pub fn add_resolved_commands(&mut self, commands: impl IntoIterator<Item = ResolvedCommand>) {
        self.added.extend(commands);
    }

    pub(crate) fn into_added(self) -> Vec<ResolvedCommand> {
        self.added
    }
}

/// Raised before each link after the first is resolved.
#[derive(Debug)]
pub struct BeforeResolveNext {
    command_string: String,
    commands_dir: PathBuf,
    last_resolved: ResolvedCommand,
    added: Vec<ResolvedCommand>,
    skipped: bool,
}

impl HookEvent for BeforeResolveNext {
    const NAME: &'static str = "beforeResolveNext";
}

impl BeforeResolveNext {
    pub(crate) fn new(last_resolved: ResolvedCommand) -> Self {
        Self {
            command_string: last_resolved.remaining_command_string.clone(),
            commands_dir: last_resolved.subcommands_dir.clone(),
            last_resolved,
            added: Vec::new(),
            skipped: false,
        }
    }

    /// The input left for the next link.
    pub fn command_string(&self) -> &str {
        &self.command_string
    }

    /// The directory the next link is looked up in.
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    /// The link the next one would follow.
    pub fn last_resolved(&self) -> &ResolvedCommand {
        &self.last_resolved
    }

    /// Resolves this input instead.
    pub fn set_command_string(&mut self, command_string: impl Into<String>) {
        self.command_string = command_string.into();
    }

    /// Looks the next link up in another directory.
    pub fn set_commands_dir(&mut self, commands_dir: impl Into<PathBuf>) {
        self.commands_dir = commands_dir.into();
    }

    /// Appends commands to the chain before the next link.
    pub fn add_resolved_commands(&mut self, commands: impl IntoIterator<Item = ResolvedCommand>) {
        self.added.extend(commands);
    }

    /// Stops resolution here. Added commands are still appended.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Whether a hook stopped resolution.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn into_parts(self) -> (ResolvedCommand, Vec<ResolvedCommand>, bool) {
        let next_input = ResolvedCommand {
            remaining_command_string: self.command_string,
            subcommands_dir: self.commands_dir,
            ..self.last_resolved
        };
        (next_input, self.added, self.skipped)
    }
}

/// Raised after each link after the first is resolved.
#[derive(Debug)]
pub struct AfterResolveNext {
    resolved: ResolvedCommand,
    added: Vec<ResolvedCommand>,
}

impl HookEvent for AfterResolveNext {
    const NAME: &'static str = "afterResolveNext";
}

impl AfterResolveNext {
    pub(crate) fn new(resolved: ResolvedCommand) -> Self {
        Self {
            resolved,
            added: Vec::new(),
        }
    }

    /// The link just resolved.
    pub fn resolved(&self) -> &ResolvedCommand {
        &self.resolved
    }

    /// Appends commands right after the link that was just resolved.
    pub fn add_resolved_commands(&mut self, commands: impl IntoIterator<Item = ResolvedCommand>) {
        self.added.extend(commands);
    }

    pub(crate) fn into_parts(self) -> (ResolvedCommand, Vec<ResolvedCommand>) {
        (self.resolved, self.added)
    }
}

// --- Parsing ---

/// Raised once before the command string is parsed against the merged schema.
#[derive(Debug)]
pub struct BeforeParse {
    command_string: String,
    options: OptionSchema,
    parsed: Option<OptionValues>,
    skipped: bool,
}

impl HookEvent for BeforeParse {
    const NAME: &'static str = "beforeParse";
}

impl BeforeParse {
    pub(crate) fn new(command_string: String, options: OptionSchema) -> Self {
        Self {
            command_string,
            options,
            parsed: None,
            skipped: false,
        }
    }

    /// The command string about to be parsed.
    pub fn command_string(&self) -> &str {
        &self.command_string
    }

    /// The schema about to be used.
    pub fn options(&self) -> &OptionSchema {
        &self.options
    }

    /// Parses this string instead.
    pub fn set_command_string(&mut self, command_string: impl Into<String>) {
        self.command_string = command_string.into();
    }

    /// Parses and validates against this schema instead of the merged one. It
    /// also becomes the schema the execution reads options through.
    pub fn set_options(&mut self, options: OptionSchema) {
        self.options = options;
    }

    /// Uses these values and skips parsing.
    pub fn set_parsed_and_skip(&mut self, parsed: OptionValues) {
        if !self.skipped {
            self.parsed = Some(parsed);
            self.skipped = true;
        }
    }

    /// Skips parsing; no option values are recorded.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Whether a hook skipped parsing.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn into_parts(self) -> (String, OptionSchema, Option<OptionValues>, bool) {
        (self.command_string, self.options, self.parsed, self.skipped)
    }
}

/// Raised once after parsing.
#[derive(Debug)]
pub struct AfterParse {
    parsed: OptionValues,
}

impl HookEvent for AfterParse {
    const NAME: &'static str = "afterParse";
}

impl AfterParse {
    pub(crate) fn new(parsed: OptionValues) -> Self {
        Self { parsed }
    }

    /// The parsed values.
    pub fn parsed(&self) -> &OptionValues {
        &self.parsed
    }

    /// Replaces the parsed values.
    pub fn set_parsed(&mut self, parsed: OptionValues) {
        self.parsed = parsed;
    }

    pub(crate) fn into_parsed(self) -> OptionValues {
        self.parsed
    }
}

// --- Execution ---

/// Raised at the start of every `execute` call.
#[derive(Debug)]
pub struct BeforeExecute {
    initial_data: Value,
    result: Option<Value>,
    skipped: bool,
}

impl HookEvent for BeforeExecute {
    const NAME: &'static str = "beforeExecute";
}

impl BeforeExecute {
    pub(crate) fn new(initial_data: Value) -> Self {
        Self {
            initial_data,
            result: None,
            skipped: false,
        }
    }

    /// The data the first command will receive.
    pub fn initial_data(&self) -> &Value {
        &self.initial_data
    }

    /// Starts the chain with other data.
    pub fn set_initial_data(&mut self, data: Value) {
        self.initial_data = data;
    }

    /// Produces the result without running any command.
    pub fn set_result_and_skip(&mut self, result: Value) {
        if !self.skipped {
            self.result = Some(result);
            self.skipped = true;
        }
    }

    /// Runs no command; the execution produces no result.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Whether a hook skipped execution.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn into_parts(self) -> (Value, Option<Value>, bool) {
        (self.initial_data, self.result, self.skipped)
    }
}

/// Raised after every `execute` call that did not fail.
#[derive(Debug)]
pub struct AfterExecute {
    result: Option<Value>,
}

impl HookEvent for AfterExecute {
    const NAME: &'static str = "afterExecute";
}

impl AfterExecute {
    pub(crate) fn new(result: Option<Value>) -> Self {
        Self { result }
    }

    /// The final data, if execution produced any.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Replaces the final data.
    pub fn set_result(&mut self, result: Option<Value>) {
        self.result = result;
    }

    pub(crate) fn into_result(self) -> Option<Value> {
        self.result
    }
}

// --- State Transitions ---

/// Raised before the cursor moves.
#[derive(Debug)]
pub struct BeforeStateChange {
    state: StateSnapshot,
    changes: StateChanges,
    skipped: bool,
}

impl HookEvent for BeforeStateChange {
    const NAME: &'static str = "beforeStateChange";
}

impl BeforeStateChange {
    pub(crate) fn new(state: StateSnapshot, changes: StateChanges) -> Self {
        Self {
            state,
            changes,
            skipped: false,
        }
    }

    /// The cursor before the change.
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// The proposed change.
    pub fn changes(&self) -> &StateChanges {
        &self.changes
    }

    /// Applies these changes instead of the proposed ones.
    pub fn set_changes(&mut self, changes: StateChanges) {
        self.changes = changes;
    }

    /// Vetoes the transition.
    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Whether a hook vetoed the change.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub(crate) fn into_parts(self) -> (StateChanges, bool) {
        (self.changes, self.skipped)
    }
}

/// Raised after a transition; `changed` is empty when it was vetoed.
#[derive(Debug)]
pub struct AfterStateChange {
    /// The cursor after the change.
    pub state: StateSnapshot,
    /// What was applied; empty when the change was vetoed.
    pub changed: StateChanges,
}

impl HookEvent for AfterStateChange {
    const NAME: &'static str = "afterStateChange";
}

/// Raised before the cursor advances to the next command.
#[derive(Debug)]
pub struct BeforeNext {
    state: StateSnapshot,
    data: Value,
    next_command: Option<ResolvedCommand>,
}

impl HookEvent for BeforeNext {
    const NAME: &'static str = "beforeNext";
}

impl BeforeNext {
    pub(crate) fn new(state: StateSnapshot, data: Value, next_command: Option<ResolvedCommand>) -> Self {
        Self {
            state,
            data,
            next_command,
        }
    }

    /// The cursor before the move.
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// The data the next command will receive.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The command about to run, `None` at the end of the chain.
    pub fn next_command(&self) -> Option<&ResolvedCommand> {
        self.next_command.as_ref()
    }

    /// Hands other data to the next command.
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    pub(crate) fn into_data(self) -> Value {
        self.data
    }
}

/// Raised before the chain ends early.
#[derive(Debug)]
pub struct BeforeEnd {
    state: StateSnapshot,
    data: Value,
}

impl HookEvent for BeforeEnd {
    const NAME: &'static str = "beforeEnd";
}

impl BeforeEnd {
    pub(crate) fn new(state: StateSnapshot, data: Value) -> Self {
        Self { state, data }
    }

    /// The cursor before the jump.
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    /// The data the execution will finish with.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Finishes with other data.
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    pub(crate) fn into_data(self) -> Value {
        self.data
    }
}

// --- Errors & Exit ---

/// Raised when an error escapes `prepare` or `execute`.
#[derive(Debug)]
pub struct ErrorEvent {
    error: EngineError,
    ignored: bool,
}

impl HookEvent for ErrorEvent {
    const NAME: &'static str = "error";
}

impl ErrorEvent {
    pub(crate) fn new(error: EngineError) -> Self {
        Self {
            error,
            ignored: false,
        }
    }

    /// The error being reported.
    pub fn error(&self) -> &EngineError {
        &self.error
    }

    /// Propagates this error instead.
    pub fn set_error(&mut self, error: EngineError) {
        self.error = error;
    }

    /// Swallows the error; the call completes without a result.
    pub fn ignore(&mut self) {
        self.ignored = true;
    }

    /// Whether a hook swallowed the error.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub(crate) fn into_parts(self) -> (EngineError, bool) {
        (self.error, self.ignored)
    }
}

/// Raised when the context is asked to terminate the process.
#[derive(Debug)]
pub struct ExitEvent {
    code: i32,
    message: Option<String>,
    cancelled: bool,
}

impl HookEvent for ExitEvent {
    const NAME: &'static str = "exit";
}

impl ExitEvent {
    pub(crate) fn new(code: i32, message: Option<String>) -> Self {
        Self {
            code,
            message,
            cancelled: false,
        }
    }

    /// The exit code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The message printed before exiting.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Exits with another code.
    pub fn set_code(&mut self, code: i32) {
        self.code = code;
    }

    /// Prints another message, or none.
    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }

    /// Keeps the process alive.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether a hook cancelled the exit.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
