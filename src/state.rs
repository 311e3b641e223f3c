// src/state.rs

//! # Execution State
//!
//! The cursor over one resolved chain. The index starts before the first command
//! (`None`); each [`Action::Next`] moves it forward one link and runs that link's
//! handler, each [`Action::End`] jumps to the last link and finishes.
//!
//! Every move goes through `beforeStateChange`/`afterStateChange`. A vetoed move
//! still fires `afterStateChange` (with an empty change set) and finishes the
//! execution with the data the state held before the veto.

use crate::core::context::Context;
use crate::core::events::{
    AfterStateChange, BeforeEnd, BeforeNext, BeforeStateChange, StateChanges, StateSnapshot,
};
use crate::core::options_getter::OptionsGetter;
use crate::core::parameters::{ParamValue, Params};
use crate::errors::EngineError;
use crate::models::{Action, ResolvedCommand};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct Cursor {
    index: Option<usize>,
    data: Value,
    params: Params,
}

// What the execution loop does after a transition.
enum Flow {
    Continue(Action),
    Complete(Value),
}

/// One execution over a resolved chain.
///
/// Clones share the same cursor, so a handler holding a clone always reads the
/// live position.
#[derive(Clone)]
pub struct State {
    context: Arc<Context>,
    commands: Arc<[ResolvedCommand]>,
    options: OptionsGetter,
    cursor: Arc<Mutex<Cursor>>,
    started: Arc<AtomicBool>,
}

impl State {
    /// A state positioned before the first command.
    pub fn new(context: Arc<Context>, commands: Vec<ResolvedCommand>, options: OptionsGetter) -> Self {
        Self {
            context,
            commands: commands.into(),
            options,
            cursor: Arc::new(Mutex::new(Cursor::default())),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    // --- Accessors ---

    /// Position in the chain; `None` before the first command ran.
    pub fn index(&self) -> Option<usize> {
        self.lock().index
    }

    /// The in-flight data.
    pub fn data(&self) -> Value {
        self.lock().data.clone()
    }

    /// Parameters accumulated from every link entered so far.
    pub fn params(&self) -> Params {
        self.lock().params.clone()
    }

    /// One accumulated parameter.
    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.lock().params.get(name).cloned()
    }

    /// The option getter of this execution.
    pub fn options(&self) -> &OptionsGetter {
        &self.options
    }

    /// The link at the current index.
    pub fn command(&self) -> Option<&ResolvedCommand> {
        self.index().and_then(|i| self.commands.get(i))
    }

    /// The whole chain.
    pub fn commands(&self) -> &[ResolvedCommand] {
        &self.commands
    }

    /// The owning context.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// A copy of the cursor.
    pub fn snapshot(&self) -> StateSnapshot {
        let cursor = self.lock();
        StateSnapshot {
            index: cursor.index,
            data: cursor.data.clone(),
            params: cursor.params.clone(),
        }
    }

    /// Runs `commands` in an isolated state with this execution's option values.
    pub async fn fork(
        &self,
        commands: Vec<ResolvedCommand>,
        initial_data: Value,
    ) -> Result<Value, EngineError> {
        self.context
            .fork(commands, initial_data, self.options.values())
            .await
    }

    // --- Execution ---

    /// Runs the chain to completion and returns the final data.
    ///
    /// # Errors
    /// `AlreadyStarted` if this state (or a clone of it) was started before, and
    /// anything a handler or hook returns.
    pub async fn start(&self, initial_data: Value) -> Result<Value, EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }
        log::debug!("Starting execution over {} command(s).", self.commands.len());

        let mut action = Action::Next(initial_data);
        loop {
            let flow = match action {
                Action::Next(data) => self.next(data).await?,
                Action::End(data) => self.end(data).await?,
            };
            match flow {
                Flow::Continue(next) => action = next,
                Flow::Complete(data) => {
                    log::debug!("Execution completed at index {:?}.", self.index());
                    return Ok(data);
                }
            }
        }
    }

    async fn next(&self, data: Value) -> Result<Flow, EngineError> {
        let hooks = self.context.hooks();
        let next_index = self.index().map_or(0, |i| i + 1);
        let next_command = self.commands.get(next_index).cloned();

        let data = hooks
            .call(BeforeNext::new(self.snapshot(), data, next_command.clone()))
            .await?
            .into_data();

        let Some(command) = next_command else {
            self.apply_changes(StateChanges {
                data: Some(data),
                ..Default::default()
            })
            .await?;
            return Ok(Flow::Complete(self.data()));
        };

        let mut params = self.params();
        params.extend(command.params.clone());
        let applied = self
            .apply_changes(StateChanges {
                index: Some(next_index),
                data: Some(data),
                params: Some(params),
            })
            .await?;
        if !applied {
            return Ok(Flow::Complete(self.data()));
        }

        // A hook may have redirected the cursor.
        let Some(command) = self.command().cloned() else {
            return Ok(Flow::Complete(self.data()));
        };
        log::debug!("Running command '{}'.", command.command_name);
        let action = command
            .command
            .handler
            .handle(self)
            .await
            .map_err(EngineError::from_handler)?;
        Ok(Flow::Continue(action))
    }

    async fn end(&self, data: Value) -> Result<Flow, EngineError> {
        let data = self
            .context
            .hooks()
            .call(BeforeEnd::new(self.snapshot(), data))
            .await?
            .into_data();

        self.apply_changes(StateChanges {
            index: self.commands.len().checked_sub(1),
            data: Some(data),
            params: None,
        })
        .await?;
        Ok(Flow::Complete(self.data()))
    }

    /// Applies a change set through the state-change hooks.
    /// Returns `false` when a hook vetoed it.
    async fn apply_changes(&self, changes: StateChanges) -> Result<bool, EngineError> {
        let hooks = self.context.hooks();
        let (changes, vetoed) = hooks
            .call(BeforeStateChange::new(self.snapshot(), changes))
            .await?
            .into_parts();

        if vetoed {
            log::debug!("State change vetoed at index {:?}.", self.index());
            hooks
                .call(AfterStateChange {
                    state: self.snapshot(),
                    changed: StateChanges::default(),
                })
                .await?;
            return Ok(false);
        }

        {
            let mut cursor = self.lock();
            if let Some(index) = changes.index {
                cursor.index = Some(index);
            }
            if let Some(data) = &changes.data {
                cursor.data = data.clone();
            }
            if let Some(params) = &changes.params {
                cursor.params = params.clone();
            }
        }

        hooks
            .call(AfterStateChange {
                state: self.snapshot(),
                changed: changes,
            })
            .await?;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cursor = self.lock();
        f.debug_struct("State")
            .field("index", &cursor.index)
            .field("data", &cursor.data)
            .field("params", &cursor.params)
            .field("commands", &self.commands.len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// MARK: --- UNIT TESTS ---
