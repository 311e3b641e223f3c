// src/errors.rs

//! # Error Taxonomy
//!
//! Every failure the engine can raise belongs to one family rooted at [`EngineError`].
//!
//! - **Usage** errors are caused by the person typing the command line (a missing
//!   command, an unknown option, a bad option combination). Help-display plugins
//!   react to these through [`EngineError::is_usage`].
//! - **Options-Config** errors mean a *schema* contradicts itself. They are raised
//!   eagerly and never depend on user input.
//! - Everything escaping a command handler, hook handler or plugin is converted with
//!   [`EngineError::from_handler`], so callers always receive an engine error.

use std::path::PathBuf;
use thiserror::Error;

/// Violations of an option schema by the supplied values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    /// A name was requested that no schema entry (nor any alias) declares.
    #[error("Unknown option '{name}'.")]
    Unknown {
        /// The name as requested.
        name: String,
    },
    /// A required option received no value from the command line, a prompt or a default.
    #[error("Option '{name}' is required.")]
    Required {
        /// Display name of the option.
        name: String,
    },
    /// Two options declared as mutually exclusive were both provided.
    #[error("Option '{name}' cannot be used with option '{other}'.")]
    Conflict {
        /// Display name of the option declaring the conflict.
        name: String,
        /// Display name of the conflicting option.
        other: String,
    },
    /// An option was provided without another option it depends on.
    #[error("Option '{name}' requires option '{other}'.")]
    Requires {
        /// Display name of the option declaring the requirement.
        name: String,
        /// Display name of the missing option.
        other: String,
    },
    /// The value does not match the declared primitive type.
    #[error("Option '{name}' must be of type {expected}, received {received}.")]
    Type {
        /// Display name of the option.
        name: String,
        /// The declared type.
        expected: String,
        /// A short description of what was received instead.
        received: String,
    },
    /// The value (or one array element) is not one of the declared choices.
    #[error("Invalid value '{value}' for option '{name}'. Expected one of: {choices}.")]
    Choices {
        /// Display name of the option.
        name: String,
        /// The offending value.
        value: String,
        /// The accepted values, comma separated.
        choices: String,
    },
    /// An array option was given without any element.
    #[error("Option '{name}' requires at least one value.")]
    EmptyArray {
        /// Display name of the option.
        name: String,
    },
    /// A fixed-arity option received the wrong number of arguments.
    #[error("Option '{name}' expects {expected} argument(s), received {received}.")]
    Nargs {
        /// Display name of the option.
        name: String,
        /// The declared `nargs`.
        expected: usize,
        /// The number of arguments actually captured.
        received: usize,
    },
}

/// Errors caused by how the command line was written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    /// The command line is empty.
    #[error("Command required.")]
    CommandRequired,
    /// The candidate command name looks like a path.
    #[error("Invalid command name '{0}'.")]
    InvalidCommandName(String),
    /// The command line could not be tokenized or starts with an option.
    #[error("Unable to parse command line: {0}")]
    Parse(String),
    /// No unit, directory or parameterized entry matches the name.
    #[error("Command '{name}' not found in '{}'.{}", dir.display(), format_suggestions(suggestions))]
    NotFound {
        /// The token that failed to resolve.
        name: String,
        /// The directory that was searched.
        dir: PathBuf,
        /// Near-miss entries of the searched directory.
        suggestions: Vec<String>,
    },
    /// A unit file exists but does not define a command.
    #[error("The file at '{}' does not define a command.", path.display())]
    MissingDefinition {
        /// Path of the offending unit.
        path: PathBuf,
    },
    /// Resolution finished on a unit that demands a deeper command.
    #[error("Command '{name}' requires a subcommand.")]
    RequiredSubcommand {
        /// Name of the unit that was reached last.
        name: String,
    },
    /// The option values violate the schema.
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// A schema entry that contradicts itself, regardless of any value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsConfigError {
    /// `required` combined with a non-empty `conflicts` list.
    #[error("Option '{0}' cannot be required and declare conflicts.")]
    RequiredWithConflicts(String),
    /// `required` combined with a non-empty `requires` list.
    #[error("Option '{0}' cannot be required and declare requirements.")]
    RequiredWithRequires(String),
    /// `nargs` of zero can never be satisfied.
    #[error("Option '{0}' declares nargs = 0.")]
    ZeroNargs(String),
}

/// The root of every error raised by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A user-caused error.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// A self-contradictory option schema.
    #[error(transparent)]
    OptionsConfig(#[from] OptionsConfigError),
    /// `State::start` was invoked twice on the same instance.
    #[error("State has already been started.")]
    AlreadyStarted,
    /// A command unit exists but could not be read or decoded.
    #[error("Failed to load command at '{}': {source}", path.display())]
    Load {
        /// Path of the unit.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },
    /// The engine configuration file could not be read.
    #[error("Configuration error: {0}")]
    Config(String),
    /// An error escaping a command handler, hook handler or plugin.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl EngineError {
    /// Converts an error returned by user code into an engine error.
    ///
    /// If the `anyhow::Error` carries an `EngineError` (e.g. a handler returned a
    /// `UsageError` with `?`), that error is recovered instead of being wrapped.
    pub fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine) => engine,
            Err(err) => match err.downcast::<UsageError>() {
                Ok(usage) => Self::Usage(usage),
                Err(err) => match err.downcast::<OptionsError>() {
                    Ok(options) => Self::Usage(UsageError::Options(options)),
                    Err(err) => match err.downcast::<OptionsConfigError>() {
                        Ok(config) => Self::OptionsConfig(config),
                        Err(err) => Self::Handler(err),
                    },
                },
            },
        }
    }

    /// Whether the error was caused by the user's input (including option errors).
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// The option violation, if this is an options error.
    pub fn as_options_error(&self) -> Option<&OptionsError> {
        match self {
            Self::Usage(UsageError::Options(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<OptionsError> for EngineError {
    fn from(err: OptionsError) -> Self {
        Self::Usage(UsageError::Options(err))
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" Did you mean: {}?", suggestions.join(", "))
    }
}
