// src/system/prompt.rs

//! # Interactive Prompts
//!
//! The option getter never talks to the terminal itself. When a value is missing
//! and the caller asked for a prompt, it hands a [`PromptRequest`] to a
//! [`Prompter`]. The widget is chosen from the option declaration (see
//! [`PromptKind::for_option`]).
//!
//! [`TerminalPrompter`] drives `dialoguer` on a blocking thread. [`NonInteractivePrompter`]
//! never asks, so defaults and `required` checks apply as if no prompt was requested.

use crate::core::arg_parser::{coerce_number, is_number_literal};
use crate::core::options::{OptionConfig, OptionType, OptionValue};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};

/// The widget used to ask for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Free text.
    Text,
    /// A number.
    Number,
    /// Yes or no.
    Toggle,
    /// Comma separated values.
    List,
    /// Hidden input.
    Password,
    /// One of the choices.
    Select,
    /// Any of the choices.
    MultiSelect,
}

impl PromptKind {
    /// Picks the widget matching an option declaration.
    pub fn for_option(config: &OptionConfig) -> Self {
        if !config.choices.is_empty() && config.kind != OptionType::Boolean {
            return if config.is_multi_arg() {
                Self::MultiSelect
            } else {
                Self::Select
            };
        }
        match config.kind {
            OptionType::String => Self::Text,
            OptionType::Number => Self::Number,
            OptionType::Boolean => Self::Toggle,
            OptionType::Array => Self::List,
            OptionType::Secret => Self::Password,
        }
    }
}

/// What a caller passes to an option accessor to allow prompting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSpec {
    /// Question shown to the user. Falls back to the option description, then its name.
    pub message: Option<String>,
    /// Overrides the widget chosen from the declaration.
    pub kind: Option<PromptKind>,
}

impl PromptSpec {
    /// A prompt showing `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            kind: None,
        }
    }

    /// Overrides the widget picked from the option type.
    pub fn kind(mut self, kind: PromptKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A fully described question.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    /// Display name of the option being asked for.
    pub name: String,
    /// Text shown to the user.
    pub message: String,
    /// Widget to use.
    pub kind: PromptKind,
    /// Pre-filled answer.
    pub default: Option<OptionValue>,
    /// Accepted values for select widgets.
    pub choices: Vec<String>,
}

impl PromptRequest {
    /// Builds the request for an option from the caller's spec.
    pub fn for_option(name: &str, config: &OptionConfig, spec: &PromptSpec) -> Self {
        let message = spec
            .message
            .clone()
            .or_else(|| config.description.clone())
            .unwrap_or_else(|| name.to_string());
        Self {
            name: name.to_string(),
            message,
            kind: spec.kind.unwrap_or_else(|| PromptKind::for_option(config)),
            default: config.default.clone(),
            choices: config.choices.clone(),
        }
    }
}

/// Asks the user for a value. `Ok(None)` means no answer was given.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, request: PromptRequest) -> Result<Option<OptionValue>>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, request: PromptRequest) -> Result<Option<OptionValue>> {
        log::debug!("Prompting for option '{}'.", request.name);
        tokio::task::spawn_blocking(move || prompt_blocking(&request))
            .await
            .context("prompt task failed")?
    }
}

/// Answers every prompt with nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompter;

#[async_trait]
impl Prompter for NonInteractivePrompter {
    async fn prompt(&self, request: PromptRequest) -> Result<Option<OptionValue>> {
        log::debug!("Prompt for '{}' skipped (non-interactive).", request.name);
        Ok(None)
    }
}

fn prompt_blocking(request: &PromptRequest) -> Result<Option<OptionValue>> {
    let theme = ColorfulTheme::default();
    let default_text = request.default.as_ref().map(ToString::to_string);

    let value = match request.kind {
        PromptKind::Text | PromptKind::List | PromptKind::Number => {
            let mut input = Input::<String>::with_theme(&theme)
                .with_prompt(&request.message)
                .allow_empty(true);
            if let Some(default) = &default_text {
                input = input.default(default.clone());
            }
            if request.kind == PromptKind::Number {
                input = input.validate_with(|s: &String| -> Result<(), &str> {
                    if s.is_empty() || is_number_literal(s) {
                        Ok(())
                    } else {
                        Err("Please enter a number")
                    }
                });
            }
            let answer = input.interact_text()?;
            if answer.is_empty() {
                None
            } else {
                Some(match request.kind {
                    PromptKind::Number => coerce_number(answer),
                    PromptKind::List => OptionValue::Array(
                        answer
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect(),
                    ),
                    _ => OptionValue::String(answer),
                })
            }
        }
        PromptKind::Toggle => {
            let default = request
                .default
                .as_ref()
                .and_then(OptionValue::as_bool)
                .unwrap_or(false);
            let answer = Confirm::with_theme(&theme)
                .with_prompt(&request.message)
                .default(default)
                .interact()?;
            Some(OptionValue::Boolean(answer))
        }
        PromptKind::Password => {
            let answer = Password::with_theme(&theme)
                .with_prompt(&request.message)
                .allow_empty_password(true)
                .interact()?;
            (!answer.is_empty()).then_some(OptionValue::String(answer))
        }
        PromptKind::Select => {
            let default = default_text
                .as_ref()
                .and_then(|d| request.choices.iter().position(|c| c == d))
                .unwrap_or(0);
            let index = Select::with_theme(&theme)
                .with_prompt(&request.message)
                .items(&request.choices)
                .default(default)
                .interact()?;
            request.choices.get(index).cloned().map(OptionValue::String)
        }
        PromptKind::MultiSelect => {
            let preselected: Vec<bool> = request
                .choices
                .iter()
                .map(|c| {
                    request
                        .default
                        .as_ref()
                        .is_some_and(|d| d.as_array().map_or(d.to_string() == *c, |a| a.contains(c)))
                })
                .collect();
            let picked = MultiSelect::with_theme(&theme)
                .with_prompt(&request.message)
                .items(&request.choices)
                .defaults(&preselected)
                .interact()?;
            let items: Vec<String> = picked
                .into_iter()
                .filter_map(|i| request.choices.get(i).cloned())
                .collect();
            Some(OptionValue::Array(items))
        }
    };
    Ok(value)
}
