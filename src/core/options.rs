// src/core/options.rs

//! # Option Schemas
//!
//! Declarations of the options a command unit accepts, and the merged schema a
//! whole invocation is parsed against.
//!
//! Every entry is reachable under its key, under each alias and under the
//! camel-cased form of both (`dry-run`, `n`, `dryRun`). [`OptionSchema::canonical_key`]
//! maps any of those spellings back to the declared key.

use crate::core::commons::to_camel_case;
use crate::errors::OptionsConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The parsed or resolved values of an invocation, keyed by option name.
pub type OptionValues = HashMap<String, OptionValue>;

/// The primitive type an option is coerced to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// A single string argument.
    #[default]
    String,
    /// A decimal or exponential number.
    Number,
    /// A flag without argument.
    Boolean,
    /// All following bare arguments (or a comma separated inline value).
    Array,
    /// A string that is never echoed back (password prompt).
    Secret,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Secret => "secret",
        };
        f.write_str(name)
    }
}

/// A single option value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OptionValue {
    /// `true` / `false`.
    Boolean(bool),
    /// Any finite number.
    Number(f64),
    /// A string (also used for secrets).
    String(String),
    /// A list of string arguments.
    Array(Vec<String>),
}

impl OptionValue {
    /// The string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric payload, if this is a number value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The elements, if this is an array value.
    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// A short description used in type errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
        }
    }

    /// Converts the value to JSON for handlers that forward option values as data.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::Array(value)
    }
}

/// One schema entry.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OptionConfig {
    /// The primitive type values are coerced to.
    #[serde(rename = "type")]
    pub kind: OptionType,
    /// Alternate keys (`n` for `name`).
    pub alias: Vec<String>,
    /// Human readable description, used by help renderers and as prompt fallback.
    pub description: Option<String>,
    /// Value used when nothing else provides one.
    pub default: Option<OptionValue>,
    /// Whether the option must end up with a value.
    pub required: bool,
    /// The only accepted values.
    pub choices: Vec<String>,
    /// Fixed number of arguments to capture.
    pub nargs: Option<usize>,
    /// Keys that must also be present when this option is.
    pub requires: Vec<String>,
    /// Keys that must be absent when this option is present.
    pub conflicts: Vec<String>,
}

impl OptionConfig {
    /// A new entry of the given type.
    pub fn new(kind: OptionType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// A `string` entry.
    pub fn string() -> Self {
        Self::new(OptionType::String)
    }

    /// A `number` entry.
    pub fn number() -> Self {
        Self::new(OptionType::Number)
    }

    /// A `boolean` entry.
    pub fn boolean() -> Self {
        Self::new(OptionType::Boolean)
    }

    /// An `array` entry.
    pub fn array() -> Self {
        Self::new(OptionType::Array)
    }

    /// A `secret` entry.
    pub fn secret() -> Self {
        Self::new(OptionType::Secret)
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias.push(alias.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts the accepted values.
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a fixed argument count.
    pub fn nargs(mut self, nargs: usize) -> Self {
        self.nargs = Some(nargs);
        self
    }

    /// Declares a dependency on another option.
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.requires.push(key.into());
        self
    }

    /// Declares a conflict with another option.
    pub fn conflicts(mut self, key: impl Into<String>) -> Self {
        self.conflicts.push(key.into());
        self
    }

    /// Checks the entry against the rules that hold independently of any value.
    pub fn validate_config(&self, key: &str) -> Result<(), OptionsConfigError> {
        if self.required && !self.conflicts.is_empty() {
            return Err(OptionsConfigError::RequiredWithConflicts(key.to_string()));
        }
        if self.required && !self.requires.is_empty() {
            return Err(OptionsConfigError::RequiredWithRequires(key.to_string()));
        }
        if self.nargs == Some(0) {
            return Err(OptionsConfigError::ZeroNargs(key.to_string()));
        }
        Ok(())
    }

    /// Whether the entry captures several arguments into an array.
    pub fn is_multi_arg(&self) -> bool {
        self.kind == OptionType::Array || self.nargs.is_some_and(|n| n > 1)
    }
}

/// An ordered set of option declarations keyed by their canonical name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct OptionSchema {
    entries: BTreeMap<String, OptionConfig>,
}

impl OptionSchema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from `(key, entry)` pairs, rejecting invalid entries eagerly.
    pub fn try_from_entries<I, K>(entries: I) -> Result<Self, OptionsConfigError>
    where
        I: IntoIterator<Item = (K, OptionConfig)>,
        K: Into<String>,
    {
        let mut schema = Self::new();
        for (key, config) in entries {
            schema.insert(key, config)?;
        }
        Ok(schema)
    }

    /// Adds or replaces an entry after validating it.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        config: OptionConfig,
    ) -> Result<(), OptionsConfigError> {
        let key = key.into();
        config.validate_config(&key)?;
        self.entries.insert(key, config);
        Ok(())
    }

    /// Builder form of [`OptionSchema::insert`].
    pub fn with(
        mut self,
        key: impl Into<String>,
        config: OptionConfig,
    ) -> Result<Self, OptionsConfigError> {
        self.insert(key, config)?;
        Ok(self)
    }

    /// Validates every entry; used for schemas that were deserialized.
    pub fn validate_config(&self) -> Result<(), OptionsConfigError> {
        self.entries
            .iter()
            .try_for_each(|(key, config)| config.validate_config(key))
    }

    /// Merges another schema into this one.
    ///
    /// New keys are added. For keys already declared, the incoming entry's fields
    /// take over but the alias set is the union of both, so a deeper declaration
    /// can never drop an alias an outer command introduced.
    pub fn merge(&mut self, other: &Self) -> Result<(), OptionsConfigError> {
        for (key, incoming) in &other.entries {
            incoming.validate_config(key)?;
            match self.entries.get_mut(key) {
                Some(existing) => {
                    let mut aliases = existing.alias.clone();
                    for alias in &incoming.alias {
                        if !aliases.contains(alias) {
                            aliases.push(alias.clone());
                        }
                    }
                    *existing = OptionConfig {
                        alias: aliases,
                        ..incoming.clone()
                    };
                }
                None => {
                    self.entries.insert(key.clone(), incoming.clone());
                }
            }
        }
        Ok(())
    }

    /// The entry declared under exactly `key`.
    pub fn get(&self, key: &str) -> Option<&OptionConfig> {
        self.entries.get(key)
    }

    /// Iterates `(key, entry)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionConfig)> {
        self.entries.iter()
    }

    /// Number of declared keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves any spelling of an option (key, alias, or camel case of either)
    /// to its declared key.
    pub fn canonical_key(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.entries.get_key_value(name) {
            return Some(key.as_str());
        }
        self.entries
            .iter()
            .find(|(key, config)| Self::spellings(key, config).iter().any(|s| s == name))
            .map(|(key, _)| key.as_str())
    }

    /// Looks up an entry by any of its spellings.
    pub fn lookup(&self, name: &str) -> Option<(&str, &OptionConfig)> {
        let key = self.canonical_key(name)?;
        self.entries.get(key).map(|config| (key, config))
    }

    /// Every spelling an option can be addressed by, key first, without duplicates.
    pub fn variants(&self, key: &str) -> Vec<String> {
        match self.entries.get(key) {
            Some(config) => Self::spellings(key, config),
            None => vec![key.to_string()],
        }
    }

    /// The most readable name of an option: its longest key or alias.
    pub fn display_name(&self, key: &str) -> String {
        let Some(config) = self.entries.get(key) else {
            return key.to_string();
        };
        std::iter::once(key)
            .chain(config.alias.iter().map(String::as_str))
            .fold(key, |best, candidate| {
                if candidate.len() > best.len() {
                    candidate
                } else {
                    best
                }
            })
            .to_string()
    }

    fn spellings(key: &str, config: &OptionConfig) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(2 + config.alias.len() * 2);
        for name in std::iter::once(key).chain(config.alias.iter().map(String::as_str)) {
            for spelling in [name.to_string(), to_camel_case(name)] {
                if !names.contains(&spelling) {
                    names.push(spelling);
                }
            }
        }
        names
    }
}
