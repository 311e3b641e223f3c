// src/core/arg_parser.rs

use crate::core::options::{OptionConfig, OptionSchema, OptionType, OptionValue, OptionValues};
use crate::errors::UsageError;
use lazy_static::lazy_static;
use regex::Regex;
use std::iter::Peekable;
use std::vec::IntoIter;

lazy_static! {
    // Decimal and exponential literals, optionally negative: `42`, `-1.5`, `.5`, `2e10`.
    static ref NUMBER_RE: Regex =
        Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").unwrap();
}

/// The outcome of splitting a command line against a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCommand {
    /// Ordered, non-option words.
    pub tokens: Vec<String>,
    /// Option values keyed by declared key (or by the raw name for undeclared flags).
    pub options: OptionValues,
}

/// Splits a command line into positional tokens and option values.
///
/// # Logic:
/// - Words are split shell-style, so `-c="c1 c2"` stays one word.
/// - A word starting with `-` (that is not a number) is an option; `--` ends option
///   parsing and every following word is a token.
/// - Declared options consume arguments according to their type. Undeclared
///   options become `true` flags (or keep their inline `=value`) so later steps can
///   decide whether they are valid.
///
/// The function is pure: the same line and schema always produce the same result.
pub fn parse_command(line: &str, schema: &OptionSchema) -> Result<ParsedCommand, UsageError> {
    let words = shlex::split(line)
        .ok_or_else(|| UsageError::Parse(format!("unbalanced quotes in '{}'", line)))?;
    let mut words = words.into_iter().peekable();
    let mut parsed = ParsedCommand::default();

    while let Some(word) = words.next() {
        if word == "--" {
            parsed.tokens.extend(words.by_ref());
            break;
        }

        match flag_body(&word) {
            Some(flag) => consume_flag(&mut parsed.options, flag, schema, &mut words),
            None => parsed.tokens.push(word),
        }
    }

    Ok(parsed)
}

/// Drops the run of options in front of the first command word.
///
/// Declared options take their arguments along, so with `env` declared as a
/// string `--env prod web --force` leaves `web --force`. A leading `--` is
/// dropped and ends the run. Nothing from the first command word on is touched.
pub fn strip_leading_options(words: Vec<String>, schema: &OptionSchema) -> Vec<String> {
    let mut words = words.into_iter().peekable();
    let mut discarded = OptionValues::new();
    while let Some(word) = words.peek() {
        if word.as_str() == "--" {
            words.next();
            break;
        }
        let Some(flag) = flag_body(word).map(str::to_string) else {
            break;
        };
        words.next();
        consume_flag(&mut discarded, &flag, schema, &mut words);
    }
    words.collect()
}

/// Records one option word (without dashes), consuming its arguments from `words`.
fn consume_flag(
    options: &mut OptionValues,
    flag: &str,
    schema: &OptionSchema,
    words: &mut Peekable<IntoIter<String>>,
) {
    let (name, inline) = match flag.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (flag, None),
    };

    if let Some((key, config)) = schema.lookup(name) {
        consume_declared(options, key.to_string(), config, inline, words);
    } else if let Some((key, _)) = negated_boolean(schema, name) {
        options.insert(key.to_string(), OptionValue::Boolean(false));
    } else {
        log::trace!("Undeclared option '{}' coerced to a flag.", name);
        let value = inline.map_or(OptionValue::Boolean(true), OptionValue::String);
        options.insert(name.to_string(), value);
    }
}

/// Returns the option name (without dashes) if the word is an option.
fn flag_body(word: &str) -> Option<&str> {
    if is_number_literal(word) {
        return None;
    }
    let body = word
        .strip_prefix("--")
        .or_else(|| word.strip_prefix('-'))?;
    if body.is_empty() || body.starts_with('=') {
        None
    } else {
        Some(body)
    }
}

fn is_flag(word: &str) -> bool {
    word == "--" || flag_body(word).is_some()
}

/// Whether the word is a decimal or exponential number literal.
pub fn is_number_literal(word: &str) -> bool {
    NUMBER_RE.is_match(word)
}

/// `--no-verbose` for a declared boolean `verbose`.
fn negated_boolean<'s>(schema: &'s OptionSchema, name: &str) -> Option<(&'s str, &'s OptionConfig)> {
    let positive = name.strip_prefix("no-")?;
    schema
        .lookup(positive)
        .filter(|(_, config)| config.kind == OptionType::Boolean)
}

fn consume_declared(
    options: &mut OptionValues,
    key: String,
    config: &OptionConfig,
    inline: Option<String>,
    words: &mut Peekable<IntoIter<String>>,
) {
    match config.kind {
        OptionType::Boolean => {
            let value = match inline.as_deref() {
                None => OptionValue::Boolean(true),
                Some("true") => OptionValue::Boolean(true),
                Some("false") => OptionValue::Boolean(false),
                // Left as a string so type validation reports it.
                Some(other) => OptionValue::String(other.to_string()),
            };
            options.insert(key, value);
        }
        OptionType::Array => {
            let mut items: Vec<String> = match options.remove(&key) {
                Some(OptionValue::Array(existing)) => existing,
                _ => Vec::new(),
            };
            let mut captured = 0;
            if let Some(value) = inline {
                for part in value.split(',').filter(|p| !p.is_empty()) {
                    items.push(part.to_string());
                    captured += 1;
                }
            }
            while config.nargs.is_none_or(|n| captured < n) {
                match words.next_if(|w| !is_flag(w)) {
                    Some(word) => {
                        items.push(word);
                        captured += 1;
                    }
                    None => break,
                }
            }
            options.insert(key, OptionValue::Array(items));
        }
        OptionType::String | OptionType::Secret | OptionType::Number
            if config.nargs.is_some_and(|n| n > 1) =>
        {
            let expected = config.nargs.unwrap_or(1);
            let mut items: Vec<String> = inline.into_iter().collect();
            while items.len() < expected {
                match words.next_if(|w| !is_flag(w)) {
                    Some(word) => items.push(word),
                    None => break,
                }
            }
            options.insert(key, OptionValue::Array(items));
        }
        OptionType::Number => {
            let raw = inline.or_else(|| words.next_if(|w| !is_flag(w)));
            if let Some(raw) = raw {
                options.insert(key, coerce_number(raw));
            }
        }
        OptionType::String | OptionType::Secret => {
            let value = inline
                .or_else(|| words.next_if(|w| !is_flag(w)))
                .unwrap_or_default();
            options.insert(key, OptionValue::String(value));
        }
    }
}

/// Parses a number literal, keeping the raw string when it is not one so that
/// validation can report the type mismatch.
pub fn coerce_number(raw: String) -> OptionValue {
    if is_number_literal(&raw) {
        match raw.parse::<f64>() {
            Ok(n) => OptionValue::Number(n),
            Err(_) => OptionValue::String(raw),
        }
    } else {
        OptionValue::String(raw)
    }
}

/// Re-joins tokens into a command line that splits back into the same tokens.
pub fn join_tokens(tokens: &[String]) -> Result<String, UsageError> {
    shlex::try_join(tokens.iter().map(String::as_str))
        .map_err(|e| UsageError::Parse(format!("cannot quote tokens: {}", e)))
}

// MARK: --- UNIT TESTS ---
