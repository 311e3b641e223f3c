// src/core/parameters.rs

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    // `[name]` or `[...name]`; the name must start with a letter or underscore.
    static ref PARAM_SEGMENT_RE: Regex =
        Regex::new(r"^\[(\.\.\.)?([A-Za-z_][A-Za-z0-9_-]*)\]$").unwrap();
}

/// Named captures accumulated from bracketed path segments.
pub type Params = BTreeMap<String, ParamValue>;

/// The value bound to a path parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ParamValue {
    /// `[name]`: bound to exactly one token.
    Single(String),
    /// `[...name]`: bound to every remaining token.
    Spread(Vec<String>),
}

impl ParamValue {
    /// The single value, if this parameter is not a spread.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s),
            Self::Spread(_) => None,
        }
    }

    /// The values as a slice (one element for single parameters).
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(s) => std::slice::from_ref(s),
            Self::Spread(items) => items,
        }
    }
}

/// A bracketed directory entry parsed into its parameter definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSegment {
    /// The parameter name without brackets or spread dots.
    pub name: String,
    /// Whether the segment consumes every remaining token.
    pub spread: bool,
}

impl ParamSegment {
    /// Parses an entry name such as `[id]` or `[...files]`.
    /// Returns `None` for plain names and for brackets around an invalid name.
    pub fn parse(entry: &str) -> Option<Self> {
        let caps = PARAM_SEGMENT_RE.captures(entry)?;
        let name = caps.get(2)?.as_str().to_string();
        Some(Self {
            name,
            spread: caps.get(1).is_some(),
        })
    }

    /// Binds the given tokens to this segment.
    ///
    /// A single parameter takes the first token; a spread parameter takes all of them.
    pub fn bind(&self, tokens: &[String]) -> Option<ParamValue> {
        if self.spread {
            Some(ParamValue::Spread(tokens.to_vec()))
        } else {
            tokens.first().cloned().map(ParamValue::Single)
        }
    }
}

/// Whether a directory entry is a parameterized segment.
pub fn is_param_segment(entry: &str) -> bool {
    PARAM_SEGMENT_RE.is_match(entry)
}
