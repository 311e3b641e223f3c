// src/core/mod.rs

/// Command-line tokenizer and option parser.
pub mod arg_parser;
pub mod command_tree;
/// Small string helpers shared by the parser and the resolver.
pub mod commons;
pub mod context;
pub mod events;
pub mod hooks;
pub mod manifest;
pub mod options;
pub mod options_getter;
/// Bracketed path parameters (`[id]`, `[...ids]`).
pub mod parameters;
/// Configuration file discovery and path expansion.
pub mod paths;
/// The plugin contract.
pub mod plugin;
pub mod resolver;
pub mod validation;
