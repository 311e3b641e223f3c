//! # System Interaction Layer
//!
//! The boundary between the engine and the terminal.
//!
//! ## Modules
//!
//! - **`prompt`**: the [`prompt::Prompter`] seam the option getter asks missing
//!   values through, with a `dialoguer` implementation for interactive terminals
//!   and a silent one for scripts and tests.

pub mod prompt;
