// src/cli/mod.rs

use crate::constants::COMMANDS_DIR_ENV;
use clap::Parser;
use std::path::PathBuf;

/// Handlers that manifests can name without Rust code.
pub mod builtins;
/// The engine configuration file.
pub mod config;
/// Turns parsed arguments into a run of the engine.
pub mod dispatcher;

/// cmdtree: runs command lines against a directory of command manifests.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Engine configuration file (defaults to ./cmdtree.toml, then the global one).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root of the command tree. Overrides the configuration file.
    #[arg(long, value_name = "DIR", env = COMMANDS_DIR_ENV)]
    pub commands_dir: Option<PathBuf>,

    /// Never prompt for missing option values.
    #[arg(long)]
    pub no_prompt: bool,

    /// Initial data passed to the first command, as JSON.
    #[arg(long, value_name = "JSON")]
    pub data: Option<String>,

    /// The command line to run.
    #[arg(allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

impl Cli {
    /// The trailing arguments re-joined into a command line with shell quoting.
    pub fn command_string(&self) -> String {
        shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| self.args.join(" "))
    }
}
