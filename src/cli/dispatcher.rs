// src/cli/dispatcher.rs

use crate::cli::Cli;
use crate::cli::builtins::builtin_handlers;
use crate::cli::config::EngineConfig;
use crate::core::context::{RunOptions, run};
use crate::core::manifest::FsCommandTree;
use crate::errors::EngineError;
use crate::system::prompt::{NonInteractivePrompter, Prompter, TerminalPrompter};
use serde_json::Value;
use std::sync::Arc;

/// Runs the binary's command line.
///
/// Configuration precedence for the commands directory: `--commands-dir` (or its
/// environment variable), then the configuration file, then `commands`.
pub async fn dispatch(cli: Cli) -> Result<Option<Value>, EngineError> {
    log::debug!("CLI args parsed: {:?}", cli);
    let config = EngineConfig::load(cli.config.as_deref())?;
    let options = run_options(&cli, config)?;
    run(options).await
}

/// Builds the engine inputs from the parsed arguments and the loaded configuration.
pub fn run_options(cli: &Cli, config: EngineConfig) -> Result<RunOptions, EngineError> {
    let initial_data = match &cli.data {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("--data is not valid JSON: {}", e)))?,
        None => Value::Null,
    };
    let prompter: Arc<dyn Prompter> = if config.prompt && !cli.no_prompt {
        Arc::new(TerminalPrompter)
    } else {
        Arc::new(NonInteractivePrompter)
    };

    let mut options = RunOptions::new(Arc::new(FsCommandTree::new(builtin_handlers())));
    options.command_string = Some(cli.command_string());
    options.commands_dir = cli.commands_dir.clone().unwrap_or(config.commands_dir);
    options.default_command = config.default_command;
    options.initial_data = initial_data;
    options.prompter = prompter;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn cli(dir: &TempDir, args: &[&str]) -> Cli {
        let root = dir.path().to_string_lossy().into_owned();
        let mut argv = vec!["cmdtree", "--no-prompt", "--commands-dir", root.as_str()];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[tokio::test]
    async fn test_manifest_tree_end_to_end() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users/index.toml", "requires_subcommand = true");
        write(
            dir.path(),
            "users/[id].toml",
            r#"
            handler = "end"
            [options.format]
            type = "string"
            choices = ["json", "text"]
            "#,
        );

        let cli = cli(&dir, &["--data", r#"{"n": 1}"#, "users", "42", "--format=json"]);
        let options = run_options(&cli, EngineConfig::default()).unwrap();
        assert_eq!(options.initial_data, json!({ "n": 1 }));

        let result = run(options).await.unwrap();
        assert_eq!(result, Some(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn test_default_command_from_config() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "help.toml", r#"handler = "next""#);
        let config = EngineConfig {
            default_command: Some("help".to_string()),
            ..EngineConfig::default()
        };
        let options = run_options(&cli(&dir, &[]), config).unwrap();
        assert_eq!(run(options).await.unwrap(), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_usage_errors_surface() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users/index.toml", "requires_subcommand = true");
        write(
            dir.path(),
            "users/[id].toml",
            r#"
            [options.format]
            choices = ["json", "text"]
            "#,
        );

        let options = run_options(&cli(&dir, &["users"]), EngineConfig::default()).unwrap();
        assert!(run(options).await.unwrap_err().is_usage());

        let options = run_options(
            &cli(&dir, &["users", "1", "--format=xml"]),
            EngineConfig::default(),
        )
        .unwrap();
        let err = run(options).await.unwrap_err();
        assert!(err.as_options_error().is_some());
    }

    #[test]
    fn test_invalid_data_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = run_options(&cli(&dir, &["--data", "{nope", "x"]), EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
