// src/core/resolver.rs

//! # Command Resolution
//!
//! Walks a [`CommandTree`] one token at a time. Each call resolves exactly one
//! link; [`resolve_next`] continues from where the previous link stopped.
//!
//! ## Match order
//! 1. A unit defined at `<dir>/<name>`.
//! 2. A directory `<dir>/<name>` without unit: an implicit pass-through that
//!    requires a subcommand.
//! 3. The first parameterized entry of `<dir>` in lexical order (`[id]` binds the
//!    token, `[...ids]` binds every remaining token).
//! 4. Otherwise the name is not found, with near-miss suggestions.

use crate::constants::SUGGESTION_MAX_DISTANCE;
use crate::core::arg_parser::{join_tokens, parse_command, strip_leading_options};
use crate::core::command_tree::CommandTree;
use crate::core::commons::suggest_similar;
use crate::core::parameters::{ParamSegment, Params, is_param_segment};
use crate::errors::{EngineError, UsageError};
use crate::models::{CommandUnit, PassThrough, ResolvedCommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves the first command of `command_string` inside `commands_dir`.
pub async fn resolve_command(
    tree: &dyn CommandTree,
    command_string: &str,
    commands_dir: &Path,
) -> Result<ResolvedCommand, EngineError> {
    let words = shlex::split(command_string)
        .ok_or_else(|| UsageError::Parse(format!("unbalanced quotes in '{}'", command_string)))?;
    let mut words = words.into_iter();
    let Some(name) = words.next() else {
        return Err(UsageError::CommandRequired.into());
    };
    let rest: Vec<String> = words.collect();

    if name.starts_with('-') {
        return Err(UsageError::Parse(format!(
            "expected a command name, found option '{}'",
            name
        ))
        .into());
    }
    if is_path_like(&name) {
        return Err(UsageError::InvalidCommandName(name).into());
    }
    if !tree.is_dir(commands_dir).await {
        return Err(UsageError::NotFound {
            name,
            dir: commands_dir.to_path_buf(),
            suggestions: Vec::new(),
        }
        .into());
    }

    let path = commands_dir.join(&name);

    // 1. Direct unit.
    if let Some(unit) = tree.load(&path).await? {
        log::trace!("Resolved '{}' to unit '{}'.", name, path.display());
        return normalize(unit, name, path, rest, Params::new());
    }

    // 2. Directory without unit.
    if tree.is_dir(&path).await {
        log::trace!("Resolved '{}' to directory '{}'.", name, path.display());
        return normalize(Arc::new(CommandUnit::pass_through()), name, path, rest, Params::new());
    }

    // 3. Parameterized entry.
    let entries = tree.read_dir(commands_dir).await?;
    let parameterized = entries
        .iter()
        .find_map(|entry| ParamSegment::parse(entry).map(|segment| (entry, segment)));

    if let Some((entry, segment)) = parameterized {
        let path = commands_dir.join(entry);
        let unit = load_trusted(tree, &path).await;

        // A spread binds every remaining command word; its options stay with the unit.
        let (bound, rest) = if segment.spread {
            let mut all = Vec::with_capacity(rest.len() + 1);
            all.push(name);
            all.extend(rest);
            let parsed = parse_command(&join_tokens(&all)?, &unit.options)?;
            (parsed.tokens, Vec::new())
        } else {
            (vec![name], rest)
        };
        let mut params = Params::new();
        if let Some(value) = segment.bind(&bound) {
            params.insert(segment.name.clone(), value);
        }

        log::trace!("Resolved parameter '{}' from '{}'.", segment.name, path.display());
        return normalize(unit, entry.clone(), path, rest, params);
    }

    // 4. Nothing matched.
    let suggestions = suggest_similar(
        &name,
        entries
            .iter()
            .map(String::as_str)
            .filter(|entry| !is_param_segment(entry)),
        SUGGESTION_MAX_DISTANCE,
    );
    Err(UsageError::NotFound {
        name,
        dir: commands_dir.to_path_buf(),
        suggestions,
    }
    .into())
}

/// Resolves the link following `previous`, if any input remains.
pub async fn resolve_next(
    tree: &dyn CommandTree,
    previous: &ResolvedCommand,
) -> Result<Option<ResolvedCommand>, EngineError> {
    if !previous.has_next {
        return Ok(None);
    }
    resolve_command(
        tree,
        &previous.remaining_command_string,
        &previous.subcommands_dir,
    )
    .await
    .map(Some)
}

fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains('\\') || name.starts_with('.')
}

/// Loads an entry that came from a directory listing. The entry is known to
/// exist, so a unit that fails to load still routes as a pass-through.
async fn load_trusted(tree: &dyn CommandTree, path: &Path) -> Arc<CommandUnit> {
    match tree.load(path).await {
        Ok(Some(unit)) => unit,
        Ok(None) => Arc::new(CommandUnit::pass_through()),
        Err(e) => {
            log::warn!("Treating '{}' as pass-through: {}", path.display(), e);
            Arc::new(CommandUnit::pass_through())
        }
    }
}

/// Drops the options in front of the next command word and applies the
/// non-middleware rule. Options after that word are left for the links that
/// declare them.
fn normalize(
    unit: Arc<CommandUnit>,
    command_name: String,
    path: PathBuf,
    rest: Vec<String>,
    params: Params,
) -> Result<ResolvedCommand, EngineError> {
    let rest = strip_leading_options(rest, &unit.options);
    let remaining_command_string = if rest.is_empty() {
        String::new()
    } else {
        join_tokens(&rest)?
    };
    let has_next = !remaining_command_string.is_empty();

    let command = if has_next && !unit.is_middleware {
        log::debug!("Skipping body of non-middleware command '{}'.", command_name);
        Arc::new(CommandUnit {
            handler: Arc::new(PassThrough),
            ..(*unit).clone()
        })
    } else {
        unit
    };

    Ok(ResolvedCommand {
        command,
        command_name,
        command_path: path.clone(),
        params,
        remaining_command_string,
        subcommands_dir: path,
        has_next,
    })
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command_tree::MemoryCommandTree;
    use crate::core::manifest::{FsCommandTree, HandlerTable};
    use crate::core::options::{OptionConfig, OptionSchema};
    use crate::core::parameters::ParamValue;
    use crate::models::CommandHandler;

    fn unit() -> CommandUnit {
        CommandUnit::new(Arc::new(PassThrough))
    }

    async fn resolve_all(tree: &dyn CommandTree, line: &str) -> Vec<ResolvedCommand> {
        let mut chain = vec![resolve_command(tree, line, Path::new("cmds")).await.unwrap()];
        while let Some(next) = resolve_next(tree, chain.last().unwrap()).await.unwrap() {
            chain.push(next);
        }
        chain
    }

    #[tokio::test]
    async fn test_three_level_chain() {
        let tree = MemoryCommandTree::new()
            .with("cmds/a", unit())
            .with("cmds/a/b", unit())
            .with("cmds/a/b/c", unit());
        let chain = resolve_all(&tree, "a b c").await;

        assert_eq!(chain.len(), 3);
        let remaining: Vec<&str> = chain
            .iter()
            .map(|c| c.remaining_command_string.as_str())
            .collect();
        assert_eq!(remaining, vec!["b c", "c", ""]);
        assert_eq!(chain[2].command_path, PathBuf::from("cmds/a/b/c"));
        assert!(!chain[2].has_next);
    }

    #[tokio::test]
    async fn test_single_parameter() {
        let tree = MemoryCommandTree::new().with("cmds/[id]", unit());
        let resolved = resolve_command(&tree, "42", Path::new("cmds")).await.unwrap();
        assert_eq!(resolved.params["id"], ParamValue::Single("42".into()));
        assert_eq!(resolved.command_name, "[id]");
        assert!(!resolved.has_next);
    }

    #[tokio::test]
    async fn test_spread_parameter_consumes_everything() {
        let tree = MemoryCommandTree::new().with("cmds/[...ids]", unit());
        let resolved = resolve_command(&tree, "1 2 3", Path::new("cmds")).await.unwrap();
        assert_eq!(
            resolved.params["ids"],
            ParamValue::Spread(vec!["1".into(), "2".into(), "3".into()])
        );
        assert_eq!(resolved.remaining_command_string, "");
    }

    #[tokio::test]
    async fn test_direct_match_beats_parameter() {
        let tree = MemoryCommandTree::new()
            .with("cmds/list", unit().description("list"))
            .with("cmds/[id]", unit());
        let resolved = resolve_command(&tree, "list", Path::new("cmds")).await.unwrap();
        assert_eq!(resolved.command.description.as_deref(), Some("list"));
        assert!(resolved.params.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_parameters_pick_lexical_first() {
        let tree = MemoryCommandTree::new()
            .with("cmds/[slug]", unit())
            .with("cmds/[id]", unit());
        let resolved = resolve_command(&tree, "x", Path::new("cmds")).await.unwrap();
        assert!(resolved.params.contains_key("id"));
    }

    #[tokio::test]
    async fn test_directory_without_unit_is_pass_through() {
        let tree = MemoryCommandTree::new().with("cmds/db/migrate", unit());
        let chain = resolve_all(&tree, "db migrate").await;
        assert_eq!(chain.len(), 2);
        assert!(chain[0].command.requires_subcommand);
        assert_eq!(chain[0].subcommands_dir, PathBuf::from("cmds/db"));
    }

    #[tokio::test]
    async fn test_options_are_stripped_from_remainder() {
        let options = OptionSchema::new()
            .with("env", OptionConfig::string())
            .unwrap();
        let tree = MemoryCommandTree::new()
            .with("cmds/deploy", unit().options(options))
            .with("cmds/deploy/web", unit());
        let resolved = resolve_command(&tree, "deploy --env prod web", Path::new("cmds"))
            .await
            .unwrap();
        assert_eq!(resolved.remaining_command_string, "web");
        assert!(resolved.has_next);
    }

    #[tokio::test]
    async fn test_subcommand_option_value_stays_with_subcommand() {
        let web_options = OptionSchema::new()
            .with("env", OptionConfig::string())
            .unwrap();
        let tree = MemoryCommandTree::new()
            .with("cmds/deploy", unit())
            .with("cmds/deploy/web", unit().options(web_options));

        let chain = resolve_all(&tree, "deploy web --env prod").await;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].remaining_command_string, "web --env prod");
        assert_eq!(chain[1].command_name, "web");
        assert_eq!(chain[1].remaining_command_string, "");
        assert!(!chain[1].has_next);
    }

    #[tokio::test]
    async fn test_options_between_command_words() {
        let deploy_options = OptionSchema::new()
            .with("region", OptionConfig::string())
            .unwrap();
        let web_options = OptionSchema::new()
            .with("env", OptionConfig::string())
            .unwrap();
        let tree = MemoryCommandTree::new()
            .with("cmds/deploy", unit().options(deploy_options))
            .with("cmds/deploy/web", unit().options(web_options))
            .with("cmds/deploy/web/now", unit());

        let chain = resolve_all(&tree, "deploy --region eu web --env prod now").await;
        let names: Vec<&str> = chain.iter().map(|c| c.command_name.as_str()).collect();
        assert_eq!(names, vec!["deploy", "web", "now"]);
        assert_eq!(chain[0].remaining_command_string, "web --env prod now");
        assert_eq!(chain[1].remaining_command_string, "now");
    }

    #[tokio::test]
    async fn test_spread_parameter_leaves_its_option_values_out() {
        let options = OptionSchema::new()
            .with("format", OptionConfig::string())
            .unwrap();
        let tree = MemoryCommandTree::new()
            .with("cmds/users/index", unit())
            .with("cmds/users/[...ids]", unit().options(options));

        let chain = resolve_all(&tree, "users 1 2 --format json").await;
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain[1].params["ids"],
            ParamValue::Spread(vec!["1".into(), "2".into()])
        );
        assert!(!chain[1].has_next);
    }

    #[tokio::test]
    async fn test_non_middleware_with_subcommand_becomes_pass_through() {
        let body: Arc<dyn CommandHandler> = Arc::new(PassThrough);
        let mut foo = unit().middleware(false);
        foo.handler = body.clone();
        let tree = MemoryCommandTree::new()
            .with("cmds/foo", foo)
            .with("cmds/foo/bar", unit());

        let with_sub = resolve_command(&tree, "foo bar", Path::new("cmds")).await.unwrap();
        assert!(!Arc::ptr_eq(&with_sub.command.handler, &body));

        let alone = resolve_command(&tree, "foo", Path::new("cmds")).await.unwrap();
        assert!(Arc::ptr_eq(&alone.command.handler, &body));
    }

    #[tokio::test]
    async fn test_rejected_inputs() {
        let tree = MemoryCommandTree::new().with("cmds/build", unit());
        let dir = Path::new("cmds");

        let err = resolve_command(&tree, "", dir).await.unwrap_err();
        assert!(matches!(err, EngineError::Usage(UsageError::CommandRequired)));

        let err = resolve_command(&tree, "--help", dir).await.unwrap_err();
        assert!(matches!(err, EngineError::Usage(UsageError::Parse(_))));

        let err = resolve_command(&tree, "../etc", dir).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Usage(UsageError::InvalidCommandName(_))
        ));

        let err = resolve_command(&tree, "build", Path::new("nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Usage(UsageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_not_found_suggests_near_misses() {
        let tree = MemoryCommandTree::new()
            .with("cmds/build", unit())
            .with("cmds/status", unit());
        let err = resolve_command(&tree, "buidl", Path::new("cmds")).await.unwrap_err();
        match err {
            EngineError::Usage(UsageError::NotFound { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["build"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_broken_parameter_unit_still_routes() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("[name].toml"), "is_middleware = ").unwrap();
        let tree = FsCommandTree::new(HandlerTable::new());

        let resolved = resolve_command(&tree, "alice", dir.path()).await.unwrap();
        assert_eq!(resolved.params["name"], ParamValue::Single("alice".into()));
        assert!(resolved.command.requires_subcommand);
    }
}
