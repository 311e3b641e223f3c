// src/cli/builtins.rs

use crate::core::manifest::HandlerTable;
use crate::models::{Action, CommandHandler, PassThrough, handler_fn};
use crate::state::State;
use colored::Colorize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

// --- Built-in Handler Definition and Registry ---

/// A handler manifests can name without any Rust code of their own.
struct BuiltinDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    build: fn() -> Arc<dyn CommandHandler>,
}

/// Every built-in handler. To add one, add an entry here.
static BUILTIN_REGISTRY: &[BuiltinDefinition] = &[
    BuiltinDefinition {
        name: "next",
        aliases: &["pass"],
        build: next_handler,
    },
    BuiltinDefinition {
        name: "end",
        aliases: &["stop"],
        build: end_handler,
    },
    BuiltinDefinition {
        name: "print",
        aliases: &["echo"],
        build: print_handler,
    },
];

/// The handler table the binary resolves manifest `handler` names with.
pub fn builtin_handlers() -> HandlerTable {
    let mut table = HandlerTable::new();
    for def in BUILTIN_REGISTRY {
        let handler = (def.build)();
        for name in std::iter::once(&def.name).chain(def.aliases) {
            table.insert(*name, handler.clone());
        }
    }
    table
}

/// Forwards the data to the next command.
fn next_handler() -> Arc<dyn CommandHandler> {
    Arc::new(PassThrough)
}

/// Finishes the chain with the current data.
fn end_handler() -> Arc<dyn CommandHandler> {
    handler_fn(|state: State| async move { Ok(Action::End(state.data())) })
}

/// Prints what the command sees, then continues.
fn print_handler() -> Arc<dyn CommandHandler> {
    handler_fn(|state: State| async move {
        let name = state
            .command()
            .map(|c| c.command_name.clone())
            .unwrap_or_default();
        let options: BTreeMap<String, serde_json::Value> = state
            .options()
            .values()
            .into_iter()
            .map(|(key, value)| (key, value.to_json()))
            .collect();
        let report = json!({
            "data": state.data(),
            "params": state.params(),
            "options": options,
        });
        println!("{}", format!("[{}]", name).cyan().bold());
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(Action::Next(state.data()))
    })
}
