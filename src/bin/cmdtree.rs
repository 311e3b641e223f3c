// src/bin/cmdtree.rs

use clap::Parser;
use cmdtree::cli::{Cli, dispatcher};
use colored::*;

/// The main entry point of the `cmdtree` binary.
/// Sets up logging, parses arguments, runs the command line and handles errors centrally.
#[tokio::main]
async fn main() {
    env_logger::init();

    match dispatcher::dispatch(Cli::parse()).await {
        Ok(Some(value)) if !value.is_null() => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        },
        Ok(_) => {}
        Err(e) => {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(if e.is_usage() { 2 } else { 1 });
        }
    }
}

