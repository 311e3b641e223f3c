// src/constants.rs

/// Extension of on-disk command unit manifests.
pub const MANIFEST_EXTENSION: &str = "toml";

/// Name of the unit that defines a directory itself. Never listed as a subcommand.
pub const INDEX_UNIT_NAME: &str = "index";

/// Engine configuration file looked up in the working directory.
pub const PROJECT_CONFIG_FILENAME: &str = "cmdtree.toml";

/// Directory under the system config dir holding the global configuration.
pub const GLOBAL_CONFIG_DIRNAME: &str = "cmdtree";

/// File name of the global configuration (inside `GLOBAL_CONFIG_DIRNAME`).
pub const GLOBAL_CONFIG_FILENAME: &str = "config.toml";

/// Commands directory used when nothing else configures one.
pub const DEFAULT_COMMANDS_DIR: &str = "commands";

/// Environment override for the commands directory.
pub const COMMANDS_DIR_ENV: &str = "CMDTREE_COMMANDS_DIR";

/// Maximum edit distance for "did you mean" suggestions.
pub const SUGGESTION_MAX_DISTANCE: usize = 2;
