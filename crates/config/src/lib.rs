//! Configuration loading, env substitution, and admin list persistence.
//!
//! Config file: `eanbot.toml`, looked up from an explicit path, then `./`,
//! then `~/.config/eanbot/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod store;

pub use {
    error::{Error, Result},
    loader::{config_dir, find_or_default_config_path, load_config, parse_config},
    schema::{BotConfig, LogLevel},
    store::{ConfigStore, FileConfigStore},
};
