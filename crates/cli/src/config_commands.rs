use std::path::Path;

use {
    anyhow::Result,
    eanbot_config::{BotConfig, ConfigStore, FileConfigStore},
    secrecy::ExposeSecret,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(path: Option<&Path>) -> Result<()> {
    let store = match path {
        Some(path) => FileConfigStore::new(path),
        None => FileConfigStore::discover(),
    };
    eprintln!("Checking {}\n", store.path().display());
    if !store.path().exists() {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} file not found, defaults apply");
    }

    let config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  {BOLD}{RED}error{RESET} {e}");
            std::process::exit(1);
        },
    };

    let warnings = warnings(&config);
    for w in &warnings {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} {w}");
    }

    eprintln!("admin_ids: {:?}", config.admin_ids);
    eprintln!("log_level: {}", config.log_level);
    if warnings.is_empty() {
        eprintln!("\nNo issues found.");
    } else {
        eprintln!("\n{} warning(s)", warnings.len());
    }
    Ok(())
}

fn warnings(config: &BotConfig) -> Vec<String> {
    let mut out = Vec::new();
    if config.token.expose_secret().is_empty() {
        out.push("token is empty (set it here or via EANBOT_TOKEN)".to_string());
    }
    if config.admin_ids.is_empty() {
        out.push("admin_ids is empty, private chats will be denied".to_string());
    }
    for id in config.admin_ids.iter().filter(|id| **id <= 0) {
        out.push(format!("admin id {id} is not a user id"));
    }
    out
}
