use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::BotConfig,
};

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "eanbot.toml";

/// Load config from the given TOML file, expanding `${ENV}` placeholders.
pub fn load_config(path: &Path) -> Result<BotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loading config");
    parse_config(&substitute_env(&raw))
}

/// Parse an already substituted TOML document.
pub fn parse_config(raw: &str) -> Result<BotConfig> {
    Ok(toml::from_str(raw)?)
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./eanbot.toml` (project-local)
/// 2. `~/.config/eanbot/eanbot.toml` (user-global)
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/eanbot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "eanbot").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default local path.
///
/// Admin list changes are written back to this path, so a missing file is
/// created next to the working directory rather than in the user config dir.
pub fn find_or_default_config_path() -> PathBuf {
    find_config_file().unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME))
}
