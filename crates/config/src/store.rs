use std::path::{Path, PathBuf};

use {
    toml_edit::{Array, DocumentMut, value},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    loader::{find_or_default_config_path, load_config},
    schema::BotConfig,
};

/// Source of the bot configuration and sink for admin list changes.
pub trait ConfigStore: Send + Sync {
    /// Read the current configuration.
    fn load(&self) -> Result<BotConfig>;

    /// Write the admin list back so it survives a restart.
    fn persist_admins(&self, admin_ids: &[i64]) -> Result<()>;
}

/// TOML file backed config store.
///
/// Admin updates rewrite only the `admin_ids` key, so comments, key order
/// and `${ENV}` placeholders in the file survive.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the first config file found in the standard locations.
    pub fn discover() -> Self {
        Self::new(find_or_default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<BotConfig> {
        if !self.path.exists() {
            warn!(
                path = %self.path.display(),
                "config file not found, using defaults"
            );
            return Ok(BotConfig::default());
        }
        let config = load_config(&self.path)?;
        info!(
            path = %self.path.display(),
            admin_ids = ?config.admin_ids,
            log_level = %config.log_level,
            "config loaded"
        );
        Ok(config)
    }

    fn persist_admins(&self, admin_ids: &[i64]) -> Result<()> {
        let raw = if self.path.exists() {
            std::fs::read_to_string(&self.path).map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = raw.parse()?;
        let mut ids = Array::new();
        for id in admin_ids {
            ids.push(*id);
        }
        doc["admin_ids"] = value(ids);

        let tmp = self.path.with_extension("toml.tmp");
        let write_err = |source| Error::Write {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp, doc.to_string()).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        info!(path = %self.path.display(), ?admin_ids, "admin list saved");
        Ok(())
    }
}
