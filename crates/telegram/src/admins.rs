//! Runtime-mutable administrator registry with write-through persistence.

use std::sync::{Arc, Mutex, RwLock};

use {
    eanbot_config::ConfigStore,
    tracing::{error, info},
};

/// Why an admin list change was refused.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("user id must be a positive integer")]
    InvalidId,

    #[error("user {0} is already an administrator")]
    AlreadyAdmin(i64),

    #[error("user {0} is not an administrator")]
    NotAdmin(i64),

    #[error("administrators cannot remove themselves")]
    SelfRemoval,

    /// The change was not applied because it could not be saved.
    #[error("failed to save admin list: {0}")]
    Persist(#[source] eanbot_config::Error),
}

/// Ordered, duplicate-free set of administrator ids.
///
/// Changes are serialized by `changes` and written to the store before
/// they become visible, so readers never wait on disk I/O. The store is
/// synchronous: call `add` and `remove` off the async runtime.
pub struct AdminRegistry {
    ids: RwLock<Vec<i64>>,
    changes: Mutex<()>,
    store: Arc<dyn ConfigStore>,
}

impl AdminRegistry {
    pub fn new(ids: Vec<i64>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            ids: RwLock::new(dedup(ids)),
            changes: Mutex::new(()),
            store,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        let ids = self.ids.read().unwrap_or_else(|e| e.into_inner());
        ids.contains(&id)
    }

    pub fn ids(&self) -> Vec<i64> {
        let ids = self.ids.read().unwrap_or_else(|e| e.into_inner());
        ids.clone()
    }

    /// Swap in a freshly loaded list (config reload). Not persisted.
    pub fn replace(&self, ids: Vec<i64>) {
        let _changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        self.publish(dedup(ids));
    }

    /// Add an administrator and persist the new list.
    pub fn add(&self, id: i64) -> Result<(), AdminError> {
        if id <= 0 {
            return Err(AdminError::InvalidId);
        }
        let _changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = self.ids();
        if next.contains(&id) {
            return Err(AdminError::AlreadyAdmin(id));
        }

        next.push(id);
        self.persist(&next)?;
        info!(admin_id = id, admin_ids = ?next, "admin added");
        self.publish(next);
        Ok(())
    }

    /// Remove an administrator on behalf of `actor` and persist.
    pub fn remove(&self, actor: i64, id: i64) -> Result<(), AdminError> {
        if id == actor {
            return Err(AdminError::SelfRemoval);
        }
        let _changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = self.ids();
        let Some(pos) = next.iter().position(|&x| x == id) else {
            return Err(AdminError::NotAdmin(id));
        };

        next.remove(pos);
        self.persist(&next)?;
        info!(admin_id = id, removed_by = actor, admin_ids = ?next, "admin removed");
        self.publish(next);
        Ok(())
    }

    /// Write `next` to the store. On failure the in-memory list stays as it was.
    fn persist(&self, next: &[i64]) -> Result<(), AdminError> {
        self.store.persist_admins(next).map_err(|e| {
            error!(error = %e, "failed to persist admin list, keeping the previous one");
            AdminError::Persist(e)
        })
    }

    fn publish(&self, next: Vec<i64>) {
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        *ids = next;
    }
}

fn dedup(ids: Vec<i64>) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
