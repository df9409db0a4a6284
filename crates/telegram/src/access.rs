use std::{collections::BTreeMap, sync::Mutex};

use tracing::warn;

use crate::{admins::AdminRegistry, update::InboundUpdate};

/// A non-admin who messaged the bot privately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedAttempt {
    pub username: Option<String>,
    pub full_name: String,
    pub attempts: u64,
    pub chat_id: i64,
}

/// Reason an inbound update was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    NotAdmin,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAdmin => write!(f, "sender is not an administrator"),
        }
    }
}

/// Gate evaluated before any command or conversation logic.
///
/// Only private chats are gated: in a direct conversation the sender must
/// be an admin. Group and channel updates always pass. Denials are silent
/// towards the sender and recorded here for `/unauthorized`.
#[derive(Default)]
pub struct AccessControl {
    attempts: Mutex<BTreeMap<String, UnauthorizedAttempt>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or deny an update. Returns `Ok(())` if it may be processed.
    pub fn check(&self, update: &InboundUpdate, admins: &AdminRegistry) -> Result<(), AccessDenied> {
        let Some(sender) = update.sender.as_ref() else {
            return Ok(());
        };
        if !update.is_direct() || admins.contains(sender.id) {
            return Ok(());
        }

        let attempts = {
            let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
            let entry = map
                .entry(sender.id.to_string())
                .or_insert_with(|| UnauthorizedAttempt {
                    username: None,
                    full_name: String::new(),
                    attempts: 0,
                    chat_id: update.chat_id,
                });
            entry.username = sender.username.clone();
            entry.full_name = sender.full_name.clone();
            entry.chat_id = update.chat_id;
            entry.attempts += 1;
            entry.attempts
        };

        warn!(
            user_id = sender.id,
            chat_id = update.chat_id,
            chat_type = ?update.chat_type,
            username = ?sender.username,
            attempts,
            "unauthorized access attempt"
        );
        Err(AccessDenied::NotAdmin)
    }

    /// Snapshot of recorded attempts, ordered by user id string.
    pub fn attempts(&self) -> Vec<(String, UnauthorizedAttempt)> {
        let map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Forget all recorded attempts. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let count = map.len();
        map.clear();
        count
    }
}
