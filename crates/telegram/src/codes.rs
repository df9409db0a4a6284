//! EAN code parsing and the per-user staged code store.

use std::{collections::HashMap, sync::RwLock};

use {rand::seq::IndexedRandom, tracing::debug};

/// A code is valid iff it is 12 or 13 ASCII digits.
pub fn is_valid_code(code: &str) -> bool {
    matches!(code.len(), 12 | 13) && code.bytes().all(|b| b.is_ascii_digit())
}

/// Extract valid codes from free text.
///
/// Commas, newlines and any whitespace separate tokens. Order and
/// duplicates are preserved; invalid tokens are dropped.
pub fn parse_codes(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| {
            let valid = is_valid_code(token);
            if !valid {
                debug!(token, "discarding invalid code token");
            }
            valid
        })
        .map(String::from)
        .collect()
}

/// Staged codes per user.
#[derive(Default)]
pub struct CodeStore {
    codes: RwLock<HashMap<i64, Vec<String>>>,
}

impl CodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the user's staged list wholesale.
    pub fn replace(&self, user_id: i64, codes: Vec<String>) {
        let mut map = self.codes.write().unwrap_or_else(|e| e.into_inner());
        map.insert(user_id, codes);
    }

    pub fn get(&self, user_id: i64) -> Vec<String> {
        let map = self.codes.read().unwrap_or_else(|e| e.into_inner());
        map.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn clear(&self, user_id: i64) {
        let mut map = self.codes.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&user_id);
    }

    /// Pick one staged code uniformly at random.
    pub fn pick_random(&self, user_id: i64) -> Option<String> {
        let map = self.codes.read().unwrap_or_else(|e| e.into_inner());
        map.get(&user_id)
            .and_then(|codes| codes.choose(&mut rand::rng()))
            .cloned()
    }
}
