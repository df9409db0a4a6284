//! Per-conversation state machine for multi-step input.
//!
//! State lives in memory only; a restart drops every in-flight session.

use std::{collections::HashMap, sync::Mutex};

use tracing::debug;

use crate::{
    codes::{CodeStore, parse_codes},
    update::ConversationKey,
};

/// Active multi-step operation in a conversation. Absence means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// `/codes` was issued; the next plain text is the code list.
    WaitingForCodes,
}

/// Result of feeding a text message to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeInput {
    /// No session in this conversation; the text is not ours.
    NotWaiting,
    /// A command arrived mid-session: the session is dropped without
    /// storing anything and the command should be handled normally.
    Interrupted,
    /// Nothing parseable; the session stays open for another try.
    Unparseable,
    /// Codes stored and the session closed.
    Stored(usize),
}

/// Conversation states keyed by (user, chat).
///
/// Every transition happens under a single lock, so a read-then-write on
/// one conversation can't interleave with another update for it.
#[derive(Default)]
pub struct Conversations {
    states: Mutex<HashMap<ConversationKey, ConversationState>>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, key: ConversationKey) -> Option<ConversationState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(&key).copied()
    }

    /// Start (or restart) a code staging session and drop the user's
    /// previously staged codes.
    pub fn begin_code_staging(&self, key: ConversationKey, store: &CodeStore) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let previous = states.insert(key, ConversationState::WaitingForCodes);
        store.clear(key.user_id);
        debug!(
            user_id = key.user_id,
            chat_id = key.chat_id,
            restarted = previous.is_some(),
            "waiting for codes"
        );
    }

    /// Route a text message through the state machine.
    pub fn submit_text(&self, key: ConversationKey, text: &str, store: &CodeStore) -> CodeInput {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if states.get(&key) != Some(&ConversationState::WaitingForCodes) {
            return CodeInput::NotWaiting;
        }

        if text.starts_with('/') {
            states.remove(&key);
            debug!(
                user_id = key.user_id,
                chat_id = key.chat_id,
                "code staging interrupted by command"
            );
            return CodeInput::Interrupted;
        }

        let codes = parse_codes(text);
        debug!(user_id = key.user_id, ?codes, "parsed codes");
        if codes.is_empty() {
            return CodeInput::Unparseable;
        }

        let count = codes.len();
        store.replace(key.user_id, codes);
        states.remove(&key);
        CodeInput::Stored(count)
    }

    /// Drop the conversation's state. Returns whether one was active.
    pub fn cancel(&self, key: ConversationKey) -> bool {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.remove(&key).is_some()
    }
}
