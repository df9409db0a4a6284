//! Transport-neutral view of an inbound Telegram update.

/// Kind of chat an update arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    /// One-to-one conversation with the bot.
    Dm,
    Group,
    Channel,
}

/// Which update stream the message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Message,
    EditedMessage,
}

/// The user who sent a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

/// An inbound message, already stripped of teloxide types.
#[derive(Debug, Clone)]
pub struct InboundUpdate {
    pub kind: UpdateKind,
    pub message_id: i32,
    pub chat_id: i64,
    pub chat_type: ChatType,
    /// Absent for channel posts and some service messages.
    pub sender: Option<Sender>,
    pub text: Option<String>,
}

impl InboundUpdate {
    /// A direct conversation is one where the sender id equals the chat id.
    pub fn is_direct(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| s.id == self.chat_id)
    }

    /// Conversation key for state lookups, if the update has a sender.
    pub fn conversation(&self) -> Option<ConversationKey> {
        self.sender.as_ref().map(|s| ConversationKey {
            user_id: s.id,
            chat_id: self.chat_id,
        })
    }
}

/// A (user, chat) pair; the same user holds independent state per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub user_id: i64,
    pub chat_id: i64,
}
