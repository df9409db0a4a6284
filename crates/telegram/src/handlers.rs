use {
    teloxide::types::{ChatKind, MediaKind, Message, MessageKind, PublicChatKind},
    tracing::warn,
};

use crate::{
    outbound::Outbound,
    service::BotService,
    update::{ChatType, InboundUpdate, Sender, UpdateKind},
};

/// Handle a single inbound Telegram message (called from the polling loop).
///
/// Every message reaches the service, text or not, so the access gate
/// sees it. Handler errors are logged here so one failing update never
/// stops the loop.
pub async fn handle_message_direct(
    msg: Message,
    kind: UpdateKind,
    service: &BotService,
    outbound: &dyn Outbound,
) {
    let update = inbound_from_message(&msg, kind);
    let chat_id = update.chat_id;
    if let Err(e) = service.handle_update(update, outbound).await {
        warn!(chat_id, error = %e, "failed to handle update");
    }
}

/// Convert a teloxide message into an [`InboundUpdate`].
///
/// Messages without text (stickers, media without caption, service
/// messages) keep `text` empty.
pub fn inbound_from_message(msg: &Message, kind: UpdateKind) -> InboundUpdate {
    let sender = msg.from.as_ref().map(|u| Sender {
        id: u.id.0 as i64,
        username: u.username.clone(),
        full_name: u.full_name(),
    });
    InboundUpdate {
        kind,
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        chat_type: classify_chat(msg),
        sender,
        text: extract_text(msg),
    }
}

/// Extract text content from a message; captions count as text.
fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.clone()),
            MediaKind::Photo(p) => p.caption.clone(),
            MediaKind::Document(d) => d.caption.clone(),
            _ => None,
        },
        _ => None,
    }
}

fn classify_chat(msg: &Message) -> ChatType {
    match msg.chat.kind {
        ChatKind::Private(_) => ChatType::Dm,
        ChatKind::Public(ref p) => match p.kind {
            PublicChatKind::Channel(_) => ChatType::Channel,
            _ => ChatType::Group,
        },
    }
}
