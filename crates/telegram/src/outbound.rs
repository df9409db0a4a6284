use {
    async_trait::async_trait,
    teloxide::{
        payloads::{SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{ChatId, InputFile, MessageId, ParseMode, ReplyParameters},
    },
    tracing::debug,
};

use crate::{
    error::Result,
    format::{CHUNK_BUDGET, TELEGRAM_MAX_MESSAGE_LEN, chunk_lines},
};

/// Formatting and threading options for an outbound message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Parse the text as Telegram HTML.
    pub html: bool,
    /// Message id to reply to.
    pub reply_to: Option<i32>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Outbound side of the messaging transport.
///
/// Failures are returned once; callers decide whether to retry.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, opts: SendOptions) -> Result<()>;

    async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        caption: &str,
        opts: SendOptions,
    ) -> Result<()>;
}

/// Outbound message sender for Telegram.
pub struct TelegramOutbound {
    pub(crate) bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn reply_params(opts: SendOptions) -> Option<ReplyParameters> {
    opts.reply_to.map(|id| ReplyParameters::new(MessageId(id)))
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send_text(&self, chat_id: i64, text: &str, opts: SendOptions) -> Result<()> {
        let chunks = if text.len() > TELEGRAM_MAX_MESSAGE_LEN {
            chunk_lines(text, CHUNK_BUDGET)
        } else {
            vec![text.to_string()]
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let mut req = self.bot.send_message(ChatId(chat_id), chunk);
            if opts.html {
                req = req.parse_mode(ParseMode::Html);
            }
            // Only the first part threads onto the original message.
            if i == 0
                && let Some(rp) = reply_params(opts)
            {
                req = req.reply_parameters(rp);
            }
            req.await?;
        }
        debug!(chat_id, parts = chunks.len(), "sent text");
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        caption: &str,
        opts: SendOptions,
    ) -> Result<()> {
        let size = png.len();
        let photo = InputFile::memory(png).file_name("barcode.png");
        let mut req = self
            .bot
            .send_photo(ChatId(chat_id), photo)
            .caption(caption);
        if opts.html {
            req = req.parse_mode(ParseMode::Html);
        }
        if let Some(rp) = reply_params(opts) {
            req = req.reply_parameters(rp);
        }
        req.await?;
        debug!(chat_id, size, "sent photo");
        Ok(())
    }
}
