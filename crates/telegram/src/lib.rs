//! Telegram front end for the EAN barcode bot.
//!
//! Receives updates via teloxide long polling, gates private chats on the
//! admin list, and drives the `/codes` → text → `/gen` conversation.

pub mod access;
pub mod admins;
pub mod bot;
pub mod codes;
pub mod commands;
pub mod conversation;
pub mod error;
pub mod format;
pub mod handlers;
pub mod outbound;
pub mod service;
pub mod update;

pub use {
    bot::start_polling,
    error::{Error, Result},
    outbound::{Outbound, SendOptions, TelegramOutbound},
    service::{BotService, LogLevelControl},
    update::{ChatType, InboundUpdate},
};
