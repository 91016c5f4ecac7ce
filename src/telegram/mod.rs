//! Telegram Bot API surface used by the relay.

mod client;
mod types;

pub use client::{DEFAULT_API_URL, TelegramClient};
pub use types::{
    ApiResponse, BotCommand, Chat, ChatId, ChatType, Message, MessageEntity, SetWebhook, Update,
    User,
};
