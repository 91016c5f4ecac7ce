//! Telegram Bot API types.
//!
//! Only the fields the relay reads are modelled; everything else in the
//! payload is ignored by serde. Message content stays opaque: the relay
//! copies messages by id and never inspects media.

use serde::{Deserialize, Serialize};

/// Identity of a chat on the platform.
pub type ChatId = i64;

/// Telegram Update object (webhook payload).
/// https://core.telegram.org/bots/api#update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,

    #[serde(default)]
    pub edited_message: Option<Message>,

    #[serde(default)]
    pub channel_post: Option<Message>,

    #[serde(default)]
    pub edited_channel_post: Option<Message>,
}

impl Update {
    /// The message this update carries, whatever kind of update it is.
    pub fn effective_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
    }
}

/// Telegram Message object.
/// https://core.telegram.org/bots/api#message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,

    /// Sender; empty for channel posts.
    #[serde(default)]
    pub from: Option<User>,

    pub chat: Chat,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub entities: Option<Vec<MessageEntity>>,
}

impl Message {
    /// True if the sender is an automated account (including this bot).
    pub fn is_from_bot(&self) -> bool {
        self.from.as_ref().is_some_and(|u| u.is_bot)
    }

    /// Parse the message as a bot command, if it is one.
    ///
    /// Mirrors the platform's notion of a command: a `bot_command` entity at
    /// offset 0. Messages without entities fall back to a leading `/`.
    pub fn command(&self) -> Option<BotCommand> {
        let text = self.text.as_deref()?;
        let starts_with_command = match &self.entities {
            Some(entities) if !entities.is_empty() => {
                entities[0].entity_type == "bot_command" && entities[0].offset == 0
            }
            _ => text.starts_with('/'),
        };
        if !starts_with_command {
            return None;
        }
        BotCommand::parse(text)
    }
}

/// Telegram User object.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub username: Option<String>,
}

/// Telegram Chat object.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,

    #[serde(rename = "type")]
    pub chat_type: ChatType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

/// Message entity (only `bot_command` matters here).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub entity_type: String,

    pub offset: i64,

    pub length: i64,
}

/// A `/command@bot arg1 arg2` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    /// Lowercased command name without the leading `/` or `@bot` suffix.
    pub name: String,
    pub args: Vec<String>,
}

impl BotCommand {
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }

    /// First argument, if any.
    pub fn arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    #[serde(default)]
    pub error_code: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,

    pub result: Option<T>,
}

/// Body of `setWebhook`.
#[derive(Debug, Serialize)]
pub struct SetWebhook<'a> {
    pub url: &'a str,
    pub secret_token: &'a str,
    pub allowed_updates: &'a [&'a str],
    pub drop_pending_updates: bool,
}
