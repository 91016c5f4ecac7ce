//! Error types for pairbridge.

use std::time::Duration;

use crate::telegram::ChatId;

/// Configuration errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to parse configuration: {0}")]
    ParseError(String),
}

/// Errors from the pairs file.
#[derive(Debug, thiserror::Error)]
pub enum PairingStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chat {0} cannot be paired with itself")]
    SelfPairing(ChatId),

    #[error("pairs file task failed: {0}")]
    Task(String),
}

/// Failure to deliver something through the messaging platform.
///
/// Every platform-specific failure collapses into one of these; callers
/// treat all of them as "delivery failed".
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid Bot API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL embeds the bot token.
        Self::Http(e.without_url())
    }
}

/// Webhook server startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),
}
