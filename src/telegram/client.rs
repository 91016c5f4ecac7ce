//! Minimal Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::error::DeliveryError;
use crate::messenger::{Messenger, TextFormat};
use crate::telegram::types::{ApiResponse, ChatId, SetWebhook, User};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API client. Cheap to share behind an `Arc`.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: SecretString,
}

impl TelegramClient {
    /// Create a client. `timeout` bounds every HTTP call.
    pub fn new(
        api_url: &str,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url,
            self.token.expose_secret(),
            method
        )
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        payload: &P,
    ) -> Result<R, DeliveryError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiResponse<R>>(&body) {
            Ok(api) if api.ok => api
                .result
                .ok_or_else(|| DeliveryError::InvalidResponse(format!("{method}: missing result"))),
            Ok(api) => Err(DeliveryError::Api {
                code: api.error_code.unwrap_or(i64::from(status.as_u16())),
                description: api.description.unwrap_or_else(|| "unknown".to_string()),
            }),
            Err(_) if !status.is_success() => Err(DeliveryError::Api {
                code: i64::from(status.as_u16()),
                description: body,
            }),
            Err(e) => Err(DeliveryError::InvalidResponse(format!("{method}: {e}"))),
        }
    }

    /// Identity of the bot behind the token.
    pub async fn get_me(&self) -> Result<User, DeliveryError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Point the platform's webhook at this process.
    pub async fn set_webhook(&self, request: &SetWebhook<'_>) -> Result<(), DeliveryError> {
        let _: IgnoredAny = self.call("setWebhook", request).await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "chat_id": to,
            "from_chat_id": from,
            "message_id": message_id,
            "protect_content": false,
        });
        let _: IgnoredAny = self.call("copyMessage", &payload).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        to: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), DeliveryError> {
        let mut payload = serde_json::json!({
            "chat_id": to,
            "text": text,
        });
        if format == TextFormat::Html {
            payload["parse_mode"] = serde_json::Value::String("HTML".to_string());
        }
        let _: IgnoredAny = self.call("sendMessage", &payload).await?;
        Ok(())
    }
}
