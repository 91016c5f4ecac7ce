//! Outbound boundary to the messaging platform.
//!
//! [`Messenger`] is the seam the relay talks through; [`Outbox`] wraps it
//! with the per-call timeout and delivery bookkeeping every caller needs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::error::DeliveryError;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::telegram::ChatId;

/// How the platform should render outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// Send/copy primitives of the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Duplicate a message into `to` without forwarded-from attribution.
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), DeliveryError>;

    /// Send a text message to `to`.
    async fn send_message(
        &self,
        to: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), DeliveryError>;
}

/// A best-effort message to a chat other than the one being answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: ChatId,
    pub text: String,
    pub format: TextFormat,
}

impl Notice {
    pub fn html(to: ChatId, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
            format: TextFormat::Html,
        }
    }

    pub fn plain(to: ChatId, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
            format: TextFormat::Plain,
        }
    }
}

/// Time-bounded, observed access to a [`Messenger`].
///
/// A slow platform call never holds the webhook response longer than
/// `timeout`; a timeout is reported like any other delivery failure.
#[derive(Clone)]
pub struct Outbox {
    messenger: Arc<dyn Messenger>,
    timeout: Duration,
    observer: Arc<dyn Observer>,
}

impl Outbox {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        timeout: Duration,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            messenger,
            timeout,
            observer,
        }
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    /// Copy `message_id` from `from` into `to`.
    pub async fn copy(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), DeliveryError> {
        self.timed(to, self.messenger.copy_message(to, from, message_id))
            .await
    }

    /// Send `text` to `to`.
    pub async fn send(
        &self,
        to: ChatId,
        text: &str,
        format: TextFormat,
    ) -> Result<(), DeliveryError> {
        self.timed(to, self.messenger.send_message(to, text, format))
            .await
    }

    /// Send a reply to the chat that issued a command. Failures are logged.
    pub async fn reply(&self, to: ChatId, text: &str, format: TextFormat) {
        if let Err(e) = self.send(to, text, format).await {
            tracing::warn!(chat_id = to, error = %e, "Failed to send command reply");
        }
    }

    /// Deliver best-effort notices concurrently. Failures are logged and
    /// dropped; the whole batch takes at most one `timeout`.
    pub async fn notify(&self, notices: Vec<Notice>) {
        let mut tasks = JoinSet::new();
        for notice in notices {
            let outbox = self.clone();
            tasks.spawn(async move {
                if let Err(e) = outbox.send(notice.to, &notice.text, notice.format).await {
                    tracing::debug!(chat_id = notice.to, error = %e, "Notification not delivered");
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Notification task failed: {}", e);
            }
        }
    }

    /// Send a reply and its notices side by side.
    pub async fn reply_with_notices(
        &self,
        to: ChatId,
        text: &str,
        format: TextFormat,
        notices: Vec<Notice>,
    ) {
        tokio::join!(self.reply(to, text, format), self.notify(notices));
    }

    async fn timed<F>(&self, to: ChatId, call: F) -> Result<(), DeliveryError>
    where
        F: Future<Output = Result<(), DeliveryError>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        };
        self.observer
            .record_metric(&ObserverMetric::DeliveryLatency(started.elapsed()));
        if let Err(ref e) = result {
            self.observer.record_event(&ObserverEvent::DeliveryFailed {
                to,
                reason: e.to_string(),
            });
        }
        result
    }
}
