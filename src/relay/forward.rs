use crate::messenger::{Outbox, TextFormat};
use crate::observability::ObserverEvent;
use crate::relay::{RelayOutcome, SkipReason};
use crate::telegram::{BotCommand, ChatId, Message};

/// Copies every accepted message into one fixed target chat.
///
/// Stateless: the only inputs are the configured target and optional
/// source restriction.
#[derive(Clone)]
pub struct ForwardRelay {
    target: ChatId,
    source: Option<ChatId>,
    outbox: Outbox,
}

impl ForwardRelay {
    pub fn new(target: ChatId, source: Option<ChatId>, outbox: Outbox) -> Self {
        Self {
            target,
            source,
            outbox,
        }
    }

    pub async fn relay(&self, message: &Message) -> RelayOutcome {
        let from = message.chat.id;
        if self.source.is_some_and(|source| source != from) {
            return RelayOutcome::Skipped(SkipReason::SourceMismatch);
        }
        if from == self.target {
            return RelayOutcome::Skipped(SkipReason::TargetLoop);
        }

        let to = self.target;
        match self.outbox.copy(to, from, message.message_id).await {
            Ok(()) => {
                tracing::debug!(from, to, message_id = message.message_id, "Message forwarded");
                self.outbox
                    .observer()
                    .record_event(&ObserverEvent::MessageRelayed { from, to });
                RelayOutcome::Delivered { to }
            }
            Err(e) => {
                tracing::warn!(
                    from,
                    to,
                    message_id = message.message_id,
                    error = %e,
                    "Failed to forward message to target"
                );
                RelayOutcome::Failed { to }
            }
        }
    }

    /// Answer `/start`, `/help` and `/myid`. Returns false for anything else.
    pub async fn handle_command(&self, chat: ChatId, command: &BotCommand) -> bool {
        let text = match command.name.as_str() {
            "start" | "help" => format!(
                "👋 Hi! I forward messages to chat <code>{}</code>.\n\n\
                 Your ID: <code>{chat}</code>\n\
                 /myid - show your ID",
                self.target
            ),
            "myid" => format!("Your ID: <code>{chat}</code>"),
            _ => return false,
        };
        self.outbox.reply(chat, &text, TextFormat::Html).await;
        true
    }
}
