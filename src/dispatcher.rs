//! Inbound dispatcher: classify each webhook update and route it.

use std::sync::Arc;

use crate::messenger::Outbox;
use crate::observability::ObserverEvent;
use crate::pairing::{PairingCommand, PairingProtocol, PairingStore};
use crate::relay::{ForwardRelay, PairRelay, RelayOutcome};
use crate::telegram::{BotCommand, Message, Update};

/// Classification of one update.
#[derive(Debug)]
pub enum Inbound<'a> {
    /// A bot command sent by `message.chat`.
    Command {
        message: &'a Message,
        command: BotCommand,
    },
    /// An ordinary message, a candidate for relaying.
    Relayable(&'a Message),
    /// Nothing to do.
    Ignored(&'static str),
}

/// Sort an update into command / relayable / ignored.
pub fn classify(update: &Update) -> Inbound<'_> {
    let Some(message) = update.effective_message() else {
        return Inbound::Ignored("no_message");
    };
    match message.command() {
        Some(command) => Inbound::Command { message, command },
        None => Inbound::Relayable(message),
    }
}

enum Mode {
    Pair {
        protocol: PairingProtocol,
        relay: PairRelay,
    },
    Forward(ForwardRelay),
}

/// Routes classified updates to the active relay mode.
pub struct Dispatcher {
    mode: Mode,
    outbox: Outbox,
}

impl Dispatcher {
    /// Pairing relay backed by `store`.
    pub fn pair(store: Arc<PairingStore>, outbox: Outbox) -> Self {
        Self {
            mode: Mode::Pair {
                protocol: PairingProtocol::new(store.clone(), outbox.clone()),
                relay: PairRelay::new(store, outbox.clone()),
            },
            outbox,
        }
    }

    /// Forward-all relay.
    pub fn forward(relay: ForwardRelay, outbox: Outbox) -> Self {
        Self {
            mode: Mode::Forward(relay),
            outbox,
        }
    }

    /// Update types the platform should deliver for this mode.
    pub fn allowed_updates(&self) -> &'static [&'static str] {
        match self.mode {
            Mode::Pair { .. } => &["message", "edited_message"],
            Mode::Forward(_) => &[
                "message",
                "edited_message",
                "channel_post",
                "edited_channel_post",
            ],
        }
    }

    /// Handle one update. Never fails: every downstream problem is logged.
    pub async fn dispatch(&self, update: &Update) {
        let observer = self.outbox.observer();
        observer.record_event(&ObserverEvent::UpdateReceived {
            update_id: update.update_id,
        });

        match classify(update) {
            Inbound::Ignored(reason) => {
                tracing::debug!(update_id = update.update_id, reason, "Update ignored");
                observer.record_event(&ObserverEvent::UpdateIgnored { reason });
            }
            Inbound::Command { message, command } => {
                let chat = message.chat.id;
                let handled = match &self.mode {
                    Mode::Pair { protocol, .. } => match PairingCommand::from_bot_command(&command)
                    {
                        Some(cmd) => {
                            protocol.handle(chat, cmd).await;
                            true
                        }
                        None => false,
                    },
                    Mode::Forward(relay) => relay.handle_command(chat, &command).await,
                };
                if !handled {
                    tracing::debug!(
                        chat_id = chat,
                        command = %command.name,
                        "Unknown command ignored"
                    );
                    observer.record_event(&ObserverEvent::UpdateIgnored {
                        reason: "unknown_command",
                    });
                }
            }
            Inbound::Relayable(message) => {
                let outcome = match &self.mode {
                    Mode::Pair { relay, .. } => relay.relay(message).await,
                    Mode::Forward(relay) => relay.relay(message).await,
                };
                if let RelayOutcome::Skipped(reason) = outcome {
                    tracing::debug!(
                        chat_id = message.chat.id,
                        reason = reason.as_str(),
                        "Message not relayed"
                    );
                    observer.record_event(&ObserverEvent::UpdateIgnored {
                        reason: reason.as_str(),
                    });
                }
            }
        }
    }
}
