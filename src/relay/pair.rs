use std::sync::Arc;

use crate::messenger::Outbox;
use crate::observability::ObserverEvent;
use crate::pairing::PairingStore;
use crate::relay::{RelayOutcome, SkipReason};
use crate::telegram::{ChatType, Message};

/// Copies private messages to the sender's partner.
#[derive(Clone)]
pub struct PairRelay {
    store: Arc<PairingStore>,
    outbox: Outbox,
}

impl PairRelay {
    pub fn new(store: Arc<PairingStore>, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    pub async fn relay(&self, message: &Message) -> RelayOutcome {
        if message.chat.chat_type != ChatType::Private {
            return RelayOutcome::Skipped(SkipReason::NotPrivate);
        }
        if message.is_from_bot() {
            return RelayOutcome::Skipped(SkipReason::FromBot);
        }

        let from = message.chat.id;
        let Some(to) = self.store.get_partner(from).await else {
            return RelayOutcome::Skipped(SkipReason::Unpaired);
        };

        match self.outbox.copy(to, from, message.message_id).await {
            Ok(()) => {
                tracing::debug!(from, to, message_id = message.message_id, "Message relayed");
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
                    "Failed to relay message to partner"
                );
                RelayOutcome::Failed { to }
            }
        }
    }
}
