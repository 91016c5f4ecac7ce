//! Per-message relaying.
//!
//! Two engines share one contract: take an inbound [`Message`], decide
//! where (if anywhere) it goes, copy it there, and never let a delivery
//! failure escape to the webhook response.
//!
//! [`Message`]: crate::telegram::Message

mod forward;
mod pair;

pub use forward::ForwardRelay;
pub use pair::PairRelay;

use crate::telegram::ChatId;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Copied into `to`.
    Delivered { to: ChatId },
    /// Copy into `to` was attempted and failed (already logged).
    Failed { to: ChatId },
    /// Not relayed at all.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPrivate,
    FromBot,
    Unpaired,
    SourceMismatch,
    TargetLoop,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotPrivate => "not_private",
            Self::FromBot => "from_bot",
            Self::Unpaired => "unpaired",
            Self::SourceMismatch => "source_mismatch",
            Self::TargetLoop => "target_loop",
        }
    }
}
