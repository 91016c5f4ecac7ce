//! Core observer trait and event/metric types.
use std::time::Duration;

use crate::telegram::ChatId;

/// Provider-agnostic observer for relay lifecycle events and metrics.
///
/// The dispatcher, relays and pairing protocol record events at key points
/// and the observer decides what to do with them.
pub trait Observer: Send + Sync {
    /// Record a discrete lifecycle event.
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric sample.
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data. No-op by default.
    fn flush(&self) {}

    /// Human-readable backend name (e.g. "noop", "log").
    fn name(&self) -> &str;
}

/// Discrete lifecycle events.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// A webhook update was accepted.
    UpdateReceived { update_id: i64 },

    /// An update was dropped without any outbound call.
    UpdateIgnored { reason: &'static str },

    /// A message was copied into another chat.
    MessageRelayed { from: ChatId, to: ChatId },

    /// An outbound call failed or timed out.
    DeliveryFailed { to: ChatId, reason: String },

    /// Two chats were paired.
    PairLinked { a: ChatId, b: ChatId },

    /// A pairing was dissolved.
    PairUnlinked { a: ChatId, b: ChatId },
}

/// Numeric metric samples.
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    /// Latency of a single outbound platform call.
    DeliveryLatency(Duration),

    /// Number of active pairings (gauge).
    ActivePairs(u64),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::observability::traits::*;

    struct CountingObserver(std::sync::atomic::AtomicUsize);

    impl Observer for CountingObserver {
        fn record_event(&self, _event: &ObserverEvent) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn record_metric(&self, _metric: &ObserverMetric) {}

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn default_flush_is_noop() {
        let obs = CountingObserver(Default::default());
        obs.flush();
        obs.record_event(&ObserverEvent::PairLinked { a: 1, b: 2 });
        obs.record_metric(&ObserverMetric::DeliveryLatency(Duration::from_millis(3)));
        assert_eq!(obs.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
