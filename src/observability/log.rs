//! Tracing-based observer that emits structured log events.
//!
//! Events appear alongside normal application logs, with no extra
//! dependencies.
use crate::observability::traits::{Observer, ObserverEvent, ObserverMetric};

/// Observer that logs events and metrics via `tracing`.
pub struct LogObserver;

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::UpdateReceived { update_id } => {
                tracing::debug!(update_id, "observer: update.received");
            }
            ObserverEvent::UpdateIgnored { reason } => {
                tracing::debug!(reason, "observer: update.ignored");
            }
            ObserverEvent::MessageRelayed { from, to } => {
                tracing::info!(from, to, "observer: message.relayed");
            }
            ObserverEvent::DeliveryFailed { to, reason } => {
                tracing::info!(to, error = reason.as_str(), "observer: delivery.failed");
            }
            ObserverEvent::PairLinked { a, b } => {
                tracing::info!(a, b, "observer: pair.linked");
            }
            ObserverEvent::PairUnlinked { a, b } => {
                tracing::info!(a, b, "observer: pair.unlinked");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::DeliveryLatency(d) => {
                tracing::debug!(
                    latency_ms = d.as_millis() as u64,
                    "observer: metric.delivery_latency"
                );
            }
            ObserverMetric::ActivePairs(n) => {
                tracing::debug!(active_pairs = n, "observer: metric.active_pairs");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
