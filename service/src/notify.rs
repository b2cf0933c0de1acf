//! Best-effort notification sink for queue events.
//!
//! The core has no hard dependency on any messaging client: hosts plug in
//! whatever they have behind [`NotificationSink`], or nothing at all via
//! [`NoopSink`]. Publishing never blocks and never fails the caller.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What happened to a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEvent {
    Queued,
    Completed,
    Conflict,
    Failed,
}

/// A queue event addressed to a user's topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub operation_id: String,
    pub event: QueueEvent,
}

/// Topic a user's queue events are published on.
pub fn user_topic(user_id: &str) -> String {
    format!("sync.{user_id}")
}

/// Best-effort sink; implementations must not block and must swallow
/// delivery failures.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, topic: &str, notification: &Notification);
}

/// Sink that drops everything, for hosts without messaging infrastructure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn publish(&self, _topic: &str, _notification: &Notification) {}
}

/// In-process fan-out sink.
///
/// Subscribers register per topic and receive events over unbounded
/// channels. Thread-safe and shared across the service and worker via
/// `Arc`. Dropped receivers are pruned on the next publish.
#[derive(Debug, Default)]
pub struct ChannelSink {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<Notification>>>,
}

impl ChannelSink {
    /// Create a new sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new sink wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to a topic.
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, topic: &str, notification: &Notification) {
        if let Some(mut subs) = self.subscribers.get_mut(topic) {
            subs.retain(|tx| tx.send(notification.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(user: &str, op: &str) -> Notification {
        Notification {
            user_id: user.to_string(),
            operation_id: op.to_string(),
            event: QueueEvent::Queued,
        }
    }

    #[test]
    fn publish_reaches_topic_subscribers_only() {
        let sink = ChannelSink::new();
        let mut rx_a = sink.subscribe(&user_topic("user-a"));
        let mut rx_b = sink.subscribe(&user_topic("user-b"));

        sink.publish(&user_topic("user-a"), &queued("user-a", "op-1"));

        assert_eq!(rx_a.try_recv().unwrap(), queued("user-a", "op-1"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let sink = ChannelSink::new();
        // Must not panic or block.
        sink.publish("sync.nobody", &queued("nobody", "op-1"));
        assert_eq!(sink.subscriber_count("sync.nobody"), 0);
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let sink = ChannelSink::new();
        let rx = sink.subscribe("sync.user-a");
        drop(rx);
        let _live = sink.subscribe("sync.user-a");

        sink.publish("sync.user-a", &queued("user-a", "op-1"));
        assert_eq!(sink.subscriber_count("sync.user-a"), 1);
    }

    #[test]
    fn noop_sink_swallows_everything() {
        NoopSink.publish("sync.user-a", &queued("user-a", "op-1"));
    }

    #[test]
    fn notification_serialization_format() {
        let json = serde_json::to_string(&queued("user-a", "op-1")).unwrap();
        assert!(json.contains("\"event\":\"queued\""));
        assert!(json.contains("operationId"));
    }
}
