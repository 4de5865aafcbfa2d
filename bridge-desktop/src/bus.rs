//! In-memory publish/subscribe message bus

use async_trait::async_trait;
use bridge_traits::{
    bus::{MessageBus, MessageStream},
    error::Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Buffered messages per topic before slow subscribers start lagging.
pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// Topic-based broadcast bus living inside the process.
///
/// Stands in for the MQTT broker on development hosts and in tests:
/// `publish` plays the role of the NFC reader.
pub struct ChannelMessageBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl ChannelMessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish `payload` on `topic`. Returns the number of live subscribers.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) -> usize {
        let sender = self.sender(topic);
        sender.send(payload.into()).unwrap_or(0)
    }

    /// End every stream subscribed to `topic`.
    pub fn close(&self, topic: &str) {
        if self.topics.lock().remove(topic).is_some() {
            debug!(topic, "Topic closed");
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for ChannelMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for ChannelMessageBus {
    async fn subscribe(&self, topic: &str) -> Result<MessageStream> {
        let receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();
        debug!(topic = %topic, "Subscribed");

        let stream = futures::stream::unfold(receiver, move |mut receiver| {
            let topic = topic.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(message) => return Some((message, receiver)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(topic = %topic, skipped, "Subscriber lagged; messages dropped");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = ChannelMessageBus::new();
        let mut stream = bus.subscribe("nfc/url").await.unwrap();

        assert_eq!(bus.publish("nfc/url", "a"), 1);
        assert_eq!(bus.publish("nfc/url", "b"), 1);
        assert_eq!(bus.publish("other", "ignored"), 0);

        assert_eq!(stream.next().await.as_deref(), Some("a"));
        assert_eq!(stream.next().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn close_ends_streams() {
        let bus = ChannelMessageBus::new();
        let mut stream = bus.subscribe("nfc/url").await.unwrap();
        bus.close("nfc/url");
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let bus = ChannelMessageBus::with_capacity(2);
        let mut stream = bus.subscribe("t").await.unwrap();
        for i in 0..5 {
            bus.publish("t", i.to_string());
        }
        assert_eq!(stream.next().await.as_deref(), Some("3"));
        assert_eq!(stream.next().await.as_deref(), Some("4"));
    }
}
