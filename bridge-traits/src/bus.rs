//! Inbound message bus abstraction.
//!
//! Transport, reconnection and backoff belong to the host. The core only sees
//! an ordered stream of string payloads for a topic.

use crate::error::Result;
use futures::stream::BoxStream;

/// Ordered stream of raw payloads delivered on a topic.
pub type MessageStream = BoxStream<'static, String>;

#[async_trait::async_trait]
pub trait MessageBus: Send + Sync {
    /// Subscribe to `topic`. The stream ends when the bus shuts down.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream>;
}
