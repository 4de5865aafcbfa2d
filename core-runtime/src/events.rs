//! # Event Bus System
//!
//! Typed, in-process event routing for the appliance pipeline.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`CoreEvent`] wrapping the playback and media domains
//! - **Event Kinds**: [`EventKind`] discriminants used as routing keys
//! - **EventBus**: a map from kind to an ordered list of subscribers
//! - **Subscribers**: each with its own unbounded queue drained by a dedicated task
//!
//! ## Architecture
//!
//! ```text
//!                                   kind → [subscribers]
//! ┌──────────────────┐  emit   ┌──────────────┐  queue   ┌──────────────┐
//! │ Playback Session ├────────>│              ├─────────>│ Presenter    │ (own task)
//! └──────────────────┘         │   EventBus   │          └──────────────┘
//! ┌──────────────────┐  emit   │              │  queue   ┌──────────────┐
//! │ Dispatcher       ├────────>│              ├─────────>│ Logger / UI  │ (own task)
//! └──────────────────┘         └──────────────┘          └──────────────┘
//! ```
//!
//! `emit` never awaits: it clones the event into each matching subscriber's
//! queue and returns. A slow subscriber (an e-paper refresh takes seconds)
//! therefore never delays the tick timer that produced the event. Each
//! subscriber observes events in emission order.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::events::{CoreEvent, EventBus, EventKind, handler_fn};
//!
//! let bus = EventBus::new();
//! bus.subscribe(EventKind::PLAYBACK, handler_fn(|event: CoreEvent| async move {
//!     println!("{}", event.description());
//! }))?;
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback session events
    Playback(PlaybackEvent),
    /// Media acquisition and cache events
    Media(MediaEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Media(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::Rejected { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Playback(PlaybackEvent::Stopped { .. })
            | CoreEvent::Media(MediaEvent::CacheCleared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Routing key of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            CoreEvent::Playback(PlaybackEvent::Loading { .. }) => EventKind::PlaybackLoading,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventKind::PlaybackStarted,
            CoreEvent::Playback(PlaybackEvent::Progress { .. }) => EventKind::PlaybackProgress,
            CoreEvent::Playback(PlaybackEvent::Stopped { .. }) => EventKind::PlaybackStopped,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventKind::PlaybackError,
            CoreEvent::Media(MediaEvent::Rejected { .. }) => EventKind::MediaRejected,
            CoreEvent::Media(MediaEvent::CacheCleared { .. }) => EventKind::CacheCleared,
        }
    }
}

impl From<PlaybackEvent> for CoreEvent {
    fn from(event: PlaybackEvent) -> Self {
        CoreEvent::Playback(event)
    }
}

impl From<MediaEvent> for CoreEvent {
    fn from(event: MediaEvent) -> Self {
        CoreEvent::Media(event)
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Routing key for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PlaybackLoading,
    PlaybackStarted,
    PlaybackProgress,
    PlaybackStopped,
    PlaybackError,
    MediaRejected,
    CacheCleared,
}

impl EventKind {
    /// Every playback session event kind.
    pub const PLAYBACK: &'static [EventKind] = &[
        EventKind::PlaybackLoading,
        EventKind::PlaybackStarted,
        EventKind::PlaybackProgress,
        EventKind::PlaybackStopped,
        EventKind::PlaybackError,
    ];

    /// Every event kind.
    pub const ALL: &'static [EventKind] = &[
        EventKind::PlaybackLoading,
        EventKind::PlaybackStarted,
        EventKind::PlaybackProgress,
        EventKind::PlaybackStopped,
        EventKind::PlaybackError,
        EventKind::MediaRejected,
        EventKind::CacheCleared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlaybackLoading => "playback.loading",
            EventKind::PlaybackStarted => "playback.started",
            EventKind::PlaybackProgress => "playback.progress",
            EventKind::PlaybackStopped => "playback.stopped",
            EventKind::PlaybackError => "playback.error",
            EventKind::MediaRejected => "media.rejected",
            EventKind::CacheCleared => "media.cache_cleared",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Why a playback session reached `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The backend reported end-of-stream.
    Finished,
    /// `stop()` was requested.
    Requested,
    /// A new `play()` replaced the session.
    Superseded,
}

/// Events emitted by the playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new media reference is being acquired.
    Loading {
        /// Cache key of the reference.
        key: String,
        /// URL the reference was resolved from.
        source_url: String,
    },
    /// Audio output started.
    Started {
        key: String,
        title: String,
        /// Track length in seconds; zero when unknown.
        duration_secs: u64,
    },
    /// Periodic progress tick while playing.
    Progress {
        key: String,
        title: String,
        /// Whole seconds elapsed on the monotonic clock since start.
        elapsed_secs: u64,
        duration_secs: u64,
        /// `min(elapsed / duration, 1)`, or 0 when the duration is unknown.
        progress: f64,
    },
    /// Session reached `Stopped`.
    Stopped { key: String, reason: StopReason },
    /// Session reached `Errored`.
    Error {
        /// Key of the failed reference, if one was being played.
        key: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Media loading",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Progress { .. } => "Playback progress",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Media Events
// ============================================================================

/// Events about inbound media references and the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    /// A URL was rejected by classification and not played.
    Rejected { url: String, reason: String },
    /// The cache was cleared.
    CacheCleared { removed: usize },
}

impl MediaEvent {
    fn description(&self) -> &str {
        match self {
            MediaEvent::Rejected { .. } => "Media rejected",
            MediaEvent::CacheCleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Receives events on a subscriber's dedicated task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: CoreEvent);
}

#[async_trait]
impl<T: EventHandler + ?Sized> EventHandler for Arc<T> {
    async fn handle(&self, event: CoreEvent) {
        (**self).handle(event).await
    }
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as an [`EventHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CoreEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(CoreEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, event: CoreEvent) {
        (self.0)(event).await
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Identifies a subscription for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<CoreEvent>,
}

/// Central event bus routing events by kind.
///
/// Cloning the bus is cheap; all clones share one subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    routes: Arc<RwLock<HashMap<EventKind, Vec<Arc<Subscriber>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kinds` and spawns its worker task.
    ///
    /// The handler receives matching events one at a time, in emission
    /// order. Must be called from within a Tokio runtime.
    pub fn subscribe<H>(&self, kinds: &[EventKind], handler: H) -> Result<SubscriptionId>
    where
        H: EventHandler + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Subscription {
            kind: describe_kinds(kinds),
            reason: e.to_string(),
        })?;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let id = self.register(kinds, sender);

        runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                handler.handle(event).await;
            }
            trace!(subscription = %id, "Event subscriber drained");
        });

        Ok(id)
    }

    /// Registers a pull-based subscriber and returns its queue.
    pub fn subscribe_stream(&self, kinds: &[EventKind]) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.register(kinds, sender);
        EventStream { id, receiver }
    }

    /// Removes a subscription from every kind it was registered for.
    ///
    /// Events already queued are still delivered. Returns `false` if the id
    /// was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut routes = self.routes.write();
        let mut removed = false;
        for subscribers in routes.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|s| s.id != id);
            removed |= subscribers.len() != before;
        }
        routes.retain(|_, subscribers| !subscribers.is_empty());
        removed
    }

    /// Fans `event` out to every subscriber of its kind.
    ///
    /// Never blocks. Returns the number of subscribers the event was queued
    /// for. Subscribers whose worker has gone away are pruned.
    pub fn emit(&self, event: impl Into<CoreEvent>) -> usize {
        let event = event.into();
        let kind = event.kind();

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let routes = self.routes.read();
            let Some(subscribers) = routes.get(&kind) else {
                trace!(kind = %kind, "No subscribers for event");
                return 0;
            };
            for subscriber in subscribers {
                if subscriber.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(subscriber.id);
                }
            }
        }

        for id in closed {
            debug!(subscription = %id, "Pruning closed event subscriber");
            self.unsubscribe(id);
        }

        delivered
    }

    /// Number of subscribers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.routes.read().get(&kind).map_or(0, Vec::len)
    }

    fn register(
        &self,
        kinds: &[EventKind],
        sender: mpsc::UnboundedSender<CoreEvent>,
    ) -> SubscriptionId {
        let subscriber = Arc::new(Subscriber {
            id: SubscriptionId(Uuid::new_v4()),
            sender,
        });
        let id = subscriber.id;

        let mut routes = self.routes.write();
        let mut seen = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if seen.contains(kind) {
                continue;
            }
            seen.push(*kind);
            routes
                .entry(*kind)
                .or_default()
                .push(Arc::clone(&subscriber));
        }
        debug!(subscription = %id, kinds = %describe_kinds(kinds), "Event subscriber registered");
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.routes.read();
        let counts: HashMap<&'static str, usize> = routes
            .iter()
            .map(|(kind, subs)| (kind.as_str(), subs.len()))
            .collect();
        f.debug_struct("EventBus").field("routes", &counts).finish()
    }
}

fn describe_kinds(kinds: &[EventKind]) -> String {
    kinds
        .iter()
        .map(EventKind::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Event Stream
// ============================================================================

/// Pull-based subscriber queue returned by [`EventBus::subscribe_stream`].
pub struct EventStream {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<CoreEvent>,
}

impl EventStream {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<CoreEvent> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<CoreEvent> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").field("id", &self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn progress(elapsed_secs: u64) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Progress {
            key: "k".to_string(),
            title: "Song A".to_string(),
            elapsed_secs,
            duration_secs: 125,
            progress: elapsed_secs as f64 / 125.0,
        })
    }

    fn stopped() -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Stopped {
            key: "k".to_string(),
            reason: StopReason::Requested,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(stopped()), 0);
    }

    #[tokio::test]
    async fn test_routes_by_kind() {
        let bus = EventBus::new();
        let mut progress_only = bus.subscribe_stream(&[EventKind::PlaybackProgress]);
        let mut all = bus.subscribe_stream(EventKind::ALL);

        assert_eq!(bus.emit(progress(1)), 2);
        assert_eq!(bus.emit(stopped()), 1);

        assert_eq!(progress_only.try_recv(), Some(progress(1)));
        assert_eq!(progress_only.try_recv(), None);
        assert_eq!(all.try_recv(), Some(progress(1)));
        assert_eq!(all.try_recv(), Some(stopped()));
    }

    #[tokio::test]
    async fn test_duplicate_kinds_register_once() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe_stream(&[
            EventKind::PlaybackStopped,
            EventKind::PlaybackStopped,
        ]);
        assert_eq!(bus.subscriber_count(EventKind::PlaybackStopped), 1);

        bus.emit(stopped());
        assert!(stream.try_recv().is_some());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_handler_sees_events_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        bus.subscribe(
            EventKind::PLAYBACK,
            handler_fn(move |event: CoreEvent| {
                let sink = Arc::clone(&sink);
                async move {
                    if let CoreEvent::Playback(PlaybackEvent::Progress { elapsed_secs, .. }) =
                        event
                    {
                        // Uneven handler latency must not reorder delivery.
                        tokio::time::sleep(Duration::from_millis(elapsed_secs % 3)).await;
                        sink.lock().await.push(elapsed_secs);
                    }
                }
            }),
        )
        .unwrap();

        for second in 0..20 {
            bus.emit(progress(second));
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().await.len() < 20 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let seen = seen.lock().await.clone();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_emit() {
        let bus = EventBus::new();
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);

        bus.subscribe(
            &[EventKind::PlaybackProgress],
            handler_fn(move |_event: CoreEvent| {
                let mut release = release_rx.clone();
                async move {
                    let _ = release.wait_for(|released| *released).await;
                }
            }),
        )
        .unwrap();
        let mut fast = bus.subscribe_stream(&[EventKind::PlaybackProgress]);

        for second in 0..5 {
            assert_eq!(bus.emit(progress(second)), 2);
        }
        for second in 0..5 {
            assert_eq!(fast.recv().await, Some(progress(second)));
        }

        release_tx.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let stream = bus.subscribe_stream(EventKind::PLAYBACK);
        assert_eq!(bus.subscriber_count(EventKind::PlaybackStarted), 1);

        assert!(bus.unsubscribe(stream.id()));
        assert!(!bus.unsubscribe(stream.id()));
        assert_eq!(bus.subscriber_count(EventKind::PlaybackStarted), 0);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_pruned_on_emit() {
        let bus = EventBus::new();
        let stream = bus.subscribe_stream(&[EventKind::PlaybackStopped]);
        drop(stream);

        assert_eq!(bus.emit(stopped()), 0);
        assert_eq!(bus.subscriber_count(EventKind::PlaybackStopped), 0);
    }

    #[test]
    fn test_subscribe_outside_runtime_fails() {
        let bus = EventBus::new();
        let result = bus.subscribe(
            &[EventKind::PlaybackStopped],
            handler_fn(|_event: CoreEvent| async {}),
        );
        assert!(matches!(result, Err(Error::Subscription { .. })));
        assert_eq!(bus.subscriber_count(EventKind::PlaybackStopped), 0);
    }

    #[test]
    fn test_event_kind_and_severity() {
        assert_eq!(progress(3).kind(), EventKind::PlaybackProgress);
        assert_eq!(progress(3).severity(), EventSeverity::Debug);
        assert_eq!(stopped().severity(), EventSeverity::Info);

        let error = CoreEvent::Playback(PlaybackEvent::Error {
            key: None,
            message: "network".to_string(),
        });
        assert_eq!(error.severity(), EventSeverity::Error);
        assert_eq!(error.description(), "Playback error");

        let rejected = CoreEvent::Media(MediaEvent::Rejected {
            url: "https://example.com".to_string(),
            reason: "unsupported host".to_string(),
        });
        assert_eq!(rejected.kind(), EventKind::MediaRejected);
        assert_eq!(rejected.severity(), EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(stopped()).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "Stopped");
        assert_eq!(json["payload"]["reason"], "Requested");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, stopped());
    }
}
