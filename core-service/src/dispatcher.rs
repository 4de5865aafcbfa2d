//! # Dispatcher
//!
//! Routes inbound bus payloads to the player.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────┐ payload ┌────────────┐ resolve ┌──────────────┐ play ┌─────────────┐
//! │ MessageBus  ├────────>│ Dispatcher ├────────>│ResolverConfig├─────>│ AudioPlayer │
//! └─────────────┘         └─────┬──────┘         └──────────────┘      └─────────────┘
//!                               │ rejected
//!                               v
//!                         EventBus (MediaEvent::Rejected)
//! ```
//!
//! Payloads are handled one at a time in arrival order. `play` only waits
//! for the previous reference to be torn down, never for a download, so the
//! most recent payload always wins.

use crate::error::Result;
use bridge_traits::MessageStream;
use core_playback::{AudioPlayer, MediaKind, ResolverConfig};
use core_runtime::events::{EventBus, MediaEvent};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The reference with this key is now loading.
    Playing(String),
    /// Classification rejected the URL.
    Rejected(String),
    /// Blank payload.
    Ignored,
}

/// Bus → resolve → play router.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: ResolverConfig,
    player: Arc<dyn AudioPlayer>,
    events: EventBus,
}

impl Dispatcher {
    pub fn new(resolver: ResolverConfig, player: Arc<dyn AudioPlayer>, events: EventBus) -> Self {
        Self {
            resolver,
            player,
            events,
        }
    }

    /// Handle a single payload.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, payload: &str) -> Result<Dispatch> {
        let url = payload.trim();
        if url.is_empty() {
            debug!("Ignoring blank payload");
            return Ok(Dispatch::Ignored);
        }

        let reference = self.resolver.resolve(url);
        if let MediaKind::Unsupported(reason) = &reference.kind {
            warn!(url, reason = %reason, "Rejected URL");
            self.events.emit(MediaEvent::Rejected {
                url: url.to_string(),
                reason: reason.to_string(),
            });
            return Ok(Dispatch::Rejected(reason.to_string()));
        }

        let key = reference.key.clone();
        self.player.play(reference).await?;
        info!(key = %key, "Dispatched");
        Ok(Dispatch::Playing(key))
    }

    /// Drain `messages` until the stream ends, `shutdown` fires or the player
    /// goes away.
    pub async fn run(self, mut messages: MessageStream, shutdown: CancellationToken) {
        loop {
            let payload = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Dispatcher cancelled");
                    break;
                }
                message = messages.next() => match message {
                    Some(payload) => payload,
                    None => {
                        info!("Message stream ended");
                        break;
                    }
                },
            };

            if let Err(e) = self.dispatch(&payload).await {
                if e.is_session_closed() {
                    warn!("Player closed; dispatcher stopping");
                    break;
                }
                error!(error = %e, "Dispatch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use async_trait::async_trait;
    use core_playback::{MediaReference, PlaybackError, PlaybackStatus};
    use core_runtime::events::{
        CoreEvent, EventHandler, EventKind, SubscriptionId,
    };
    use mockall::mock;

    mock! {
        Player {}

        #[async_trait]
        impl AudioPlayer for Player {
            async fn play(&self, reference: MediaReference) -> core_playback::Result<()>;
            async fn stop(&self) -> core_playback::Result<()>;
            fn status(&self) -> PlaybackStatus;
            fn subscribe(
                &self,
                kinds: &[EventKind],
                handler: Arc<dyn EventHandler>,
            ) -> core_playback::Result<SubscriptionId>;
        }
    }

    fn dispatcher(player: MockPlayer, events: EventBus) -> Dispatcher {
        Dispatcher::new(ResolverConfig::default(), Arc::new(player), events)
    }

    #[tokio::test]
    async fn supported_url_is_played_trimmed() {
        let mut player = MockPlayer::new();
        player
            .expect_play()
            .withf(|reference| reference.source_url == "https://music.youtube.com/watch?v=abc")
            .times(1)
            .returning(|_| Ok(()));

        let outcome = dispatcher(player, EventBus::new())
            .dispatch("  https://music.youtube.com/watch?v=abc\n")
            .await
            .unwrap();
        assert!(matches!(outcome, Dispatch::Playing(key) if key.len() == 64));
    }

    #[tokio::test]
    async fn rejected_url_is_reported_not_played() {
        let mut player = MockPlayer::new();
        player.expect_play().times(0);

        let events = EventBus::new();
        let mut rejected = events.subscribe_stream(&[EventKind::MediaRejected]);
        let outcome = dispatcher(player, events)
            .dispatch("https://www.youtube.com/watch?v=video")
            .await
            .unwrap();

        assert!(matches!(outcome, Dispatch::Rejected(_)));
        match rejected.recv().await {
            Some(CoreEvent::Media(MediaEvent::Rejected { url, .. })) => {
                assert_eq!(url, "https://www.youtube.com/watch?v=video")
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_payload_is_ignored() {
        let mut player = MockPlayer::new();
        player.expect_play().times(0);

        let outcome = dispatcher(player, EventBus::new())
            .dispatch("   ")
            .await
            .unwrap();
        assert_eq!(outcome, Dispatch::Ignored);
    }

    #[tokio::test]
    async fn closed_player_stops_the_loop() {
        let mut player = MockPlayer::new();
        player
            .expect_play()
            .times(1)
            .returning(|_| Err(PlaybackError::SessionClosed));

        let messages = futures::stream::iter(vec![
            "https://music.youtube.com/watch?v=a".to_string(),
            "https://music.youtube.com/watch?v=b".to_string(),
        ])
        .boxed();
        dispatcher(player, EventBus::new())
            .run(messages, CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn play_failure_surfaces_as_core_error() {
        let mut player = MockPlayer::new();
        player
            .expect_play()
            .returning(|_| Err(PlaybackError::Backend("no audio device".into())));

        let err = dispatcher(player, EventBus::new())
            .dispatch("https://music.youtube.com/watch?v=a")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Playback(PlaybackError::Backend(_))));
        assert!(!err.is_session_closed());
    }
}
