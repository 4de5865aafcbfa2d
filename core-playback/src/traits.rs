//! # Core Playback Traits
//!
//! The playback capability exposed to the rest of the appliance.
//!
//! The bridge layer's [`DecodeBackend`](bridge_traits::DecodeBackend) only
//! knows how to play a file. [`AudioPlayer`] is the higher-level contract the
//! dispatcher and the application talk to: it takes media references, owns
//! the state machine and publishes lifecycle events.
//!
//! ## State Machine
//!
//! ```text
//!            play(r)                 acquired           end-of-stream
//!   Idle ─────────────> Loading ─────────────> Playing ─────────────> Stopped
//!    ▲                    │  │                  │  │
//!    │                    │  └──fetch error──┐  │  └──stop()──> Stopped
//!    │                    └──stop()──> Stopped  │
//!    │                                       ▼  └──backend error──> Errored
//!    │                                    Errored
//!    └── any state: play(r') tears down the current session first
//! ```

use crate::error::Result;
use crate::reference::MediaReference;
use async_trait::async_trait;
use core_runtime::events::{EventHandler, EventKind, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Playback State
// ============================================================================

/// State of the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing has been played yet.
    Idle,
    /// Acquiring the media for a reference.
    Loading,
    /// Audio is being output.
    Playing,
    /// Playback ended or was stopped.
    Stopped,
    /// Acquisition or the backend failed.
    Errored,
}

impl PlaybackState {
    /// Returns `true` while a reference is being loaded or played.
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

/// Snapshot of the playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub key: Option<String>,
    pub title: Option<String>,
    /// Whole seconds since playback started; frozen once it stops.
    pub elapsed_secs: u64,
    /// Zero when unknown.
    pub duration_secs: u64,
}

impl PlaybackStatus {
    pub fn idle() -> Self {
        Self {
            state: PlaybackState::Idle,
            key: None,
            title: None,
            elapsed_secs: 0,
            duration_secs: 0,
        }
    }

    /// `min(elapsed / duration, 1)`, or 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        progress_ratio(self.elapsed_secs, self.duration_secs)
    }
}

/// Fraction of a track played, clamped to `[0, 1]`.
pub fn progress_ratio(elapsed_secs: u64, duration_secs: u64) -> f64 {
    if duration_secs == 0 {
        return 0.0;
    }
    (elapsed_secs as f64 / duration_secs as f64).min(1.0)
}

// ============================================================================
// Audio Player
// ============================================================================

/// Audio playback capability.
///
/// One reference plays at a time. Implementations publish
/// [`PlaybackEvent`](core_runtime::events::PlaybackEvent)s in state-machine
/// order to subscribers.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing `reference`, tearing down whatever is current.
    ///
    /// Returns once the previous session is fully stopped and the new one is
    /// `Loading`. Acquisition and playback continue in the background.
    async fn play(&self, reference: MediaReference) -> Result<()>;

    /// Stop the current session. A no-op when nothing is loading or playing.
    async fn stop(&self) -> Result<()>;

    /// Current status. Never blocks on playback work.
    fn status(&self) -> PlaybackStatus;

    /// Receive playback events of the given kinds.
    fn subscribe(
        &self,
        kinds: &[EventKind],
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress_ratio(0, 0), 0.0);
        assert_eq!(progress_ratio(30, 0), 0.0);
        assert!((progress_ratio(65, 125) - 0.52).abs() < 1e-9);
        assert_eq!(progress_ratio(200, 125), 1.0);
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = PlaybackStatus {
            state: PlaybackState::Playing,
            key: Some("k".into()),
            title: Some("Song A".into()),
            elapsed_secs: 3,
            duration_secs: 125,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "playing");
        assert_eq!(json["elapsedSecs"], 3);
        assert!(PlaybackState::Loading.is_active());
        assert!(!PlaybackState::Errored.is_active());
    }
}
