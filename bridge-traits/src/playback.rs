//! Playback bridge traits.
//!
//! The decode/output backend is an external collaborator: it loads a local
//! file, plays it, and reports end-of-stream. The core's playback session
//! drives exactly one backend session at a time and always stops the previous
//! one before loading the next.

use crate::error::Result;
use futures::future::BoxFuture;
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for playback sessions managed by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new random playback session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct a session identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID value.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolves when the backend session ends.
///
/// `Ok(())` means the stream played to its end. `Err` means decoding or output
/// failed mid-stream. A session terminated by [`DecodeBackend::stop`] may
/// resolve either way; callers that requested the stop ignore it.
pub type PlaybackCompletion = BoxFuture<'static, Result<()>>;

/// Platform decode/output backend.
#[async_trait::async_trait]
pub trait DecodeBackend: Send + Sync {
    /// Load a local audio file and prepare it for playback.
    async fn load(&self, path: &Path) -> Result<PlaybackSessionId>;

    /// Start playing a loaded session.
    async fn play(&self, session: PlaybackSessionId) -> Result<PlaybackCompletion>;

    /// Stop a session immediately and release its resources.
    ///
    /// Stopping an unknown or already finished session is not an error.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_unique() {
        let a = PlaybackSessionId::new();
        let b = PlaybackSessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_round_trips_uuid() {
        let uuid = Uuid::new_v4();
        let id = PlaybackSessionId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
