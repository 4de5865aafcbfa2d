//! # Playback Error Types
//!
//! Error types for classification, acquisition and playback.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Why a URL cannot be turned into a playable reference.
///
/// Classification failures are reported, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// The payload is not a usable URL.
    #[error("Malformed URL {url:?}: {reason}")]
    Malformed { url: String, reason: String },

    /// The host is not on the allow-list.
    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    /// The URL points at a video rather than an audio track.
    #[error("Video playback is not supported: {0}")]
    VideoNotSupported(String),
}

/// Why fetching a reference into the cache failed.
///
/// Cloneable because one failure is delivered to every waiter of a fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Source refused the media: {0}")]
    Unsupported(String),

    #[error("Downloaded media is unusable: {0}")]
    Decode(String),

    /// Writing the blob or its metadata to the cache failed.
    #[error("Cache storage error: {0}")]
    Storage(String),

    /// The fetch task ended without producing a result.
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Returns `true` if a later request for the same reference may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Aborted(_))
    }
}

impl From<BridgeError> for FetchError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(message) => FetchError::Network(message),
            BridgeError::Unsupported(message) => FetchError::Unsupported(message),
            BridgeError::Decode(message) => FetchError::Decode(message),
            BridgeError::Io(e) => FetchError::Storage(e.to_string()),
            BridgeError::NotAvailable(message) | BridgeError::OperationFailed(message) => {
                FetchError::Network(message)
            }
        }
    }
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Acquisition Errors
    // ========================================================================
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache bookkeeping failed outside of a fetch (listing, eviction).
    #[error("Cache error: {0}")]
    CacheError(String),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The decode/output backend failed to load, start or finish a stream.
    #[error("Playback backend error: {0}")]
    Backend(String),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session task has shut down.
    #[error("Playback session closed")]
    SessionClosed,

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Fetch(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` if this error came from acquiring the media.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, PlaybackError::Fetch(_))
    }

    /// Returns `true` if the URL itself was rejected.
    pub fn is_classification_error(&self) -> bool {
        matches!(self, PlaybackError::Classification(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
