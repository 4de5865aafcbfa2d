//! Media acquisition bridge traits.
//!
//! The core never speaks a network protocol itself. Hosts provide a
//! [`MediaFetcher`] that writes the audio payload for a URL into a local file
//! and a [`MetadataLookup`] that reports the track's title and length. The two
//! are deliberately separate capabilities: the core runs them concurrently and
//! tolerates a metadata failure as long as the download succeeds.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Descriptive metadata reported by a [`MetadataLookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Human-readable track title.
    pub title: String,
    /// Track length in whole seconds. Zero means unknown.
    pub duration_secs: u64,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            title: title.into(),
            duration_secs,
        }
    }
}

/// Downloads the audio payload behind a URL.
///
/// Implementations must write the complete payload to `destination` before
/// returning `Ok(())`. On failure the destination may contain partial data;
/// callers treat it as scratch space and discard it.
///
/// Failures should be classified:
/// - [`BridgeError::Network`](crate::BridgeError::Network) for transport problems
/// - [`BridgeError::Unsupported`](crate::BridgeError::Unsupported) when the
///   source refuses or cannot serve the media
/// - [`BridgeError::Decode`](crate::BridgeError::Decode) when the payload is unusable
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn download(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Resolves title and duration for a URL without downloading the payload.
#[async_trait::async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<TrackMetadata>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;
    use std::path::PathBuf;

    mock! {
        Lookup {}

        #[async_trait::async_trait]
        impl MetadataLookup for Lookup {
            async fn lookup(&self, url: &str) -> Result<TrackMetadata>;
        }
    }

    mock! {
        Fetcher {}

        #[async_trait::async_trait]
        impl MediaFetcher for Fetcher {
            async fn download(&self, url: &str, destination: &Path) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn lookup_is_object_safe() {
        let mut lookup = MockLookup::new();
        lookup
            .expect_lookup()
            .withf(|url| url == "https://music.youtube.com/watch?v=abc")
            .times(1)
            .returning(|_| Ok(TrackMetadata::new("Song A", 125)));

        let lookup: Box<dyn MetadataLookup> = Box::new(lookup);
        let metadata = lookup
            .lookup("https://music.youtube.com/watch?v=abc")
            .await
            .unwrap();
        assert_eq!(metadata, TrackMetadata::new("Song A", 125));
    }

    #[tokio::test]
    async fn download_errors_are_classified() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_download()
            .returning(|_, _| Err(BridgeError::Network("connection reset".into())));

        let err = fetcher
            .download("https://youtu.be/x", &PathBuf::from("/tmp/x.part"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Network(_)));
    }
}
