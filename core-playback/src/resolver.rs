//! # Media Resolver
//!
//! Turns raw URLs into [`MediaReference`]s and playable references into
//! cache entries.
//!
//! ## Classification
//!
//! ```text
//! parse ──fail──> Malformed
//!   │
//! host ∉ supported ──> UnsupportedHost
//!   │
//! host ∈ music hosts ──> AudioTrack
//!   │
//! host ∈ playlist hosts, query has `list` ──> AudioTrack
//!   │
//!   └──> VideoNotSupported
//! ```
//!
//! Classification is pure and never touches the network.
//!
//! ## Acquisition
//!
//! [`MediaResolver::acquire`] goes through the cache's single-flight fetch.
//! On a miss the download and the metadata lookup run concurrently; a failed
//! metadata lookup does not fail the fetch, the track gets a title derived
//! from its URL and an unknown duration instead.

use crate::cache::{CacheEntry, CacheManager};
use crate::error::{ClassificationError, FetchError, PlaybackError, Result};
use crate::reference::{MediaKind, MediaReference};
use async_trait::async_trait;
use bridge_traits::{MediaFetcher, MetadataLookup, TrackMetadata};
use core_runtime::config::{CoreConfig, DEFAULT_MUSIC_HOSTS, DEFAULT_SUPPORTED_HOSTS};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Produces a cache entry for a playable reference.
///
/// Implemented by [`MediaResolver`]; the playback session only depends on
/// this trait.
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    async fn acquire(&self, reference: &MediaReference) -> Result<CacheEntry>;
}

/// Hosts where a `list` query parameter marks an audio track.
pub const DEFAULT_PLAYLIST_HOSTS: &[&str] = &["youtube.com", "www.youtube.com"];

/// Host rules for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub supported_hosts: Vec<String>,
    pub music_hosts: Vec<String>,
    /// Hosts whose URLs are audio tracks when they carry a `list` parameter.
    pub playlist_hosts: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            supported_hosts: DEFAULT_SUPPORTED_HOSTS.iter().map(|h| h.to_string()).collect(),
            music_hosts: DEFAULT_MUSIC_HOSTS.iter().map(|h| h.to_string()).collect(),
            playlist_hosts: DEFAULT_PLAYLIST_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl ResolverConfig {
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            supported_hosts: config.supported_hosts.clone(),
            music_hosts: config.music_hosts.clone(),
            ..Self::default()
        }
    }

    pub fn with_playlist_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.playlist_hosts = hosts
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Classify `url` without any I/O.
    pub fn resolve(&self, url: &str) -> MediaReference {
        let kind = match self.classify(url) {
            Ok(()) => MediaKind::AudioTrack,
            Err(reason) => MediaKind::Unsupported(reason),
        };
        MediaReference::new(url, kind)
    }

    fn classify(&self, raw: &str) -> std::result::Result<(), ClassificationError> {
        let malformed = |reason: String| ClassificationError::Malformed {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(malformed(format!("unsupported scheme {:?}", url.scheme())));
        }
        let host = url
            .host_str()
            .ok_or_else(|| malformed("missing host".to_string()))?
            .to_ascii_lowercase();

        if !self.supported_hosts.iter().any(|h| *h == host) {
            return Err(ClassificationError::UnsupportedHost(host));
        }
        if self.music_hosts.iter().any(|h| *h == host) {
            return Ok(());
        }
        let playlist_host = self.playlist_hosts.iter().any(|h| *h == host);
        if playlist_host && url.query_pairs().any(|(name, _)| name == "list") {
            return Ok(());
        }
        Err(ClassificationError::VideoNotSupported(raw.to_string()))
    }
}

/// Classifies URLs and acquires playable references through the cache.
pub struct MediaResolver {
    config: ResolverConfig,
    cache: Arc<CacheManager>,
    fetcher: Arc<dyn MediaFetcher>,
    metadata: Arc<dyn MetadataLookup>,
}

impl MediaResolver {
    pub fn new(
        config: ResolverConfig,
        cache: Arc<CacheManager>,
        fetcher: Arc<dyn MediaFetcher>,
        metadata: Arc<dyn MetadataLookup>,
    ) -> Self {
        Self {
            config,
            cache,
            fetcher,
            metadata,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Classify a URL. See [`ResolverConfig::resolve`].
    pub fn resolve(&self, url: &str) -> MediaReference {
        self.config.resolve(url)
    }
}

#[async_trait]
impl MediaAcquirer for MediaResolver {
    #[instrument(skip(self), fields(key = %reference.key))]
    async fn acquire(&self, reference: &MediaReference) -> Result<CacheEntry> {
        if let MediaKind::Unsupported(reason) = &reference.kind {
            return Err(PlaybackError::Classification(reason.clone()));
        }

        let fetcher = Arc::clone(&self.fetcher);
        let metadata = Arc::clone(&self.metadata);
        let url = reference.source_url.clone();

        let entry = self
            .cache
            .fetch_or_wait(reference, move |blob_path: PathBuf| async move {
                debug!(url = %url, path = %blob_path.display(), "Downloading");
                let (download, lookup) = tokio::join!(
                    fetcher.download(&url, &blob_path),
                    metadata.lookup(&url)
                );
                download.map_err(FetchError::from)?;

                Ok(lookup.unwrap_or_else(|e| {
                    warn!(url = %url, error = %e, "Metadata lookup failed; using URL as title");
                    fallback_metadata(&url)
                }))
            })
            .await?;

        Ok(entry)
    }
}

/// Metadata for a track whose lookup failed: the URL without its scheme and
/// an unknown duration.
pub fn fallback_metadata(url: &str) -> TrackMetadata {
    let title = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    TrackMetadata::new(title, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(url: &str) -> MediaKind {
        ResolverConfig::default().resolve(url).kind
    }

    #[test]
    fn music_host_is_audio() {
        assert_eq!(
            kind("https://music.youtube.com/watch?v=abc"),
            MediaKind::AudioTrack
        );
    }

    #[test]
    fn list_parameter_is_audio() {
        assert_eq!(
            kind("https://www.youtube.com/watch?v=abc&list=PL123"),
            MediaKind::AudioTrack
        );
    }

    #[test]
    fn list_parameter_only_counts_on_playlist_hosts() {
        assert_eq!(
            kind("https://youtube.com/watch?v=abc&list=PL123"),
            MediaKind::AudioTrack
        );
        assert!(matches!(
            kind("https://youtu.be/abc?list=PL123"),
            MediaKind::Unsupported(ClassificationError::VideoNotSupported(_))
        ));

        let config = ResolverConfig::default().with_playlist_hosts(["YouTu.be"]);
        assert!(config.resolve("https://youtu.be/abc?list=PL123").is_playable());
        assert!(!config
            .resolve("https://www.youtube.com/watch?v=abc&list=PL123")
            .is_playable());
    }

    #[test]
    fn plain_video_is_rejected() {
        assert!(matches!(
            kind("https://www.youtube.com/watch?v=abc"),
            MediaKind::Unsupported(ClassificationError::VideoNotSupported(_))
        ));
        assert!(matches!(
            kind("https://youtu.be/abc"),
            MediaKind::Unsupported(ClassificationError::VideoNotSupported(_))
        ));
    }

    #[test]
    fn unknown_host_is_rejected() {
        assert_eq!(
            kind("https://example.com/song.mp3"),
            MediaKind::Unsupported(ClassificationError::UnsupportedHost(
                "example.com".to_string()
            ))
        );
    }

    #[test]
    fn host_match_is_case_insensitive() {
        assert_eq!(
            kind("https://MUSIC.YouTube.com/watch?v=abc"),
            MediaKind::AudioTrack
        );
    }

    #[test]
    fn malformed_inputs() {
        for url in ["", "not a url", "ftp://music.youtube.com/x", "music.youtube.com/watch"] {
            assert!(
                matches!(
                    kind(url),
                    MediaKind::Unsupported(ClassificationError::Malformed { .. })
                ),
                "{url:?}"
            );
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let config = ResolverConfig::default();
        let url = "https://music.youtube.com/watch?v=abc";
        assert_eq!(config.resolve(url), config.resolve(url));
        assert_eq!(config.resolve(url).key, crate::reference::cache_key(url));
    }

    #[test]
    fn custom_hosts() {
        let config = ResolverConfig {
            supported_hosts: vec!["audio.example".into()],
            music_hosts: vec!["audio.example".into()],
            playlist_hosts: Vec::new(),
        };
        assert!(config.resolve("https://audio.example/t/1").is_playable());
        assert!(!config.resolve("https://music.youtube.com/watch?v=a").is_playable());
    }

    #[test]
    fn fallback_title_strips_scheme() {
        let metadata = fallback_metadata("https://music.youtube.com/watch?v=abc");
        assert_eq!(metadata.title, "music.youtube.com/watch?v=abc");
        assert_eq!(metadata.duration_secs, 0);
    }
}
