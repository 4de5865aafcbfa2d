//! Media references produced by URL classification

use crate::error::ClassificationError;
use sha2::{Digest, Sha256};
use std::fmt;

/// What a classified URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// A single audio track that can be fetched and played.
    AudioTrack,
    /// Not playable; carries the reason.
    Unsupported(ClassificationError),
}

/// A classified URL together with its cache key.
///
/// The key is the lowercase hex SHA-256 of the exact URL string, so the same
/// URL always maps to the same cache entry and the key is safe to use as a
/// file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub key: String,
    pub kind: MediaKind,
    pub source_url: String,
}

impl MediaReference {
    pub fn new(source_url: impl Into<String>, kind: MediaKind) -> Self {
        let source_url = source_url.into();
        Self {
            key: cache_key(&source_url),
            kind,
            source_url,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self.kind, MediaKind::AudioTrack)
    }

    /// Classification failure, if any.
    pub fn rejection(&self) -> Option<&ClassificationError> {
        match &self.kind {
            MediaKind::AudioTrack => None,
            MediaKind::Unsupported(reason) => Some(reason),
        }
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source_url, &self.key[..12.min(self.key.len())])
    }
}

/// Cache key for a URL.
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Returns `true` if `candidate` looks like a key produced by [`cache_key`].
pub(crate) fn is_cache_key(candidate: &str) -> bool {
    candidate.len() == 64
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
