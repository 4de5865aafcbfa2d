//! Cache entries and their on-disk metadata sidecar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A committed cache entry: a blob plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub blob_path: PathBuf,
    pub title: String,
    /// Zero when the duration is unknown.
    pub duration_secs: u64,
    pub fetched_at: DateTime<Utc>,
}

/// Contents of `<key>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Sidecar {
    pub title: String,
    pub duration_seconds: u64,
    pub fetched_at: DateTime<Utc>,
}

impl Sidecar {
    pub(crate) fn into_entry(self, key: &str, blob_path: PathBuf) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            blob_path,
            title: self.title,
            duration_secs: self.duration_seconds,
            fetched_at: self.fetched_at,
        }
    }
}
