//! # Media Cache Module
//!
//! Persistent, content-addressed storage for fetched audio.
//!
//! ## Overview
//!
//! Each URL maps to a key (hex SHA-256 of the URL). A cache entry is the
//! audio blob plus a JSON sidecar with its title, duration and fetch time:
//!
//! ```text
//! ~/.audio-cache/
//! ├── 3f1c…9a.opus        blob
//! ├── 3f1c…9a.json        {"title", "durationSeconds", "fetchedAt"}
//! └── 77be…01.opus.part   fetch in progress (never a hit)
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │        CacheManager             │
//! │  - lookup()                     │
//! │  - fetch_or_wait()  single-flight
//! │  - entries() / evict_all()      │
//! └────────┬────────────────────────┘
//!          │ spawns one FetchJob per key
//!          └──> caller-supplied fetch fn (download + metadata)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, CacheManager};
//!
//! let cache = CacheManager::new(CacheConfig::new("/var/cache/jukebox"));
//! cache.initialize().await?;
//!
//! let entry = cache
//!     .fetch_or_wait(&reference, |blob_path| async move {
//!         download_to(&blob_path).await?;
//!         Ok(TrackMetadata::new("Song A", 125))
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod entry;
pub mod manager;

/// Suffix of files that are still being written.
pub const PARTIAL_SUFFIX: &str = ".part";

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use manager::CacheManager;
