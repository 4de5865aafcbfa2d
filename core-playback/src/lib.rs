//! # Playback Module
//!
//! Media acquisition and playback for the tag-triggered audio player.
//!
//! ## Overview
//!
//! This crate handles:
//! - Classifying URLs into playable media references ([`resolver`])
//! - A content-addressed audio cache with single-flight fetches ([`cache`])
//! - The playback session state machine and its progress ticks ([`session`])
//!
//! ```text
//! URL ──resolve──> MediaReference ──play──> PlaybackSession
//!                                              │
//!                          MediaResolver::acquire
//!                                              │
//!                        CacheManager::fetch_or_wait ──> MediaFetcher
//!                                              │          MetadataLookup
//!                                              ▼
//!                                        DecodeBackend
//! ```

pub mod cache;
pub mod error;
pub mod reference;
pub mod resolver;
pub mod session;
pub mod traits;

pub use cache::{CacheConfig, CacheEntry, CacheManager};
pub use error::{ClassificationError, FetchError, PlaybackError, Result};
pub use reference::{cache_key, MediaKind, MediaReference};
pub use resolver::{MediaAcquirer, MediaResolver, ResolverConfig};
pub use session::{PlaybackSession, SessionConfig};
pub use traits::{AudioPlayer, PlaybackState, PlaybackStatus};
