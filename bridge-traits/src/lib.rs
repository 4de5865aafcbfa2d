//! # Host Bridge Traits
//!
//! Collaborator contracts that the appliance core depends on but never
//! implements itself.
//!
//! ## Overview
//!
//! This crate defines the boundary between the acquisition/playback/display
//! pipeline and the outside world. Each trait represents a capability that is
//! provided by the host: on a Raspberry Pi class device these are backed by
//! real processes and SPI panels, on a development machine by the simulated
//! adapters in `bridge-desktop`, and in tests by mocks.
//!
//! ## Traits
//!
//! ### Acquisition
//! - [`MediaFetcher`](fetch::MediaFetcher) - Download the audio payload of a URL to a local file
//! - [`MetadataLookup`](fetch::MetadataLookup) - Resolve title and duration of a URL
//!
//! ### Output
//! - [`DecodeBackend`](playback::DecodeBackend) - Load, play and stop a local audio file
//! - [`DisplayDriver`](display::DisplayDriver) - Push a 1-bpp frame to the panel
//!
//! ### Inbound
//! - [`MessageBus`](bus::MessageBus) - Subscribe to a topic of string payloads
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should classify failures (network, unsupported, decode) so
//! the core can report them without string matching.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared as
//! `Arc<dyn Trait>` across tasks.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::fetch::MediaFetcher;
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::path::Path;
//!
//! pub struct CurlFetcher;
//!
//! #[async_trait]
//! impl MediaFetcher for CurlFetcher {
//!     async fn download(&self, url: &str, destination: &Path) -> Result<()> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod bus;
pub mod display;
pub mod error;
pub mod fetch;
pub mod playback;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use bus::{MessageBus, MessageStream};
pub use display::{DisplayDriver, MonoBitmap};
pub use fetch::{MediaFetcher, MetadataLookup, TrackMetadata};
pub use playback::{DecodeBackend, PlaybackCompletion, PlaybackSessionId};
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
