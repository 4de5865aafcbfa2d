//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for Linux and macOS hosts,
//! including single-board computers driving the appliance.
//!
//! ## Overview
//!
//! This crate provides implementations of the collaborator traits using
//! external programs and in-process simulations:
//! - `MediaFetcher` / `MetadataLookup` using the `yt-dlp` command-line tool
//! - `DecodeBackend` using `ffplay` (one child process per playback session)
//! - `DisplayDriver` as a simulated panel that logs and records frames
//! - `MessageBus` as an in-memory publish/subscribe channel
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelMessageBus, FfplayBackend, SimulatedDisplay, YtDlpFetcher};
//! use std::sync::Arc;
//!
//! let fetcher = Arc::new(YtDlpFetcher::new());
//! let backend = Arc::new(FfplayBackend::new());
//! let display = Arc::new(SimulatedDisplay::new(250, 122));
//! let bus = Arc::new(ChannelMessageBus::new());
//! ```

mod bus;
mod display;
mod ffplay;
mod ytdlp;

pub use bus::ChannelMessageBus;
pub use display::{render_ascii, SimulatedDisplay};
pub use ffplay::FfplayBackend;
pub use ytdlp::{parse_duration, YtDlpFetcher};

use std::path::PathBuf;

/// Directory name used under the home directory for cached audio.
pub const CACHE_DIR_NAME: &str = ".audio-cache";

/// Default cache directory: `$HOME/.audio-cache`.
///
/// Returns `None` when the home directory cannot be determined.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CACHE_DIR_NAME))
}
