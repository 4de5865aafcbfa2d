//! Workspace placeholder crate.
//!
//! This crate exists to expose a single dependency for host applications that
//! embed the tag-triggered jukebox core. Enabling the default `desktop-shims`
//! feature pulls in the service façade together with the desktop adapters
//! (yt-dlp fetcher, ffplay backend, simulated display, in-memory bus).

#[cfg(feature = "desktop-shims")]
pub use core_display as display;
#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_service as service;
