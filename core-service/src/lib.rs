//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media fetcher,
//! metadata lookup, decode backend, display driver, message bus) into the
//! appliance pipeline. Desktop hosts typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and build their dependencies
//! with [`CoreDependencies::desktop`].
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{AppContext, CoreDependencies};
//!
//! let bus = Arc::new(ChannelMessageBus::new());
//! let context = AppContext::start(CoreConfig::builder().build()?, CoreDependencies::desktop(bus.clone())).await?;
//! bus.publish("nfc/url", "https://music.youtube.com/watch?v=abc");
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;

pub use context::AppContext;
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    Clock, DecodeBackend, DisplayDriver, MediaFetcher, MessageBus, MetadataLookup, SystemClock,
};

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{ChannelMessageBus, FfplayBackend, SimulatedDisplay, YtDlpFetcher};
#[cfg(feature = "desktop-shims")]
use core_display::{DEFAULT_PANEL_HEIGHT, DEFAULT_PANEL_WIDTH};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub fetcher: Arc<dyn MediaFetcher>,
    pub metadata: Arc<dyn MetadataLookup>,
    pub backend: Arc<dyn DecodeBackend>,
    pub display: Arc<dyn DisplayDriver>,
    pub bus: Arc<dyn MessageBus>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        metadata: Arc<dyn MetadataLookup>,
        backend: Arc<dyn DecodeBackend>,
        display: Arc<dyn DisplayDriver>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            fetcher,
            metadata,
            backend,
            display,
            bus,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock used for cache timestamps and render throttling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// yt-dlp fetching, ffplay output and a simulated 250x122 panel, reading
    /// URLs from `bus`.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(bus: Arc<ChannelMessageBus>) -> Self {
        let ytdlp = Arc::new(YtDlpFetcher::new());
        Self::new(
            ytdlp.clone(),
            ytdlp,
            Arc::new(FfplayBackend::new()),
            Arc::new(SimulatedDisplay::new(
                DEFAULT_PANEL_WIDTH,
                DEFAULT_PANEL_HEIGHT,
            )),
            bus,
        )
    }
}
