//! # Core Configuration Module
//!
//! Configuration for the acquisition, playback and display pipeline.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every tunable of the appliance. Values not set on the builder fall
//! back to documented defaults, and the result is validated before it is
//! handed out so a bad value fails at start-up instead of mid-playback.
//!
//! ## Defaults
//!
//! | Setting            | Default                              |
//! |--------------------|--------------------------------------|
//! | `cache_dir`        | `$HOME/.audio-cache` (desktop shims) |
//! | `blob_extension`   | `opus`                               |
//! | `url_topic`        | `nfc/url`                            |
//! | `tick_interval`    | 1 s                                  |
//! | `render_throttle`  | 10 s                                 |
//! | `progress_epsilon` | 0.05                                 |
//! | `supported_hosts`  | YouTube hosts                        |
//! | `music_hosts`      | `music.youtube.com`                  |
//!
//! When the `desktop-shims` feature is disabled, the cache directory has no
//! default and must be provided explicitly.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/var/lib/jukebox/cache")
//!     .render_throttle(Duration::from_secs(5))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default MQTT-style topic carrying raw URLs.
pub const DEFAULT_URL_TOPIC: &str = "nfc/url";
/// Default file extension of cached audio blobs.
pub const DEFAULT_BLOB_EXTENSION: &str = "opus";
/// Default period between progress ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Default minimum time between two partial display refreshes.
pub const DEFAULT_RENDER_THROTTLE: Duration = Duration::from_secs(10);
/// Default progress change that forces a partial refresh inside the throttle window.
pub const DEFAULT_PROGRESS_EPSILON: f64 = 0.05;
/// Hosts accepted by the resolver.
pub const DEFAULT_SUPPORTED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "music.youtube.com",
];
/// Hosts whose URLs are always audio tracks.
pub const DEFAULT_MUSIC_HOSTS: &[&str] = &["music.youtube.com"];

/// Core configuration for the appliance pipeline.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Directory holding cached audio blobs and their metadata sidecars.
    pub cache_dir: PathBuf,

    /// File extension used for cached blobs.
    pub blob_extension: String,

    /// Bus topic carrying URLs to play.
    pub url_topic: String,

    /// Hosts the resolver accepts (lowercase).
    pub supported_hosts: Vec<String>,

    /// Subset of hosts whose URLs are audio tracks regardless of query.
    pub music_hosts: Vec<String>,

    /// Period of progress ticks while playing.
    pub tick_interval: Duration,

    /// Minimum time between partial display refreshes.
    pub render_throttle: Duration,

    /// Progress delta that bypasses the render throttle.
    pub progress_epsilon: f64,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Cache directory, blob extension and topic are not empty
    /// - Tick interval and render throttle are non-zero
    /// - Progress epsilon lies in `(0, 1]`
    /// - At least one supported host exists and every music host is supported
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.blob_extension.is_empty() || self.blob_extension.contains('.') {
            return Err(Error::Config(format!(
                "Blob extension must be a bare, non-empty extension (got {:?})",
                self.blob_extension
            )));
        }

        if self.url_topic.trim().is_empty() {
            return Err(Error::Config("URL topic cannot be empty".to_string()));
        }

        if self.tick_interval.is_zero() {
            return Err(Error::Config(
                "Tick interval must be greater than zero".to_string(),
            ));
        }

        if self.render_throttle.is_zero() {
            return Err(Error::Config(
                "Render throttle must be greater than zero".to_string(),
            ));
        }

        if !(self.progress_epsilon > 0.0 && self.progress_epsilon <= 1.0) {
            return Err(Error::Config(format!(
                "Progress epsilon must be in (0, 1] (got {})",
                self.progress_epsilon
            )));
        }

        if self.supported_hosts.is_empty() {
            return Err(Error::Config(
                "At least one supported host is required".to_string(),
            ));
        }

        if let Some(host) = self
            .music_hosts
            .iter()
            .find(|host| !self.supported_hosts.contains(host))
        {
            return Err(Error::Config(format!(
                "Music host {} is not in the supported host list",
                host
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_cache_dir() -> Result<PathBuf> {
    bridge_desktop::default_cache_dir().ok_or_else(|| Error::CapabilityMissing {
        capability: "CacheDirectory".to_string(),
        message: "Could not determine the home directory. \
                  Set the cache directory explicitly with .cache_dir()."
            .to_string(),
    })
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_cache_dir() -> Result<PathBuf> {
    Err(Error::Config(
        "Cache directory is required. Use .cache_dir() to set it \
         or enable the 'desktop-shims' feature for the $HOME default."
            .to_string(),
    ))
}

fn normalize_hosts(hosts: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(hosts.len());
    for host in hosts {
        let host = host.trim().to_ascii_lowercase();
        if !host.is_empty() && !normalized.contains(&host) {
            normalized.push(host);
        }
    }
    normalized
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    blob_extension: Option<String>,
    url_topic: Option<String>,
    supported_hosts: Option<Vec<String>>,
    music_hosts: Option<Vec<String>>,
    tick_interval: Option<Duration>,
    render_throttle: Option<Duration>,
    progress_epsilon: Option<f64>,
}

impl CoreConfigBuilder {
    /// Sets the cache directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .cache_dir("/path/to/cache");
    /// ```
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn blob_extension(mut self, extension: impl Into<String>) -> Self {
        self.blob_extension = Some(extension.into());
        self
    }

    pub fn url_topic(mut self, topic: impl Into<String>) -> Self {
        self.url_topic = Some(topic.into());
        self
    }

    /// Replaces the supported host allow-list.
    pub fn supported_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the list of hosts that always serve audio tracks.
    pub fn music_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.music_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Sets the minimum time between partial display refreshes.
    pub fn render_throttle(mut self, interval: Duration) -> Self {
        self.render_throttle = Some(interval);
        self
    }

    /// Sets the progress delta that bypasses the render throttle.
    pub fn progress_epsilon(mut self, epsilon: f64) -> Self {
        self.progress_epsilon = Some(epsilon);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined or any value
    /// fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => provide_default_cache_dir()?,
        };

        let supported_hosts = normalize_hosts(self.supported_hosts.unwrap_or_else(|| {
            DEFAULT_SUPPORTED_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect()
        }));
        let music_hosts = normalize_hosts(
            self.music_hosts
                .unwrap_or_else(|| DEFAULT_MUSIC_HOSTS.iter().map(|h| h.to_string()).collect()),
        );

        let config = CoreConfig {
            cache_dir,
            blob_extension: self
                .blob_extension
                .unwrap_or_else(|| DEFAULT_BLOB_EXTENSION.to_string()),
            url_topic: self
                .url_topic
                .unwrap_or_else(|| DEFAULT_URL_TOPIC.to_string()),
            supported_hosts,
            music_hosts,
            tick_interval: self.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL),
            render_throttle: self.render_throttle.unwrap_or(DEFAULT_RENDER_THROTTLE),
            progress_epsilon: self.progress_epsilon.unwrap_or(DEFAULT_PROGRESS_EPSILON),
        };

        config.validate()?;

        Ok(config)
    }
}
