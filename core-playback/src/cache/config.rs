//! Cache configuration

use core_runtime::config::{CoreConfig, DEFAULT_BLOB_EXTENSION};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the [`CacheManager`](super::CacheManager).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Directory holding `<key>.<ext>` blobs and `<key>.json` sidecars.
    pub cache_dir: PathBuf,

    /// Blob file extension (default: `opus`)
    pub blob_extension: String,

    /// Upper bound for one fetch, download and metadata together (default: 300s)
    pub fetch_timeout: Option<Duration>,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            blob_extension: DEFAULT_BLOB_EXTENSION.to_string(),
            fetch_timeout: Some(Duration::from_secs(300)),
        }
    }

    /// Cache settings taken from the appliance configuration.
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self::new(config.cache_dir.clone()).with_blob_extension(config.blob_extension.clone())
    }

    pub fn with_blob_extension(mut self, extension: impl Into<String>) -> Self {
        self.blob_extension = extension.into();
        self
    }

    /// Set the fetch timeout; `None` waits indefinitely.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub(crate) fn blob_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, self.blob_extension))
    }

    pub(crate) fn sidecar_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}

/// Path of the in-progress twin of a cache file.
pub(crate) fn partial_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(super::PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn file_layout() {
        let config = CacheConfig::new("/cache").with_blob_extension("m4a");
        assert_eq!(config.blob_path("abc"), Path::new("/cache/abc.m4a"));
        assert_eq!(config.sidecar_path("abc"), Path::new("/cache/abc.json"));
        assert_eq!(
            partial_path(&config.blob_path("abc")),
            Path::new("/cache/abc.m4a.part")
        );
    }

    #[test]
    fn defaults() {
        let config = CacheConfig::new("/cache");
        assert_eq!(config.blob_extension, "opus");
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.with_fetch_timeout(None).fetch_timeout, None);
    }
}
