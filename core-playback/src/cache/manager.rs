//! # Cache Manager
//!
//! Content-addressed blob cache with single-flight fetches.
//!
//! Every cache entry is two files in the cache directory: the audio blob
//! `<key>.<ext>` and its metadata sidecar `<key>.json`. Both are first written
//! under a `.part` name and renamed into place, blob first, so an entry is
//! only visible once both are complete. A crash mid-fetch leaves nothing but
//! `.part` files, which [`CacheManager::initialize`] sweeps away.
//!
//! Concurrent requests for the same key share one fetch: the first caller
//! registers a ticket and spawns the fetch task, later callers attach to the
//! ticket and receive the same outcome.

use crate::cache::config::{partial_path, CacheConfig};
use crate::cache::entry::{CacheEntry, Sidecar};
use crate::cache::PARTIAL_SUFFIX;
use crate::error::{FetchError, PlaybackError, Result};
use crate::reference::{is_cache_key, MediaReference};
use bridge_traits::{Clock, SystemClock, TrackMetadata};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

type FetchOutcome = std::result::Result<CacheEntry, FetchError>;
type InFlight = Arc<Mutex<HashMap<String, FetchTicket>>>;

/// Callers waiting on one in-flight fetch.
struct FetchTicket {
    waiters: Vec<oneshot::Sender<FetchOutcome>>,
}

/// Cache manager for fetched audio blobs.
pub struct CacheManager {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    in_flight: InFlight,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Set the clock used for `fetched_at` timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Create the cache directory and remove leftovers of interrupted fetches.
    ///
    /// Returns the number of partial files removed. Partial files belonging to
    /// a fetch that is currently running are left alone.
    #[instrument(skip(self), fields(dir = %self.config.cache_dir.display()))]
    pub async fn initialize(&self) -> Result<usize> {
        info!("Initializing cache manager");

        tokio::fs::create_dir_all(&self.config.cache_dir)
            .await
            .map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                PlaybackError::CacheError(format!("Failed to create cache directory: {}", e))
            })?;

        let mut swept = 0;
        let mut dir = tokio::fs::read_dir(&self.config.cache_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if !name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let key = name.split('.').next().unwrap_or_default();
            if self.in_flight.lock().contains_key(key) {
                continue;
            }
            match tokio::fs::remove_file(item.path()).await {
                Ok(()) => swept += 1,
                Err(e) => warn!(file = %name, error = %e, "Failed to remove partial cache file"),
            }
        }

        if swept > 0 {
            info!(swept, "Removed partial files of interrupted fetches");
        }
        Ok(swept)
    }

    /// Returns the committed entry for `reference`, if any.
    ///
    /// A blob without a readable sidecar is a miss.
    pub async fn lookup(&self, reference: &MediaReference) -> Result<Option<CacheEntry>> {
        Ok(read_entry(&self.config, &reference.key).await?)
    }

    /// Returns the cached entry, fetching it first if necessary.
    ///
    /// `fetch` receives the path the blob must be written to and returns the
    /// track metadata. It runs at most once per key at a time: callers that
    /// arrive while a fetch is in flight wait for it and get its outcome,
    /// success or failure. Failures are not cached, so the next request
    /// after a failure fetches again.
    ///
    /// The fetch runs on its own task and completes even if every caller
    /// stops waiting.
    #[instrument(skip(self, fetch), fields(key = %reference.key))]
    pub async fn fetch_or_wait<F, Fut>(
        &self,
        reference: &MediaReference,
        fetch: F,
    ) -> std::result::Result<CacheEntry, FetchError>
    where
        F: FnOnce(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<TrackMetadata, FetchError>> + Send + 'static,
    {
        match read_entry(&self.config, &reference.key).await {
            Ok(Some(entry)) => {
                debug!("Cache hit");
                return Ok(entry);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Cache lookup failed; fetching"),
        }

        let (sender, receiver) = oneshot::channel();
        let leader = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get_mut(&reference.key) {
                Some(ticket) => {
                    ticket.waiters.push(sender);
                    false
                }
                None => {
                    in_flight.insert(
                        reference.key.clone(),
                        FetchTicket {
                            waiters: vec![sender],
                        },
                    );
                    true
                }
            }
        };

        if leader {
            debug!(url = %reference.source_url, "Starting fetch");
            let job = FetchJob {
                key: reference.key.clone(),
                config: self.config.clone(),
                clock: Arc::clone(&self.clock),
            };
            let guard = TicketGuard {
                in_flight: Arc::clone(&self.in_flight),
                key: reference.key.clone(),
                settled: false,
            };
            tokio::spawn(job.run(fetch, guard));
        } else {
            debug!("Joining in-flight fetch");
        }

        receiver
            .await
            .unwrap_or_else(|_| Err(FetchError::Aborted("fetch task went away".to_string())))
    }

    /// Number of keys currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Number of callers waiting on the in-flight fetch of `reference`.
    pub fn waiter_count(&self, reference: &MediaReference) -> usize {
        self.in_flight
            .lock()
            .get(&reference.key)
            .map_or(0, |ticket| ticket.waiters.len())
    }

    /// All committed entries, oldest first.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.config.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            let Some(key) = name.strip_suffix(".json") else {
                continue;
            };
            if !is_cache_key(key) {
                continue;
            }
            if let Some(entry) = read_entry(&self.config, key).await? {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at));
        Ok(entries)
    }

    /// Remove every committed entry.
    ///
    /// In-flight fetches are not affected: their partial files stay and the
    /// entry appears once they commit. Returns the number of keys removed.
    #[instrument(skip(self), fields(dir = %self.config.cache_dir.display()))]
    pub async fn evict_all(&self) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.config.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let blob_suffix = format!(".{}", self.config.blob_extension);
        let mut removed = HashSet::new();
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let key = name
                .strip_suffix(".json")
                .or_else(|| name.strip_suffix(blob_suffix.as_str()));
            let Some(key) = key.filter(|k| is_cache_key(k)) else {
                continue;
            };

            match tokio::fs::remove_file(item.path()).await {
                Ok(()) => {
                    removed.insert(key.to_string());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!(file = %name, error = %e, "Failed to evict cache file");
                    return Err(PlaybackError::CacheError(format!(
                        "Failed to evict {}: {}",
                        name, e
                    )));
                }
            }
        }

        info!(removed = removed.len(), "Cache cleared");
        Ok(removed.len())
    }
}

// ============================================================================
// Fetch Task
// ============================================================================

struct FetchJob {
    key: String,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl FetchJob {
    async fn run<F, Fut>(self, fetch: F, mut guard: TicketGuard)
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<TrackMetadata, FetchError>>,
    {
        let outcome = self.execute(fetch).await;
        guard.settle(outcome);
    }

    async fn execute<F, Fut>(&self, fetch: F) -> FetchOutcome
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<TrackMetadata, FetchError>>,
    {
        // Another fetch may have committed between the caller's miss and this ticket.
        if let Ok(Some(entry)) = read_entry(&self.config, &self.key).await {
            return Ok(entry);
        }

        tokio::fs::create_dir_all(&self.config.cache_dir)
            .await
            .map_err(storage_error)?;

        let blob_path = self.config.blob_path(&self.key);
        let blob_part = partial_path(&blob_path);
        let started = Instant::now();

        let fetched = match self.config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch(blob_part.clone()))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::Network(format!(
                        "fetch timed out after {}s",
                        limit.as_secs()
                    )))
                }),
            None => fetch(blob_part.clone()).await,
        };

        let result = match fetched {
            Ok(metadata) => self.commit(&blob_part, &blob_path, metadata).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(entry) => info!(
                key = %self.key,
                title = %entry.title,
                duration_secs = entry.duration_secs,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetched into cache"
            ),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Fetch failed");
                remove_quietly(&blob_part).await;
                remove_quietly(&partial_path(&self.config.sidecar_path(&self.key))).await;
            }
        }
        result
    }

    async fn commit(
        &self,
        blob_part: &Path,
        blob_path: &Path,
        metadata: TrackMetadata,
    ) -> FetchOutcome {
        let size = tokio::fs::metadata(blob_part)
            .await
            .map_err(|e| FetchError::Storage(format!("downloaded blob missing: {}", e)))?
            .len();
        if size == 0 {
            return Err(FetchError::Decode("downloaded blob is empty".to_string()));
        }

        let sidecar = Sidecar {
            title: metadata.title,
            duration_seconds: metadata.duration_secs,
            fetched_at: self.clock.now(),
        };
        let json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| FetchError::Storage(format!("failed to encode metadata: {}", e)))?;

        let sidecar_path = self.config.sidecar_path(&self.key);
        let sidecar_part = partial_path(&sidecar_path);
        tokio::fs::write(&sidecar_part, json)
            .await
            .map_err(storage_error)?;

        // Blob first: the sidecar rename is what makes the entry visible.
        tokio::fs::rename(blob_part, blob_path)
            .await
            .map_err(storage_error)?;
        if let Err(e) = tokio::fs::rename(&sidecar_part, &sidecar_path).await {
            remove_quietly(blob_path).await;
            return Err(storage_error(e));
        }

        Ok(sidecar.into_entry(&self.key, blob_path.to_path_buf()))
    }
}

/// Resolves a ticket's waiters exactly once, even if the fetch task panics.
struct TicketGuard {
    in_flight: InFlight,
    key: String,
    settled: bool,
}

impl TicketGuard {
    fn settle(&mut self, outcome: FetchOutcome) {
        self.settled = true;
        let ticket = self.in_flight.lock().remove(&self.key);
        let Some(ticket) = ticket else {
            return;
        };
        debug!(key = %self.key, waiters = ticket.waiters.len(), ok = outcome.is_ok(), "Fetch settled");
        for waiter in ticket.waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if !self.settled {
            error!(key = %self.key, "Fetch task ended without a result");
            self.settle(Err(FetchError::Aborted(
                "fetch task panicked or was cancelled".to_string(),
            )));
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_entry(config: &CacheConfig, key: &str) -> std::io::Result<Option<CacheEntry>> {
    if !is_cache_key(key) {
        return Ok(None);
    }

    let blob_path = config.blob_path(key);
    match tokio::fs::metadata(&blob_path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    }

    let raw = match tokio::fs::read(config.sidecar_path(key)).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<Sidecar>(&raw) {
        Ok(sidecar) => Ok(Some(sidecar.into_entry(key, blob_path))),
        Err(e) => {
            warn!(key, error = %e, "Unreadable cache sidecar; treating as miss");
            Ok(None)
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

fn storage_error(e: std::io::Error) -> FetchError {
    FetchError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::MediaKind;

    fn manager(dir: &Path) -> CacheManager {
        CacheManager::new(CacheConfig::new(dir))
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager(dir.path());
        let reference = MediaReference::new("https://youtu.be/x", MediaKind::AudioTrack);

        let err = cache
            .fetch_or_wait(&reference, |path| async move {
                tokio::fs::write(&path, b"half").await.unwrap();
                Err(FetchError::Network("reset".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Network("reset".into()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn empty_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = manager(dir.path());
        let reference = MediaReference::new("https://youtu.be/empty", MediaKind::AudioTrack);

        let err = cache
            .fetch_or_wait(&reference, |path| async move {
                tokio::fs::write(&path, b"").await.unwrap();
                Ok(TrackMetadata::new("Empty", 0))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
        assert_eq!(cache.lookup(&reference).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_timeout_is_a_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(
            CacheConfig::new(dir.path())
                .with_fetch_timeout(Some(std::time::Duration::from_secs(5))),
        );
        let reference = MediaReference::new("https://youtu.be/slow", MediaKind::AudioTrack);

        let err = cache
            .fetch_or_wait(&reference, |_| async {
                futures::future::pending::<()>().await;
                Ok::<_, FetchError>(TrackMetadata::new("never", 0))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Network(m) if m.contains("timed out")));
    }
}
