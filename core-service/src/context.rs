//! # Application Context
//!
//! Owns every long-lived component of the appliance and their lifecycle.
//!
//! ## Overview
//!
//! [`AppContext::start`] builds the pipeline from a [`CoreConfig`] and the
//! host's [`CoreDependencies`]:
//!
//! 1. validate the configuration
//! 2. prepare the cache directory (sweeping interrupted downloads)
//! 3. build the resolver, presenter and playback session
//! 4. subscribe the presenter to playback events and show standby
//! 5. subscribe to the URL topic and start the dispatcher task
//!
//! [`AppContext::shutdown`] reverses this: the dispatcher stops, playback is
//! stopped, and the presenter is closed, which leaves the panel asleep on
//! standby whatever events were still queued for it.

use crate::dispatcher::{Dispatch, Dispatcher};
use crate::error::{CoreError, Result};
use crate::CoreDependencies;
use core_display::{DisplayConfig, DisplayPresenter, DisplaySnapshot};
use core_playback::{
    AudioPlayer, CacheConfig, CacheEntry, CacheManager, MediaResolver, PlaybackSession,
    PlaybackStatus, ResolverConfig, SessionConfig,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventHandler, EventKind, MediaEvent, SubscriptionId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The running appliance.
pub struct AppContext {
    config: CoreConfig,
    events: EventBus,
    cache: Arc<CacheManager>,
    resolver: Arc<MediaResolver>,
    session: Arc<PlaybackSession>,
    presenter: Arc<DisplayPresenter>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    dispatcher_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    /// Build and start the pipeline. Must be called inside a Tokio runtime.
    #[instrument(skip_all, fields(cache_dir = %config.cache_dir.display(), topic = %config.url_topic))]
    pub async fn start(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(format!("no Tokio runtime: {}", e)))?;

        let events = EventBus::new();

        let cache = Arc::new(
            CacheManager::new(CacheConfig::from_core_config(&config))
                .with_clock(Arc::clone(&deps.clock)),
        );
        let swept = cache.initialize().await?;
        if swept > 0 {
            info!(swept, "Removed interrupted downloads");
        }

        let resolver = Arc::new(MediaResolver::new(
            ResolverConfig::from_core_config(&config),
            Arc::clone(&cache),
            deps.fetcher,
            deps.metadata,
        ));

        let presenter = Arc::new(
            DisplayPresenter::new(DisplayConfig::from_core_config(&config), deps.display)?
                .with_clock(deps.clock),
        );
        presenter.show_standby().await;
        events.subscribe(EventKind::PLAYBACK, Arc::clone(&presenter))?;

        let session = Arc::new(PlaybackSession::spawn(
            SessionConfig::from_core_config(&config),
            resolver.clone(),
            deps.backend,
            events.clone(),
        )?);

        let dispatcher = Dispatcher::new(
            resolver.config().clone(),
            session.clone(),
            events.clone(),
        );
        let messages = deps.bus.subscribe(&config.url_topic).await?;
        let cancel = CancellationToken::new();
        let task = runtime.spawn(dispatcher.clone().run(messages, cancel.child_token()));

        info!("Appliance started");
        Ok(Self {
            config,
            events,
            cache,
            resolver,
            session,
            presenter,
            dispatcher,
            cancel,
            dispatcher_task: Mutex::new(Some(task)),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Bus carrying every playback and media event.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn resolver(&self) -> &Arc<MediaResolver> {
        &self.resolver
    }

    /// The playback capability.
    pub fn player(&self) -> Arc<dyn AudioPlayer> {
        self.session.clone()
    }

    /// Current playback status. Never blocks.
    pub fn status(&self) -> PlaybackStatus {
        self.session.status()
    }

    pub async fn display_snapshot(&self) -> DisplaySnapshot {
        self.presenter.snapshot().await
    }

    /// Register an extra event subscriber.
    pub fn subscribe<H>(&self, kinds: &[EventKind], handler: H) -> Result<SubscriptionId>
    where
        H: EventHandler + 'static,
    {
        Ok(self.events.subscribe(kinds, handler)?)
    }

    /// Handle a URL as if it had arrived on the bus.
    pub async fn play_url(&self, url: &str) -> Result<Dispatch> {
        self.dispatcher.dispatch(url).await
    }

    pub async fn stop(&self) -> Result<()> {
        Ok(self.session.stop().await?)
    }

    pub async fn cached_entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.cache.entries().await?)
    }

    /// Remove every committed cache entry.
    ///
    /// Downloads in flight are unaffected. Emits
    /// [`MediaEvent::CacheCleared`] with the number of entries removed.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<usize> {
        let removed = self.cache.evict_all().await?;
        self.events.emit(MediaEvent::CacheCleared { removed });
        info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Whether [`AppContext::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the dispatcher and playback, return the panel to standby and put
    /// it to sleep. Later calls are no-ops.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!("Already shut down");
            return Ok(());
        }
        self.cancel.cancel();

        let task = self.dispatcher_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
        }

        self.session.shutdown().await?;
        self.presenter.close().await?;

        info!("Appliance shut down");
        Ok(())
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
