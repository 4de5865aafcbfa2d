//! # Playback Session
//!
//! The single active playback session of the appliance.
//!
//! ## Overview
//!
//! [`PlaybackSession`] is a handle to a session task that owns all playback
//! state. `play`/`stop` are commands sent to that task; it processes them one
//! at a time together with acquisition results, progress ticks and the
//! backend's end-of-stream, so transitions never interleave:
//!
//! ```text
//!   PlaybackSession ──commands──> session task ──events──> EventBus
//!         │                         │    │    │
//!         └── status (watch) <──────┘    │    └── DecodeBackend
//!                                        └── MediaAcquirer (spawned)
//! ```
//!
//! A new `play` stops the current backend session and aborts any in-flight
//! acquisition before the new reference reaches `Loading`. Progress ticks are
//! driven by a monotonic interval and stop as soon as the session leaves
//! `Playing`.

use crate::cache::CacheEntry;
use crate::error::{PlaybackError, Result};
use crate::reference::MediaReference;
use crate::resolver::MediaAcquirer;
use crate::traits::{progress_ratio, AudioPlayer, PlaybackState, PlaybackStatus};
use async_trait::async_trait;
use bridge_traits::{DecodeBackend, PlaybackCompletion, PlaybackSessionId};
use core_runtime::config::{CoreConfig, DEFAULT_TICK_INTERVAL};
use core_runtime::events::{
    EventBus, EventHandler, EventKind, PlaybackEvent, StopReason, SubscriptionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for [`PlaybackSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Period between progress events (default: 1s)
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl SessionConfig {
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            tick_interval: config.tick_interval,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

enum Command {
    Play {
        reference: MediaReference,
        ack: oneshot::Sender<()>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Status as published by the session task. Elapsed time is derived on read.
#[derive(Debug, Clone)]
struct StatusCell {
    state: PlaybackState,
    key: Option<String>,
    title: Option<String>,
    duration_secs: u64,
    started_at: Option<Instant>,
    elapsed_secs: u64,
}

impl StatusCell {
    fn idle() -> Self {
        Self {
            state: PlaybackState::Idle,
            key: None,
            title: None,
            duration_secs: 0,
            started_at: None,
            elapsed_secs: 0,
        }
    }

    fn snapshot(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            key: self.key.clone(),
            title: self.title.clone(),
            elapsed_secs: self
                .started_at
                .map_or(self.elapsed_secs, |start| start.elapsed().as_secs()),
            duration_secs: self.duration_secs,
        }
    }
}

/// Handle to the playback session task.
///
/// Dropping the last handle stops playback and ends the task.
pub struct PlaybackSession {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StatusCell>,
    events: EventBus,
}

impl PlaybackSession {
    /// Spawn the session task on the current Tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        acquirer: Arc<dyn MediaAcquirer>,
        backend: Arc<dyn DecodeBackend>,
        events: EventBus,
    ) -> Result<Self> {
        if config.tick_interval.is_zero() {
            return Err(PlaybackError::Internal(
                "tick interval must be greater than zero".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlaybackError::Internal(format!("no Tokio runtime: {}", e)))?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(StatusCell::idle());

        let actor = SessionActor {
            tick: config.tick_interval,
            acquirer,
            backend,
            events: events.clone(),
            status: status_tx,
            commands: receiver,
            loading: None,
            acquire: None,
            active: None,
            ticker: None,
            completion: None,
        };
        runtime.spawn(actor.run());

        Ok(Self {
            commands,
            status,
            events,
        })
    }

    /// The bus this session publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop playback and end the session task.
    ///
    /// Later `play`/`stop` calls fail with [`PlaybackError::SessionClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|ack| Command::Shutdown { ack }).await
    }

    async fn request<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<()>) -> Command,
    {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(command(ack))
            .map_err(|_| PlaybackError::SessionClosed)?;
        done.await.map_err(|_| PlaybackError::SessionClosed)
    }
}

#[async_trait]
impl AudioPlayer for PlaybackSession {
    async fn play(&self, reference: MediaReference) -> Result<()> {
        self.request(move |ack| Command::Play { reference, ack })
            .await
    }

    async fn stop(&self) -> Result<()> {
        self.request(|ack| Command::Stop { ack }).await
    }

    fn status(&self) -> PlaybackStatus {
        self.status.borrow().snapshot()
    }

    fn subscribe(
        &self,
        kinds: &[EventKind],
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId> {
        Ok(self.events.subscribe(kinds, handler)?)
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// The reference currently producing audio.
struct Active {
    key: String,
    title: String,
    duration_secs: u64,
    backend_session: PlaybackSessionId,
    started_at: Instant,
}

enum Wake {
    Command(Command),
    Closed,
    Acquired(Result<CacheEntry>),
    Tick,
    Finished(bridge_traits::error::Result<()>),
}

struct SessionActor {
    tick: Duration,
    acquirer: Arc<dyn MediaAcquirer>,
    backend: Arc<dyn DecodeBackend>,
    events: EventBus,
    status: watch::Sender<StatusCell>,
    commands: mpsc::UnboundedReceiver<Command>,
    loading: Option<MediaReference>,
    acquire: Option<JoinHandle<Result<CacheEntry>>>,
    active: Option<Active>,
    ticker: Option<Interval>,
    completion: Option<PlaybackCompletion>,
}

impl SessionActor {
    async fn run(mut self) {
        debug!("Playback session started");
        loop {
            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Closed,
                },
                result = next_acquired(&mut self.acquire) => Wake::Acquired(result),
                outcome = next_completion(&mut self.completion) => Wake::Finished(outcome),
                () = next_tick(&mut self.ticker) => Wake::Tick,
            };

            match wake {
                Wake::Command(Command::Play { reference, ack }) => {
                    self.start(reference).await;
                    let _ = ack.send(());
                }
                Wake::Command(Command::Stop { ack }) => {
                    self.teardown(StopReason::Requested).await;
                    let _ = ack.send(());
                }
                Wake::Command(Command::Shutdown { ack }) => {
                    self.teardown(StopReason::Requested).await;
                    let _ = ack.send(());
                    break;
                }
                Wake::Closed => {
                    self.teardown(StopReason::Requested).await;
                    break;
                }
                Wake::Acquired(Ok(entry)) => self.begin_playback(entry).await,
                Wake::Acquired(Err(e)) => {
                    let key = self.loading.take().map(|r| r.key);
                    self.fail(key, e);
                }
                Wake::Tick => self.emit_progress(),
                Wake::Finished(Ok(())) => self.finish(),
                Wake::Finished(Err(e)) => {
                    let key = self.active.take().map(|a| a.key);
                    self.fail(key, PlaybackError::Backend(e.to_string()));
                }
            }
        }
        debug!("Playback session ended");
    }

    async fn start(&mut self, reference: MediaReference) {
        self.teardown(StopReason::Superseded).await;

        info!(reference = %reference, "Loading media");
        self.status.send_replace(StatusCell {
            state: PlaybackState::Loading,
            key: Some(reference.key.clone()),
            ..StatusCell::idle()
        });
        self.events.emit(PlaybackEvent::Loading {
            key: reference.key.clone(),
            source_url: reference.source_url.clone(),
        });

        let acquirer = Arc::clone(&self.acquirer);
        let job = reference.clone();
        self.acquire = Some(tokio::spawn(async move { acquirer.acquire(&job).await }));
        self.loading = Some(reference);
    }

    async fn begin_playback(&mut self, entry: CacheEntry) {
        if self.loading.take().is_none() {
            return;
        }

        let backend_session = match self.backend.load(&entry.blob_path).await {
            Ok(session) => session,
            Err(e) => {
                return self.fail(Some(entry.key), PlaybackError::Backend(e.to_string()));
            }
        };
        let completion = match self.backend.play(backend_session).await {
            Ok(completion) => completion,
            Err(e) => {
                if let Err(stop_err) = self.backend.stop(backend_session).await {
                    warn!(error = %stop_err, "Failed to release backend session");
                }
                return self.fail(Some(entry.key), PlaybackError::Backend(e.to_string()));
            }
        };

        let started_at = Instant::now();
        let mut ticker = interval_at(started_at + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.completion = Some(completion);

        info!(key = %entry.key, title = %entry.title, duration_secs = entry.duration_secs, "Playback started");
        self.status.send_replace(StatusCell {
            state: PlaybackState::Playing,
            key: Some(entry.key.clone()),
            title: Some(entry.title.clone()),
            duration_secs: entry.duration_secs,
            started_at: Some(started_at),
            elapsed_secs: 0,
        });
        self.events.emit(PlaybackEvent::Started {
            key: entry.key.clone(),
            title: entry.title.clone(),
            duration_secs: entry.duration_secs,
        });

        self.active = Some(Active {
            key: entry.key,
            title: entry.title,
            duration_secs: entry.duration_secs,
            backend_session,
            started_at,
        });
    }

    fn emit_progress(&self) {
        let Some(active) = &self.active else {
            return;
        };
        let elapsed_secs = active.started_at.elapsed().as_secs();
        self.events.emit(PlaybackEvent::Progress {
            key: active.key.clone(),
            title: active.title.clone(),
            elapsed_secs,
            duration_secs: active.duration_secs,
            progress: progress_ratio(elapsed_secs, active.duration_secs),
        });
    }

    fn finish(&mut self) {
        self.ticker = None;
        let Some(active) = self.active.take() else {
            return;
        };
        info!(key = %active.key, "Playback finished");
        self.mark_stopped(active, StopReason::Finished);
    }

    /// Stop whatever is loading or playing. Does nothing when idle.
    async fn teardown(&mut self, reason: StopReason) {
        self.ticker = None;
        self.completion = None;
        if let Some(acquire) = self.acquire.take() {
            acquire.abort();
        }

        if let Some(active) = self.active.take() {
            if let Err(e) = self.backend.stop(active.backend_session).await {
                warn!(key = %active.key, error = %e, "Backend failed to stop");
            }
            info!(key = %active.key, ?reason, "Playback stopped");
            self.mark_stopped(active, reason);
        } else if let Some(reference) = self.loading.take() {
            info!(key = %reference.key, ?reason, "Loading cancelled");
            self.status.send_replace(StatusCell {
                state: PlaybackState::Stopped,
                key: Some(reference.key.clone()),
                ..StatusCell::idle()
            });
            self.events.emit(PlaybackEvent::Stopped {
                key: reference.key,
                reason,
            });
        }
    }

    fn mark_stopped(&mut self, active: Active, reason: StopReason) {
        self.status.send_replace(StatusCell {
            state: PlaybackState::Stopped,
            key: Some(active.key.clone()),
            title: Some(active.title),
            duration_secs: active.duration_secs,
            started_at: None,
            elapsed_secs: active.started_at.elapsed().as_secs(),
        });
        self.events.emit(PlaybackEvent::Stopped {
            key: active.key,
            reason,
        });
    }

    fn fail(&mut self, key: Option<String>, error: PlaybackError) {
        self.ticker = None;
        self.completion = None;
        self.active = None;
        self.loading = None;

        error!(key = ?key, error = %error, "Playback failed");
        self.status.send_replace(StatusCell {
            state: PlaybackState::Errored,
            key: key.clone(),
            ..StatusCell::idle()
        });
        self.events.emit(PlaybackEvent::Error {
            key,
            message: error.to_string(),
        });
    }
}

async fn next_acquired(slot: &mut Option<JoinHandle<Result<CacheEntry>>>) -> Result<CacheEntry> {
    let Some(handle) = slot.as_mut() else {
        return futures::future::pending().await;
    };
    let joined = handle.await;
    *slot = None;
    joined.unwrap_or_else(|e| Err(PlaybackError::Internal(format!("acquire task failed: {}", e))))
}

async fn next_completion(
    slot: &mut Option<PlaybackCompletion>,
) -> bridge_traits::error::Result<()> {
    let Some(completion) = slot.as_mut() else {
        return futures::future::pending().await;
    };
    let outcome = completion.await;
    *slot = None;
    outcome
}

async fn next_tick(slot: &mut Option<Interval>) {
    match slot {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => futures::future::pending().await,
    }
}
