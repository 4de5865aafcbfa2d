//! # Display Presenter
//!
//! Turns playback events into panel refreshes.
//!
//! ## Overview
//!
//! E-paper refreshes are slow and wear the panel, so the presenter decides
//! per event whether to redraw at all and how:
//!
//! | Event                          | Refresh                               |
//! |--------------------------------|---------------------------------------|
//! | `Loading`                      | full, loading screen                  |
//! | `Started`, new title           | full, playback screen                 |
//! | `Progress`, same title         | partial if throttle elapsed or the    |
//! |                                | bar moved by at least epsilon         |
//! | `Stopped` (not superseded)     | full standby, once                    |
//! | `Error`                        | full, error screen                    |
//!
//! Render failures are logged and dropped; the presenter state is left as
//! it was, so the next event retries. Once [`DisplayPresenter::close`] has
//! been called every later event is skipped, including events that were
//! already queued.

use crate::canvas::Canvas;
use crate::error::{DisplayError, Result};
use crate::layout;
use async_trait::async_trait;
use bridge_traits::{Clock, DisplayDriver, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::config::{CoreConfig, DEFAULT_PROGRESS_EPSILON, DEFAULT_RENDER_THROTTLE};
use core_runtime::events::{CoreEvent, EventHandler, PlaybackEvent, StopReason};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

/// Default panel width (2.13" e-paper module).
pub const DEFAULT_PANEL_WIDTH: u32 = 250;
/// Default panel height.
pub const DEFAULT_PANEL_HEIGHT: u32 = 122;

/// Presenter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Minimum time between partial refreshes (default: 10s)
    pub render_throttle: Duration,

    /// Progress change that refreshes inside the throttle window (default: 0.05)
    pub progress_epsilon: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            render_throttle: DEFAULT_RENDER_THROTTLE,
            progress_epsilon: DEFAULT_PROGRESS_EPSILON,
        }
    }
}

impl DisplayConfig {
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            render_throttle: config.render_throttle,
            progress_epsilon: config.progress_epsilon,
        }
    }

    pub fn with_render_throttle(mut self, throttle: Duration) -> Self {
        self.render_throttle = throttle;
        self
    }

    pub fn with_progress_epsilon(mut self, epsilon: f64) -> Self {
        self.progress_epsilon = epsilon;
        self
    }
}

/// Screen currently on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    /// Nothing rendered yet.
    Blank,
    Standby,
    Loading,
    Playback,
    Error,
}

/// What the presenter last put on the panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    pub screen: Screen,
    pub last_rendered_title: Option<String>,
    pub last_rendered_progress: f64,
    pub last_rendered_at: Option<DateTime<Utc>>,
    pub full_refreshes: u64,
    pub partial_refreshes: u64,
}

impl DisplaySnapshot {
    fn blank() -> Self {
        Self {
            screen: Screen::Blank,
            last_rendered_title: None,
            last_rendered_progress: 0.0,
            last_rendered_at: None,
            full_refreshes: 0,
            partial_refreshes: 0,
        }
    }
}

/// Outcome of presenting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The event did not warrant a refresh.
    Skipped,
    Full,
    Partial,
    /// The driver failed; the panel keeps its previous content.
    Failed,
}

struct PresenterState {
    canvas: Canvas,
    snapshot: DisplaySnapshot,
    closing: bool,
}

/// Event-driven renderer for the e-paper panel.
pub struct DisplayPresenter {
    config: DisplayConfig,
    driver: Arc<dyn DisplayDriver>,
    clock: Arc<dyn Clock>,
    state: Mutex<PresenterState>,
}

impl DisplayPresenter {
    pub fn new(config: DisplayConfig, driver: Arc<dyn DisplayDriver>) -> Result<Self> {
        let (width, height) = driver.dimensions();
        if width <= 2 * layout::MARGIN as u32 || height <= layout::TIME_TOP as u32 {
            return Err(DisplayError::InvalidDimensions { width, height });
        }

        Ok(Self {
            config,
            driver,
            clock: Arc::new(SystemClock),
            state: Mutex::new(PresenterState {
                canvas: Canvas::new(width, height),
                snapshot: DisplaySnapshot::blank(),
                closing: false,
            }),
        })
    }

    /// Set the clock used for throttling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn snapshot(&self) -> DisplaySnapshot {
        self.state.lock().await.snapshot.clone()
    }

    /// Show the standby screen unless it is already up.
    pub async fn show_standby(&self) -> Refresh {
        let mut state = self.state.lock().await;
        self.standby(&mut state).await
    }

    /// Show standby, put the panel into its low-power state and stop
    /// presenting. Later calls are no-ops.
    ///
    /// Everything happens under one lock, so an event queued before the call
    /// cannot repaint the panel between standby and sleep.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closing {
            return Ok(());
        }
        self.standby(&mut state).await;
        state.closing = true;
        self.driver.sleep().await?;
        debug!("Display closed");
        Ok(())
    }

    /// Apply one event to the panel.
    #[instrument(skip(self, event), fields(kind = %event.kind()))]
    pub async fn present(&self, event: &CoreEvent) -> Refresh {
        let CoreEvent::Playback(event) = event else {
            return Refresh::Skipped;
        };

        let mut state = self.state.lock().await;
        if state.closing {
            trace!("Display closed; event skipped");
            return Refresh::Skipped;
        }
        match event {
            PlaybackEvent::Loading { source_url, .. } => {
                let detail = source_url
                    .split_once("://")
                    .map_or(source_url.as_str(), |(_, rest)| rest);
                layout::draw_loading(&mut state.canvas, detail);
                self.commit(&mut state, Screen::Loading, None, 0.0, true).await
            }
            PlaybackEvent::Started {
                title,
                duration_secs,
                ..
            } => {
                layout::draw_playback(&mut state.canvas, title, 0, *duration_secs, 0.0);
                self.commit(&mut state, Screen::Playback, Some(title), 0.0, true)
                    .await
            }
            PlaybackEvent::Progress {
                title,
                elapsed_secs,
                duration_secs,
                progress,
                ..
            } => {
                let same_title = state.snapshot.screen == Screen::Playback
                    && state.snapshot.last_rendered_title.as_deref() == Some(title.as_str());
                if !same_title {
                    layout::draw_playback(
                        &mut state.canvas,
                        title,
                        *elapsed_secs,
                        *duration_secs,
                        *progress,
                    );
                    return self
                        .commit(&mut state, Screen::Playback, Some(title), *progress, true)
                        .await;
                }

                if !self.partial_due(&state.snapshot, *progress) {
                    trace!(progress, "Progress refresh throttled");
                    return Refresh::Skipped;
                }
                layout::draw_progress(&mut state.canvas, *elapsed_secs, *duration_secs, *progress);
                self.commit(&mut state, Screen::Playback, Some(title), *progress, false)
                    .await
            }
            PlaybackEvent::Stopped { reason, .. } => {
                if *reason == StopReason::Superseded {
                    // The next Loading repaints the whole panel.
                    return Refresh::Skipped;
                }
                self.standby(&mut state).await
            }
            PlaybackEvent::Error { message, .. } => {
                layout::draw_error(&mut state.canvas, message);
                self.commit(&mut state, Screen::Error, None, 0.0, true).await
            }
        }
    }

    fn partial_due(&self, snapshot: &DisplaySnapshot, progress: f64) -> bool {
        if (progress - snapshot.last_rendered_progress).abs() >= self.config.progress_epsilon {
            return true;
        }
        let Some(last) = snapshot.last_rendered_at else {
            return true;
        };
        let since = (self.clock.now() - last).to_std().unwrap_or(Duration::ZERO);
        since >= self.config.render_throttle
    }

    async fn standby(&self, state: &mut PresenterState) -> Refresh {
        if state.closing || state.snapshot.screen == Screen::Standby {
            return Refresh::Skipped;
        }
        layout::draw_standby(&mut state.canvas);
        self.commit(state, Screen::Standby, None, 0.0, true).await
    }

    async fn commit(
        &self,
        state: &mut PresenterState,
        screen: Screen,
        title: Option<&String>,
        progress: f64,
        full_refresh: bool,
    ) -> Refresh {
        if let Err(e) = self.driver.render(state.canvas.bitmap(), full_refresh).await {
            warn!(?screen, full_refresh, error = %e, "Display refresh failed");
            return Refresh::Failed;
        }

        let snapshot = &mut state.snapshot;
        snapshot.screen = screen;
        snapshot.last_rendered_title = title.cloned();
        snapshot.last_rendered_progress = progress;
        snapshot.last_rendered_at = Some(self.clock.now());
        if full_refresh {
            snapshot.full_refreshes += 1;
            debug!(?screen, "Full refresh");
            Refresh::Full
        } else {
            snapshot.partial_refreshes += 1;
            debug!(progress, "Partial refresh");
            Refresh::Partial
        }
    }
}

#[async_trait]
impl EventHandler for DisplayPresenter {
    async fn handle(&self, event: CoreEvent) {
        self.present(&event).await;
    }
}
