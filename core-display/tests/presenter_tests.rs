//! Tests for refresh decisions of the display presenter
//!
//! Uses the simulated panel from the desktop bridge and a manual clock.

use bridge_desktop::SimulatedDisplay;
use bridge_traits::ManualClock;
use chrono::Duration as ChronoDuration;
use core_display::{DisplayConfig, DisplayPresenter, Refresh, Screen};
use core_runtime::events::{CoreEvent, EventBus, EventKind, MediaEvent, PlaybackEvent, StopReason};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    presenter: DisplayPresenter,
    panel: Arc<SimulatedDisplay>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let panel = Arc::new(SimulatedDisplay::new(250, 122));
    let clock = Arc::new(ManualClock::default());
    let presenter = DisplayPresenter::new(DisplayConfig::default(), panel.clone())
        .unwrap()
        .with_clock(clock.clone());
    Harness {
        presenter,
        panel,
        clock,
    }
}

fn loading() -> CoreEvent {
    PlaybackEvent::Loading {
        key: "k".into(),
        source_url: "https://music.youtube.com/watch?v=a".into(),
    }
    .into()
}

fn started(title: &str, duration_secs: u64) -> CoreEvent {
    PlaybackEvent::Started {
        key: "k".into(),
        title: title.into(),
        duration_secs,
    }
    .into()
}

fn progress(title: &str, elapsed_secs: u64, duration_secs: u64) -> CoreEvent {
    PlaybackEvent::Progress {
        key: "k".into(),
        title: title.into(),
        elapsed_secs,
        duration_secs,
        progress: elapsed_secs as f64 / duration_secs as f64,
    }
    .into()
}

fn stopped(reason: StopReason) -> CoreEvent {
    PlaybackEvent::Stopped {
        key: "k".into(),
        reason,
    }
    .into()
}

#[tokio::test]
async fn loading_and_started_are_full_refreshes() {
    let h = harness();

    assert_eq!(h.presenter.present(&loading()).await, Refresh::Full);
    assert_eq!(h.presenter.snapshot().await.screen, Screen::Loading);

    assert_eq!(h.presenter.present(&started("Song A", 125)).await, Refresh::Full);
    let snapshot = h.presenter.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Playback);
    assert_eq!(snapshot.last_rendered_title.as_deref(), Some("Song A"));
    assert_eq!(snapshot.last_rendered_progress, 0.0);
    assert_eq!(h.panel.full_refresh_count(), 2);
}

#[tokio::test]
async fn progress_is_throttled_by_time() {
    let h = harness();
    h.presenter.present(&started("Song A", 1000)).await;

    // 1s later, 0.1% further: nothing to do
    h.clock.advance(ChronoDuration::seconds(1));
    assert_eq!(h.presenter.present(&progress("Song A", 1, 1000)).await, Refresh::Skipped);

    h.clock.advance(ChronoDuration::seconds(8));
    assert_eq!(h.presenter.present(&progress("Song A", 9, 1000)).await, Refresh::Skipped);

    // 10s after the last render
    h.clock.advance(ChronoDuration::seconds(1));
    assert_eq!(h.presenter.present(&progress("Song A", 10, 1000)).await, Refresh::Partial);

    let snapshot = h.presenter.snapshot().await;
    assert!((snapshot.last_rendered_progress - 0.01).abs() < 1e-9);
    assert_eq!(h.panel.partial_refresh_count(), 1);
    assert_eq!(h.panel.full_refresh_count(), 1);
}

#[tokio::test]
async fn large_progress_jump_refreshes_inside_throttle_window() {
    let h = harness();
    h.presenter.present(&started("Short", 10)).await;

    // Each second moves the bar by 0.1, more than the 0.05 epsilon.
    h.clock.advance(ChronoDuration::seconds(1));
    assert_eq!(h.presenter.present(&progress("Short", 1, 10)).await, Refresh::Partial);
    h.clock.advance(ChronoDuration::seconds(1));
    assert_eq!(h.presenter.present(&progress("Short", 2, 10)).await, Refresh::Partial);
}

#[tokio::test]
async fn title_change_forces_full_refresh() {
    let h = harness();
    h.presenter.present(&started("Song A", 1000)).await;
    h.clock.advance(ChronoDuration::seconds(1));

    assert_eq!(h.presenter.present(&progress("Song B", 1, 1000)).await, Refresh::Full);
    assert_eq!(
        h.presenter.snapshot().await.last_rendered_title.as_deref(),
        Some("Song B")
    );
}

#[tokio::test]
async fn stopped_shows_standby_once() {
    let h = harness();
    h.presenter.present(&started("Song A", 125)).await;

    assert_eq!(h.presenter.present(&stopped(StopReason::Finished)).await, Refresh::Full);
    assert_eq!(h.presenter.present(&stopped(StopReason::Requested)).await, Refresh::Skipped);
    assert_eq!(h.presenter.snapshot().await.screen, Screen::Standby);
    assert_eq!(h.presenter.show_standby().await, Refresh::Skipped);
    assert_eq!(h.panel.full_refresh_count(), 2);
}

#[tokio::test]
async fn superseded_stop_keeps_the_panel() {
    let h = harness();
    h.presenter.present(&started("Song A", 125)).await;

    assert_eq!(
        h.presenter.present(&stopped(StopReason::Superseded)).await,
        Refresh::Skipped
    );
    assert_eq!(h.presenter.snapshot().await.screen, Screen::Playback);
}

#[tokio::test]
async fn error_screen() {
    let h = harness();
    let event: CoreEvent = PlaybackEvent::Error {
        key: Some("k".into()),
        message: "Network error: connection reset".into(),
    }
    .into();

    assert_eq!(h.presenter.present(&event).await, Refresh::Full);
    assert_eq!(h.presenter.snapshot().await.screen, Screen::Error);
    assert!(h.panel.last_frame().unwrap().black_pixel_count() > 0);
}

#[tokio::test]
async fn media_events_are_ignored() {
    let h = harness();
    let event: CoreEvent = MediaEvent::CacheCleared { removed: 3 }.into();
    assert_eq!(h.presenter.present(&event).await, Refresh::Skipped);
    assert_eq!(h.panel.render_count(), 0);
}

#[tokio::test]
async fn render_failure_is_swallowed_and_retried() {
    let h = harness();
    h.panel.fail_next_renders(1);

    assert_eq!(h.presenter.present(&started("Song A", 125)).await, Refresh::Failed);
    let snapshot = h.presenter.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Blank);
    assert_eq!(snapshot.full_refreshes, 0);

    // Same title, but nothing was rendered yet: full refresh.
    h.clock.advance(ChronoDuration::seconds(1));
    assert_eq!(h.presenter.present(&progress("Song A", 1, 125)).await, Refresh::Full);
}

#[tokio::test]
async fn custom_throttle_and_epsilon() {
    let panel = Arc::new(SimulatedDisplay::new(250, 122));
    let clock = Arc::new(ManualClock::default());
    let presenter = DisplayPresenter::new(
        DisplayConfig::default()
            .with_render_throttle(Duration::from_secs(2))
            .with_progress_epsilon(0.5),
        panel.clone(),
    )
    .unwrap()
    .with_clock(clock.clone());

    presenter.present(&started("Song A", 1000)).await;
    clock.advance(ChronoDuration::seconds(2));
    assert_eq!(presenter.present(&progress("Song A", 2, 1000)).await, Refresh::Partial);
}

#[tokio::test]
async fn too_small_panel_is_rejected() {
    let panel = Arc::new(SimulatedDisplay::new(16, 16));
    assert!(DisplayPresenter::new(DisplayConfig::default(), panel).is_err());
}

#[tokio::test]
async fn close_shows_standby_then_sleeps() {
    let h = harness();
    h.presenter.present(&started("Song A", 125)).await;

    h.presenter.close().await.unwrap();
    assert!(h.panel.is_asleep());
    assert_eq!(h.presenter.snapshot().await.screen, Screen::Standby);
    assert_eq!(h.panel.full_refresh_count(), 2);

    let renders = h.panel.render_count();
    h.clock.advance(ChronoDuration::seconds(30));
    assert_eq!(h.presenter.present(&progress("Song A", 30, 125)).await, Refresh::Skipped);
    assert_eq!(h.presenter.show_standby().await, Refresh::Skipped);
    h.presenter.close().await.unwrap();
    assert_eq!(h.panel.render_count(), renders);
}

#[tokio::test(start_paused = true)]
async fn events_queued_before_close_do_not_repaint() {
    let panel =
        Arc::new(SimulatedDisplay::new(250, 122).with_refresh_delay(Duration::from_secs(3)));
    let presenter =
        Arc::new(DisplayPresenter::new(DisplayConfig::default(), panel.clone()).unwrap());
    let bus = EventBus::new();
    bus.subscribe(EventKind::PLAYBACK, presenter.clone()).unwrap();

    bus.emit(PlaybackEvent::Started {
        key: "k".into(),
        title: "Song A".into(),
        duration_secs: 125,
    });
    // Let the subscriber task start the slow Started refresh.
    tokio::time::sleep(Duration::from_millis(100)).await;
    // A new title would force a full repaint if these got through.
    for elapsed_secs in 1..=3 {
        bus.emit(progress("Song B", elapsed_secs, 125));
    }

    presenter.close().await.unwrap();
    // Give the queued ticks every chance to run.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(panel.is_asleep());
    let snapshot = presenter.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Standby);
    assert_eq!(snapshot.last_rendered_title, None);
    assert_eq!(panel.full_refresh_count(), 2);
}

#[tokio::test]
async fn presenter_as_event_subscriber() {
    let h = harness();
    let presenter = Arc::new(h.presenter);
    let bus = EventBus::new();
    bus.subscribe(EventKind::PLAYBACK, presenter.clone()).unwrap();

    bus.emit(PlaybackEvent::Loading {
        key: "k".into(),
        source_url: "https://music.youtube.com/watch?v=a".into(),
    });
    bus.emit(PlaybackEvent::Started {
        key: "k".into(),
        title: "Song A".into(),
        duration_secs: 125,
    });

    for _ in 0..100 {
        if h.panel.full_refresh_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.panel.full_refresh_count(), 2);
    assert_eq!(presenter.snapshot().await.screen, Screen::Playback);
}

#[tokio::test]
async fn snapshot_serializes_for_status_pages() {
    let h = harness();
    h.presenter.present(&started("Song A", 125)).await;

    let json = serde_json::to_value(h.presenter.snapshot().await).unwrap();
    assert_eq!(json["screen"], "playback");
    assert_eq!(json["lastRenderedTitle"], "Song A");
    assert_eq!(json["fullRefreshes"], 1);
    assert_eq!(json["partialRefreshes"], 0);
}
