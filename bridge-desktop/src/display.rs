//! Simulated e-paper panel for development hosts

use async_trait::async_trait;
use bridge_traits::{
    display::{DisplayDriver, MonoBitmap},
    error::{BridgeError, Result},
};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{info, trace};

#[derive(Default)]
struct PanelState {
    last_frame: Option<MonoBitmap>,
    full_refreshes: usize,
    partial_refreshes: usize,
    asleep: bool,
    failures_remaining: usize,
}

/// In-memory panel that logs every refresh.
///
/// Keeps the last frame and refresh counters so tests and the demo binary can
/// inspect what the presenter sent. An optional refresh delay mimics the
/// seconds-long update of real e-paper hardware.
pub struct SimulatedDisplay {
    width: u32,
    height: u32,
    refresh_delay: Duration,
    state: Mutex<PanelState>,
}

impl SimulatedDisplay {
    /// Panel of the given size (the 2.13" module is 250x122).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            refresh_delay: Duration::ZERO,
            state: Mutex::new(PanelState::default()),
        }
    }

    /// Sleep this long inside every `render` call.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Make the next `count` renders fail.
    pub fn fail_next_renders(&self, count: usize) {
        self.state.lock().failures_remaining = count;
    }

    pub fn last_frame(&self) -> Option<MonoBitmap> {
        self.state.lock().last_frame.clone()
    }

    pub fn full_refresh_count(&self) -> usize {
        self.state.lock().full_refreshes
    }

    pub fn partial_refresh_count(&self) -> usize {
        self.state.lock().partial_refreshes
    }

    pub fn render_count(&self) -> usize {
        let state = self.state.lock();
        state.full_refreshes + state.partial_refreshes
    }

    pub fn is_asleep(&self) -> bool {
        self.state.lock().asleep
    }
}

#[async_trait]
impl DisplayDriver for SimulatedDisplay {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn render(&self, bitmap: &MonoBitmap, full_refresh: bool) -> Result<()> {
        if (bitmap.width(), bitmap.height()) != (self.width, self.height) {
            return Err(BridgeError::OperationFailed(format!(
                "frame is {}x{}, panel is {}x{}",
                bitmap.width(),
                bitmap.height(),
                self.width,
                self.height
            )));
        }

        {
            let mut state = self.state.lock();
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(BridgeError::OperationFailed(
                    "simulated SPI transfer failure".to_string(),
                ));
            }
        }

        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }

        let mut state = self.state.lock();
        state.asleep = false;
        if full_refresh {
            state.full_refreshes += 1;
        } else {
            state.partial_refreshes += 1;
        }
        state.last_frame = Some(bitmap.clone());

        info!(
            full_refresh,
            black_pixels = bitmap.black_pixel_count(),
            "Display updated (simulated)"
        );
        trace!("\n{}", render_ascii(bitmap, 2));
        Ok(())
    }

    async fn sleep(&self) -> Result<()> {
        self.state.lock().asleep = true;
        info!("Display sleeping (simulated)");
        Ok(())
    }
}

/// Downsampled ASCII rendering of a frame (`#` where any pixel in the cell is black).
pub fn render_ascii(bitmap: &MonoBitmap, scale: u32) -> String {
    let scale = scale.max(1);
    let mut out = String::new();
    let mut y = 0;
    while y < bitmap.height() {
        let mut x = 0;
        while x < bitmap.width() {
            let inked = (y..(y + scale).min(bitmap.height()))
                .any(|py| (x..(x + scale).min(bitmap.width())).any(|px| bitmap.is_black(px, py)));
            out.push(if inked { '#' } else { '.' });
            x += scale;
        }
        out.push('\n');
        y += scale;
    }
    out
}
