//! # Screen Layouts
//!
//! Drawing routines for every screen the appliance shows. Coordinates are
//! top-left anchored and sized for the 250x122 panel; wider or narrower
//! panels stretch the title width and progress bar.
//!
//! ```text
//!  (10,10)  Title of the current track...
//!
//!  (10,50)  ┌──────────────────────────────┐
//!           │██████████████                │  progress bar, 10px high
//!           └──────────────────────────────┘
//!  (10,70)  1:05 / 2:05
//! ```

use crate::canvas::Canvas;
use crate::text::{format_progress_time, text_width, truncate_to_width};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_6X10, FONT_9X18_BOLD},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::{Point, Primitive, Size},
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
    Drawable,
};

/// Left margin of every screen.
pub const MARGIN: i32 = 10;
/// Top of the progress bar.
pub const BAR_TOP: i32 = 50;
/// Height of the progress bar.
pub const BAR_HEIGHT: u32 = 10;
/// Top of the elapsed/total time line.
pub const TIME_TOP: i32 = 70;

pub const TITLE_FONT: &MonoFont<'static> = &FONT_9X18_BOLD;
pub const BODY_FONT: &MonoFont<'static> = &FONT_6X10;

/// Idle screen shown when nothing is playing.
pub fn draw_standby(canvas: &mut Canvas) {
    canvas.wipe();
    draw_text(canvas, "Audio Player", Point::new(MARGIN, 30), TITLE_FONT);
    draw_text(canvas, "Ready to play", Point::new(MARGIN, 60), BODY_FONT);
}

/// Shown while a reference is being fetched. `detail` is truncated to fit.
pub fn draw_loading(canvas: &mut Canvas, detail: &str) {
    canvas.wipe();
    draw_text(canvas, "Downloading...", Point::new(MARGIN, 30), TITLE_FONT);
    let detail = fit(canvas, detail, BODY_FONT);
    draw_text(canvas, &detail, Point::new(MARGIN, 60), BODY_FONT);
}

/// Full playback screen: title, progress bar and time.
pub fn draw_playback(
    canvas: &mut Canvas,
    title: &str,
    elapsed_secs: u64,
    duration_secs: u64,
    progress: f64,
) {
    canvas.wipe();
    let title = fit(canvas, title, TITLE_FONT);
    draw_text(canvas, &title, Point::new(MARGIN, 10), TITLE_FONT);
    draw_progress(canvas, elapsed_secs, duration_secs, progress);
}

/// Repaint only the progress bar and time line, leaving the title intact.
pub fn draw_progress(canvas: &mut Canvas, elapsed_secs: u64, duration_secs: u64, progress: f64) {
    let region = progress_region(canvas);
    fill(canvas, region, BinaryColor::Off);

    let bar_width = bar_width(canvas);
    Rectangle::new(Point::new(MARGIN, BAR_TOP), Size::new(bar_width, BAR_HEIGHT))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(canvas)
        .ok();

    let filled = filled_width(bar_width, progress);
    if filled > 0 {
        fill(
            canvas,
            Rectangle::new(Point::new(MARGIN, BAR_TOP), Size::new(filled, BAR_HEIGHT)),
            BinaryColor::On,
        );
    }

    let time = format_progress_time(elapsed_secs, duration_secs);
    draw_text(canvas, &time, Point::new(MARGIN, TIME_TOP), BODY_FONT);
}

/// Error screen with the failure message.
pub fn draw_error(canvas: &mut Canvas, message: &str) {
    canvas.wipe();
    draw_text(canvas, "Playback error", Point::new(MARGIN, 30), TITLE_FONT);
    let message = fit(canvas, message, BODY_FONT);
    draw_text(canvas, &message, Point::new(MARGIN, 60), BODY_FONT);
}

/// Area repainted by [`draw_progress`]: from the bar to the bottom edge.
pub fn progress_region(canvas: &Canvas) -> Rectangle {
    let height = canvas.height().saturating_sub(BAR_TOP as u32);
    Rectangle::new(Point::new(0, BAR_TOP), Size::new(canvas.width(), height))
}

/// Width of the progress bar (panel width minus both margins).
pub fn bar_width(canvas: &Canvas) -> u32 {
    canvas.width().saturating_sub(2 * MARGIN as u32)
}

/// Filled part of a bar, `floor(progress * width)`.
pub fn filled_width(bar_width: u32, progress: f64) -> u32 {
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (progress * bar_width as f64).floor() as u32
}

fn fit(canvas: &Canvas, text: &str, font: &MonoFont<'_>) -> String {
    let max_width = canvas.width().saturating_sub(2 * MARGIN as u32);
    truncate_to_width(text, max_width, |s| text_width(s, font))
}

fn draw_text(canvas: &mut Canvas, text: &str, position: Point, font: &MonoFont<'_>) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    Text::with_baseline(text, position, style, Baseline::Top)
        .draw(canvas)
        .ok();
}

fn fill(canvas: &mut Canvas, area: Rectangle, color: BinaryColor) {
    area.into_styled(PrimitiveStyle::with_fill(color))
        .draw(canvas)
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_in(canvas: &Canvas, x: std::ops::Range<u32>, y: std::ops::Range<u32>) -> usize {
        y.flat_map(|py| x.clone().map(move |px| (px, py)))
            .filter(|&(px, py)| canvas.bitmap().is_black(px, py))
            .count()
    }

    #[test]
    fn standby_draws_text_in_text_rows_only() {
        let mut canvas = Canvas::new(250, 122);
        draw_standby(&mut canvas);

        assert!(black_in(&canvas, 0..250, 30..48) > 0);
        assert!(black_in(&canvas, 0..250, 60..70) > 0);
        assert_eq!(black_in(&canvas, 0..250, 0..30), 0);
        assert_eq!(black_in(&canvas, 0..10, 0..122), 0);
    }

    #[test]
    fn progress_bar_fill_matches_ratio() {
        let mut canvas = Canvas::new(250, 122);
        draw_playback(&mut canvas, "Song A", 65, 125, 0.52);

        // 230px bar, floor(0.52 * 230) = 119 filled
        assert_eq!(filled_width(230, 0.52), 119);
        let mid = (BAR_TOP + 5) as u32;
        assert!(canvas.bitmap().is_black(10, mid));
        assert!(canvas.bitmap().is_black(128, mid));
        assert!(!canvas.bitmap().is_black(129, mid));
        assert!(!canvas.bitmap().is_black(200, mid));
        // right edge of the outline
        assert!(canvas.bitmap().is_black(239, mid));
        assert!(!canvas.bitmap().is_black(240, mid));
    }

    #[test]
    fn partial_repaint_keeps_title() {
        let mut canvas = Canvas::new(250, 122);
        draw_playback(&mut canvas, "Song A", 0, 125, 0.0);
        let title_ink = black_in(&canvas, 0..250, 0..BAR_TOP as u32);
        assert!(title_ink > 0);

        draw_progress(&mut canvas, 125, 125, 1.0);
        assert_eq!(black_in(&canvas, 0..250, 0..BAR_TOP as u32), title_ink);
        assert_eq!(
            black_in(&canvas, 10..240, BAR_TOP as u32..BAR_TOP as u32 + BAR_HEIGHT),
            230 * BAR_HEIGHT as usize
        );
    }

    #[test]
    fn fill_width_is_clamped() {
        assert_eq!(filled_width(230, -0.5), 0);
        assert_eq!(filled_width(230, 1.7), 230);
        assert_eq!(filled_width(230, f64::NAN), 0);
    }

    #[test]
    fn long_titles_stay_inside_margins() {
        let mut canvas = Canvas::new(250, 122);
        draw_playback(
            &mut canvas,
            "An extraordinarily long track title that cannot possibly fit",
            0,
            0,
            0.0,
        );
        assert_eq!(black_in(&canvas, 240..250, 0..BAR_TOP as u32), 0);
    }
}
