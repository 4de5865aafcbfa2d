//! Text fitting helpers

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::Point,
    text::{renderer::TextRenderer, Baseline},
};

const ELLIPSIS: &str = "...";

/// Rendered width of `text` in `font`, in pixels.
pub fn text_width(text: &str, font: &MonoFont<'_>) -> u32 {
    MonoTextStyle::new(font, BinaryColor::On)
        .measure_string(text, Point::zero(), Baseline::Top)
        .bounding_box
        .size
        .width
}

/// Shorten `text` until it fits in `max_width`.
///
/// Text that already fits is returned unchanged. Otherwise the longest
/// prefix that still fits with `...` appended is used. If not even `...`
/// fits, the result is empty.
pub fn truncate_to_width<F>(text: &str, max_width: u32, measure: F) -> String
where
    F: Fn(&str) -> u32,
{
    if measure(text) <= max_width {
        return text.to_string();
    }

    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    for &end in boundaries.iter().rev() {
        let candidate = format!("{}{}", &text[..end], ELLIPSIS);
        if measure(&candidate) <= max_width {
            return candidate;
        }
    }
    String::new()
}

/// `m:ss` for a number of seconds.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// `elapsed / duration`, with `--:--` for an unknown duration.
pub fn format_progress_time(elapsed_secs: u64, duration_secs: u64) -> String {
    let total = if duration_secs == 0 {
        "--:--".to_string()
    } else {
        format_clock(duration_secs)
    };
    format!("{} / {}", format_clock(elapsed_secs), total)
}
