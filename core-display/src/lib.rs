//! # Display Module
//!
//! Renders playback state onto a small monochrome e-paper panel.
//!
//! ## Overview
//!
//! - [`canvas`]: `embedded-graphics` draw target over the bridge frame buffer
//! - [`layout`]: standby, loading, playback and error screens
//! - [`text`]: width-aware truncation and time formatting
//! - [`presenter`]: event handler deciding when and how to refresh
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_display::{DisplayConfig, DisplayPresenter};
//! use core_runtime::events::EventKind;
//!
//! let presenter = Arc::new(DisplayPresenter::new(DisplayConfig::default(), driver)?);
//! presenter.show_standby().await;
//! events.subscribe(EventKind::PLAYBACK, presenter.clone())?;
//! ```

pub mod canvas;
pub mod error;
pub mod layout;
pub mod presenter;
pub mod text;

pub use canvas::Canvas;
pub use error::{DisplayError, Result};
pub use presenter::{
    DisplayConfig, DisplayPresenter, DisplaySnapshot, Refresh, Screen, DEFAULT_PANEL_HEIGHT,
    DEFAULT_PANEL_WIDTH,
};
pub use text::truncate_to_width;
