//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the appliance core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Typed event bus with per-subscriber queues
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback, display and
//! service crates depend on. It establishes the logging conventions, the
//! configuration defaults and the event routing used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
