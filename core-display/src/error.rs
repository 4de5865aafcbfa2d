//! Display error types

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    /// The panel driver rejected a frame or failed to refresh.
    #[error("Display driver error: {0}")]
    Driver(#[from] BridgeError),

    #[error("Invalid panel dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, DisplayError>;
