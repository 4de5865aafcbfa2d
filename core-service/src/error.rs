use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Display error: {0}")]
    Display(#[from] core_display::DisplayError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    /// Whether the player behind the context has gone away.
    pub fn is_session_closed(&self) -> bool {
        matches!(
            self,
            CoreError::Playback(core_playback::PlaybackError::SessionClosed)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
