use thiserror::Error;

/// Errors raised by the runtime layer (configuration, logging, event bus).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Event subscriber for {kind} could not be registered: {reason}")]
    Subscription { kind: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
