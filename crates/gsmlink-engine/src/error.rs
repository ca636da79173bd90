//! Error types for the engine.

use gsmlink_at_protocol::AtError;
use thiserror::Error;

/// Errors surfaced to callers of a [`Session`](crate::Session).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The phone answered with an error, or with nothing, or with nonsense.
    #[error(transparent)]
    Protocol(#[from] AtError),

    /// The operation was attempted on a closed session.
    #[error("session is not open")]
    NotOpen,

    /// The session is open but no phone is responding.
    #[error("phone is not connected")]
    NotConnected,

    /// Link or thread I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    /// Whether this is a timeout reported by the protocol layer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Protocol(AtError::Timeout))
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
