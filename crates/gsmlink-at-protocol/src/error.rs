//! Error types for the AT protocol.

use thiserror::Error;

/// Errors produced while classifying or parsing phone responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtError {
    /// The phone answered with a bare `ERROR`.
    #[error("phone reported a generic error")]
    GenericProtocol,

    /// The phone answered with `+CMS ERROR: <code>`.
    #[error("message service error {code}")]
    MessageService {
        /// Numeric error code as sent by the phone.
        code: u32,
    },

    /// The phone answered with `+CME ERROR: <code>`.
    #[error("mobile equipment error {code}")]
    Equipment {
        /// Numeric error code as sent by the phone.
        code: u32,
    },

    /// No response arrived.
    #[error("timeout waiting for response")]
    Timeout,

    /// Non-empty text that matches no known response shape.
    #[error("unexpected response: {raw:?}")]
    UnexpectedResponse {
        /// The raw text, for diagnostics.
        raw: String,
    },

    /// A successful response whose payload could not be parsed.
    #[error("failed to parse response: {0}")]
    ParseError(String),
}

/// Result type alias for AT protocol operations.
pub type AtResult<T> = Result<T, AtError>;
