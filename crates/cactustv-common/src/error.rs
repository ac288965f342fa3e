//! Unified error type for cactustv.
//!
//! Streaming failures are funnelled into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

/// Common error type for cactustv.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "media").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A stream did not become ready within the wait bound.
    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout {
        /// What was being waited for.
        what: String,
        /// The bound that elapsed, in whole seconds.
        secs: u64,
    },

    /// The encoder exited (or was stopped) before producing a manifest.
    #[error("Encode failed for {key}: {reason}")]
    EncodeFailed {
        /// The stream key the encoder was working on.
        key: String,
        /// The underlying failure message.
        reason: String,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::InvalidInput(_) => 400,
            Error::Timeout { .. } => 500,
            Error::EncodeFailed { .. } => 500,
            Error::Io(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new Timeout error.
    pub fn timeout(what: impl Into<String>, bound: std::time::Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            secs: bound.as_secs(),
        }
    }

    /// Create a new EncodeFailed error.
    pub fn encode_failed(key: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
