//! Canonical error type for distkv.
//!
//! Every crate in the workspace converts its local errors into [`Error`],
//! so callers branch on one enum regardless of which layer failed.
//!
//! ## Error Codes
//!
//! | Code | Variant | Meaning |
//! |------|---------|---------|
//! | 401 | InvalidArgument | null, missing or malformed parameter |
//! | 404 | NotFound | absent key, device, store |
//! | 409 | InvalidState | operation invalid in the current lifecycle state |
//! | 500 | Storage | storage or snapshot failure |
//! | 501 | Serialization | encoding/decoding failure |
//! | 502 | Io | filesystem failure |
//! | 599 | Internal | bug or invariant violation |

use thiserror::Error;

/// All distkv errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Null, missing or malformed parameter
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Key, device or store not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid in the current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for distkv operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Shorthand for [`Error::InvalidState`].
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Numeric error code carried to loosely typed callers.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 401,
            Error::NotFound(_) => 404,
            Error::InvalidState(_) => 409,
            Error::Storage(_) => 500,
            Error::Serialization(_) => 501,
            Error::Io(_) => 502,
            Error::Internal(_) => 599,
        }
    }

    /// Canonical name of the error kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::NotFound(_) => "NotFound",
            Error::InvalidState(_) => "InvalidState",
            Error::Storage(_) => "Storage",
            Error::Serialization(_) => "Serialization",
            Error::Io(_) => "Io",
            Error::Internal(_) => "Internal",
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is an invalid-argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    /// Check if this is an invalid-state error.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Storage(_))
    }
}
