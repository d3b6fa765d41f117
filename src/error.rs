//! Error types for the echoverse library.
//!
//! This module provides custom error types using `thiserror` so callers can
//! tell bad user input apart from refused access and unavailable storage.

use thiserror::Error;

use crate::models::EntryId;
use crate::validation::ValidationError;

/// Errors that can occur in the echoverse application.
#[derive(Error, Debug)]
pub enum EchoVerseError {
    /// A draft or user input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registration or login failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An entry was accessed by someone other than its owner.
    ///
    /// The message deliberately carries no detail about the entry.
    #[error("Action not permitted")]
    Unauthorized,

    /// No entry with this id exists for the current user
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    /// The entry is still locked
    #[error("Entry is still locked ({days_remaining} days remaining)")]
    EntryLocked {
        /// Days until the entry unlocks, clamped at zero
        days_remaining: i64,
    },

    /// The storage collaborator failed to read or write
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Audio capture failed
    #[error("Recording error: {0}")]
    Recording(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Another account already uses this email (compared case-insensitively)
    #[error("An account with this email already exists")]
    EmailTaken,

    /// Email/password pair did not match a stored account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The operation needs a logged-in user
    #[error("Not logged in")]
    NotLoggedIn,

    /// Registration or profile input was rejected
    #[error("{0}")]
    InvalidInput(String),

    /// Password hashing failed
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Convenience type alias for Result with EchoVerseError
pub type Result<T> = std::result::Result<T, EchoVerseError>;

impl From<anyhow::Error> for EchoVerseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<sled::Error> for EchoVerseError {
    fn from(err: sled::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for EchoVerseError {
    fn from(err: bincode::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
