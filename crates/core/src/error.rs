//! Storage error model.

use thiserror::Error;

/// Result type returned by every store trait.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a persistence collaborator.
///
/// Kept deliberately coarse: callers wrap these into their own error types and
/// only the message text travels further (as a diagnostic).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record was rejected (duplicate key, malformed field, ...).
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record to update or delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record changed since it was read; the write was not applied.
    #[error("conflicting update: {0}")]
    Conflict(String),

    /// The backing store could not be reached or is in a broken state.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(vec![msg.into()])
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
