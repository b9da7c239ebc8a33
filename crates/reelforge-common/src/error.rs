//! Common error types used throughout reelforge.
//!
//! This module provides a unified error type for queue storage and
//! filesystem failures, including the status-conflict case raised by
//! status-checked writes.

use crate::types::ItemStatus;

/// Common error type for reelforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested item was not found.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// A status-checked write found a different status than expected.
    #[error("Status conflict for item {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: ItemStatus,
        actual: ItemStatus,
    },

    /// The requested status change is not part of the item lifecycle.
    #[error("Invalid transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ItemStatus,
        to: ItemStatus,
    },

    /// The backing store could not be reached or rejected the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(id: S, expected: ItemStatus, actual: ItemStatus) -> Self {
        Self::Conflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Whether this error came from a lost status-checked write.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
