//! Shared primitives for all Rust crates in Lakewarden.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across Lakewarden crates.
pub type AppResult<T> = Result<T, AppError>;

/// Identifier of a locally persisted permission intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentId(Uuid);

impl IntentId {
    /// Creates a random intent identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an intent identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for IntentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One failed item inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Zero-based position of the item in the submitted batch.
    pub index: usize,
    /// Failure description for the item.
    pub message: String,
}

impl Display for BatchItemError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "item {}: {}", self.index, self.message)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant. Rejected before any remote call
    /// and never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient failure talking to an external collaborator; safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Remote synchronization failed after exhausting the retry budget.
    #[error("synchronization failed after {attempts} attempts: {message}")]
    SyncFailed {
        /// Attempts consumed before giving up.
        attempts: u32,
        /// Last observed failure.
        message: String,
    },

    /// One or more items of a batch operation failed.
    #[error("batch failed: {}", format_batch_errors(.0))]
    PartialBatch(Vec<BatchItemError>),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether retrying the failed operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

fn format_batch_errors(errors: &[BatchItemError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
