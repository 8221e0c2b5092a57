//! # Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a graph store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transaction aborted by a concurrent commit; safe to retry
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// Query could not be evaluated
    #[error("Query failed: {0}")]
    Query(String),

    /// Mutation could not be applied
    #[error("Mutation failed: {0}")]
    Mutation(String),

    /// Schema alteration rejected
    #[error("Schema alteration failed: {0}")]
    Schema(String),

    /// Store unreachable or closed
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StoreError::Aborted(_))
    }
}
