//! # Errors
//!
//! Crate-wide error taxonomy. Store failures are wrapped with the name of
//! the operation that issued them and reclassified: aborted transactions
//! become `Conflict`, everything else `Internal`.

use thiserror::Error;

use crate::schema::ValidationError;
use crate::store::StoreError;

/// Result type for equipment operations
pub type EquipResult<T> = Result<T, EquipError>;

/// Errors surfaced by the schema, query and repository layers
#[derive(Debug, Clone, Error)]
pub enum EquipError {
    /// Definition or payload violates a structural rule
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced anchor entity or type does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query was valid but matched nothing
    #[error("No data: {0}")]
    NoData(String),

    /// Store aborted the transaction; retryable
    #[error("{operation}: transaction conflict: {reason}")]
    Conflict { operation: String, reason: String },

    /// Store, serialization or invariant failure
    #[error("{operation}: {reason}")]
    Internal { operation: String, reason: String },
}

impl EquipError {
    pub fn not_found(what: impl Into<String>) -> Self {
        EquipError::NotFound(what.into())
    }

    pub fn no_data(what: impl Into<String>) -> Self {
        EquipError::NoData(what.into())
    }

    pub fn internal(operation: impl Into<String>, reason: impl ToString) -> Self {
        EquipError::Internal {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a store failure with the operation that issued it
    pub fn store(operation: impl Into<String>, err: StoreError) -> Self {
        let operation = operation.into();
        if err.is_aborted() {
            EquipError::Conflict {
                operation,
                reason: err.to_string(),
            }
        } else {
            EquipError::Internal {
                operation,
                reason: err.to_string(),
            }
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            EquipError::Validation(_) => "EQP_VALIDATION_FAILED",
            EquipError::NotFound(_) => "EQP_NOT_FOUND",
            EquipError::NoData(_) => "EQP_NO_DATA",
            EquipError::Conflict { .. } => "EQP_CONFLICT",
            EquipError::Internal { .. } => "EQP_INTERNAL",
        }
    }

    /// Returns the HTTP status code a transport layer should use.
    ///
    /// `NoData` is not a failure for the caller: it maps to 200 and is
    /// rendered as an empty list.
    pub fn status_code(&self) -> u16 {
        match self {
            EquipError::Validation(_) => 400,
            EquipError::NotFound(_) => 404,
            EquipError::NoData(_) => 200,
            EquipError::Conflict { .. } => 409,
            EquipError::Internal { .. } => 500,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EquipError::Conflict { .. })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, EquipError::NoData(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EquipError::NotFound(_))
    }

    /// The violated rule, for validation failures
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            EquipError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EquipError {
    fn from(err: serde_json::Error) -> Self {
        EquipError::internal("serialization", err)
    }
}
