//! Domain error types.

use document_store::DocumentStoreError;
use thiserror::Error;

use crate::access::AuthFailure;
use crate::order::OrderError;
use crate::stock::StockError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order operation was rejected.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A stock operation was rejected.
    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    /// A referenced pharmacy, order or medicine does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The credential did not resolve to an active actor.
    #[error("Authentication failed: {0}")]
    Unauthenticated(#[from] AuthFailure),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns true if the write lost a race against a concurrent modification.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. })
        )
    }
}
