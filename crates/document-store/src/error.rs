use thiserror::Error;

use crate::{DocumentId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The stored version did not match the version the write was computed from.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: DocumentId,
        expected: Version,
        actual: Version,
    },

    /// An update targeted a document that does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: DocumentId },

    /// An insert targeted an id that is already taken.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: DocumentId },

    /// An insert broke a uniqueness rule on the document body.
    #[error("Unique constraint {constraint} violated in {collection}")]
    UniqueViolation {
        collection: String,
        constraint: String,
    },

    /// The write batch itself was malformed.
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;
