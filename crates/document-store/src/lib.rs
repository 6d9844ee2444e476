//! Document store for the pharmacy ordering platform.
//!
//! Documents are JSON bodies grouped into collections. Every document carries a
//! version that the store bumps on each write; updates name the version they
//! were computed from, so a stale writer is rejected instead of overwriting a
//! newer state.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::DocumentId;
pub use document::{DocumentEnvelope, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{DocumentQuery, FieldFilter, SortOrder};
pub use store::{DocumentStore, DocumentStoreExt, DocumentWrite};
