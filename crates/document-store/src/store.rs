use std::collections::HashSet;

use async_trait::async_trait;

use crate::{DocumentEnvelope, DocumentId, DocumentQuery, DocumentStoreError, Result, Version};

/// A single write in a commit batch.
#[derive(Debug, Clone)]
pub enum DocumentWrite {
    /// Store a new document. Fails if the id is already taken.
    Insert(DocumentEnvelope),

    /// Replace the body of an existing document, provided it is still at
    /// `expected_version`.
    Update {
        document: DocumentEnvelope,
        expected_version: Version,
    },
}

impl DocumentWrite {
    /// Creates an insert write.
    pub fn insert(document: DocumentEnvelope) -> Self {
        DocumentWrite::Insert(document)
    }

    /// Creates a version-checked update write.
    pub fn update(document: DocumentEnvelope, expected_version: Version) -> Self {
        DocumentWrite::Update {
            document,
            expected_version,
        }
    }

    /// Returns the document being written.
    pub fn document(&self) -> &DocumentEnvelope {
        match self {
            DocumentWrite::Insert(document) => document,
            DocumentWrite::Update { document, .. } => document,
        }
    }
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Applies a batch of writes.
    ///
    /// The batch is atomic: either every write is applied or none is. An
    /// update whose document is no longer at its expected version fails the
    /// whole batch with `ConcurrencyConflict`.
    ///
    /// Returns the stored envelopes, in batch order, with their new versions
    /// and timestamps.
    async fn commit(&self, writes: Vec<DocumentWrite>) -> Result<Vec<DocumentEnvelope>>;

    /// Retrieves a document by id.
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<DocumentEnvelope>>;

    /// Retrieves the documents matching a query, ordered and paged as requested.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<DocumentEnvelope>>;

    /// Counts the documents matching a query, ignoring its limit and offset.
    async fn count(&self, query: DocumentQuery) -> Result<u64>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Inserts a single new document.
    async fn insert(&self, document: DocumentEnvelope) -> Result<DocumentEnvelope> {
        single(self.commit(vec![DocumentWrite::insert(document)]).await?)
    }

    /// Updates a single document if it is still at `expected_version`.
    async fn update(
        &self,
        document: DocumentEnvelope,
        expected_version: Version,
    ) -> Result<DocumentEnvelope> {
        single(
            self.commit(vec![DocumentWrite::update(document, expected_version)])
                .await?,
        )
    }

    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: DocumentId) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Returns the first document matching a query.
    async fn find_one(&self, query: DocumentQuery) -> Result<Option<DocumentEnvelope>> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

fn single(mut stored: Vec<DocumentEnvelope>) -> Result<DocumentEnvelope> {
    stored
        .pop()
        .ok_or_else(|| DocumentStoreError::InvalidWrite("commit returned no document".to_string()))
}

/// Validates a write batch before it is applied.
pub fn validate_writes(writes: &[DocumentWrite]) -> Result<()> {
    if writes.is_empty() {
        return Err(DocumentStoreError::InvalidWrite(
            "Cannot commit an empty write batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(writes.len());
    for write in writes {
        let document = write.document();
        if document.collection.is_empty() {
            return Err(DocumentStoreError::InvalidWrite(
                "Collection name must not be empty".to_string(),
            ));
        }
        if !seen.insert((document.collection.as_str(), document.id)) {
            return Err(DocumentStoreError::InvalidWrite(format!(
                "Document {}/{} written twice in one batch",
                document.collection, document.id
            )));
        }
        if let DocumentWrite::Update {
            expected_version, ..
        } = write
            && *expected_version < Version::first()
        {
            return Err(DocumentStoreError::InvalidWrite(format!(
                "Update of {}/{} must expect a stored version",
                document.collection, document.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(collection: &str, id: DocumentId) -> DocumentEnvelope {
        DocumentEnvelope::new(collection, id, serde_json::json!({}))
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_writes(&[]),
            Err(DocumentStoreError::InvalidWrite(_))
        ));
    }

    #[test]
    fn duplicate_document_in_batch_is_rejected() {
        let id = DocumentId::new();
        let writes = vec![
            DocumentWrite::insert(doc("orders", id)),
            DocumentWrite::update(doc("orders", id), Version::first()),
        ];
        assert!(validate_writes(&writes).is_err());
    }

    #[test]
    fn same_id_in_different_collections_is_allowed() {
        let id = DocumentId::new();
        let writes = vec![
            DocumentWrite::insert(doc("orders", id)),
            DocumentWrite::insert(doc("pharmacies", id)),
        ];
        assert!(validate_writes(&writes).is_ok());
    }

    #[test]
    fn update_must_expect_a_stored_version() {
        let writes = vec![DocumentWrite::update(
            doc("orders", DocumentId::new()),
            Version::initial(),
        )];
        assert!(validate_writes(&writes).is_err());
    }
}
