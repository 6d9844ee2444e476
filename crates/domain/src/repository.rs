//! Typed access to document collections.

use std::marker::PhantomData;
use std::sync::Arc;

use common::DocumentId;
use document_store::{
    DocumentEnvelope, DocumentQuery, DocumentStore, DocumentStoreExt, DocumentWrite, Version,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// A value stored as one document of a collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the documents are stored in.
    const COLLECTION: &'static str;

    /// Name used in not-found errors.
    const KIND: &'static str;

    fn document_id(&self) -> DocumentId;
}

/// A loaded document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<D> {
    pub value: D,
    pub version: Version,
}

/// Loads and persists one document type.
///
/// Every update names the version it was computed from, so two writers racing
/// on the same document can never both succeed.
pub struct Repository<S, D> {
    store: Arc<S>,
    _phantom: PhantomData<fn() -> D>,
}

impl<S, D> Clone for Repository<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _phantom: PhantomData,
        }
    }
}

impl<S, D> Repository<S, D>
where
    S: DocumentStore,
    D: Document,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Starts a query over this collection.
    pub fn query(&self) -> DocumentQuery {
        DocumentQuery::new(D::COLLECTION)
    }

    /// Loads a document, returning None if it doesn't exist.
    pub async fn load(&self, id: DocumentId) -> Result<Option<Versioned<D>>, DomainError> {
        self.store
            .get(D::COLLECTION, id)
            .await?
            .map(|envelope| decode(&envelope))
            .transpose()
    }

    /// Loads a document, failing with `NotFound` if it doesn't exist.
    pub async fn load_existing(&self, id: DocumentId) -> Result<Versioned<D>, DomainError> {
        self.load(id)
            .await?
            .ok_or_else(|| DomainError::not_found(D::KIND, id))
    }

    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<D>, DomainError> {
        self.store
            .find(query)
            .await?
            .iter()
            .map(|envelope| envelope.decode::<D>().map_err(DomainError::from))
            .collect()
    }

    pub async fn find_one(
        &self,
        query: DocumentQuery,
    ) -> Result<Option<Versioned<D>>, DomainError> {
        self.store
            .find_one(query)
            .await?
            .map(|envelope| decode(&envelope))
            .transpose()
    }

    pub async fn count(&self, query: DocumentQuery) -> Result<u64, DomainError> {
        Ok(self.store.count(query).await?)
    }

    /// Stores a new document.
    pub async fn insert(&self, value: &D) -> Result<Versioned<D>, DomainError> {
        let stored = self.store.insert(envelope(value)?).await?;
        decode(&stored)
    }

    /// Builds an insert for a multi-document commit.
    pub fn insert_write(&self, value: &D) -> Result<DocumentWrite, DomainError> {
        Ok(DocumentWrite::insert(envelope(value)?))
    }

    /// Builds a version-checked update for a multi-document commit.
    pub fn update_write(&self, value: &D, expected: Version) -> Result<DocumentWrite, DomainError> {
        Ok(DocumentWrite::update(envelope(value)?, expected))
    }

    /// Replaces a document if it is still at `expected`.
    pub async fn update(&self, value: &D, expected: Version) -> Result<Versioned<D>, DomainError> {
        let stored = self.store.update(envelope(value)?, expected).await?;
        decode(&stored)
    }

    /// Loads a document, derives its next state and stores it in one
    /// version-checked write.
    pub async fn execute<F, E>(
        &self,
        id: DocumentId,
        command_fn: F,
    ) -> Result<Versioned<D>, DomainError>
    where
        F: FnOnce(&D) -> Result<D, E>,
        DomainError: From<E>,
    {
        let current = self.load_existing(id).await?;
        let next = command_fn(&current.value)?;
        self.update(&next, current.version).await
    }
}

fn envelope<D: Document>(value: &D) -> Result<DocumentEnvelope, DomainError> {
    Ok(DocumentEnvelope::from_value(D::COLLECTION, value.document_id(), value)?)
}

fn decode<D: Document>(envelope: &DocumentEnvelope) -> Result<Versioned<D>, DomainError> {
    Ok(Versioned {
        value: envelope.decode()?,
        version: envelope.version,
    })
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: DocumentId,
        text: String,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";
        const KIND: &'static str = "note";

        fn document_id(&self) -> DocumentId {
            self.id
        }
    }

    fn repository() -> Repository<InMemoryDocumentStore, Note> {
        Repository::new(Arc::new(InMemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn insert_then_load() {
        let repo = repository();
        let note = Note {
            id: DocumentId::new(),
            text: "hello".to_string(),
        };

        let stored = repo.insert(&note).await.unwrap();
        assert_eq!(stored.version, Version::first());

        let loaded = repo.load_existing(note.id).await.unwrap();
        assert_eq!(loaded.value, note);
    }

    #[tokio::test]
    async fn load_existing_reports_kind() {
        let repo = repository();
        let result = repo.load_existing(DocumentId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound { kind: "note", .. })));
    }

    #[tokio::test]
    async fn execute_bumps_version() {
        let repo = repository();
        let note = Note {
            id: DocumentId::new(),
            text: "draft".to_string(),
        };
        repo.insert(&note).await.unwrap();

        let updated = repo
            .execute(note.id, |current| {
                Ok::<_, DomainError>(Note {
                    text: format!("{} v2", current.text),
                    ..current.clone()
                })
            })
            .await
            .unwrap();

        assert_eq!(updated.version, Version::new(2));
        assert_eq!(updated.value.text, "draft v2");
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let repo = repository();
        let note = Note {
            id: DocumentId::new(),
            text: "a".to_string(),
        };
        let stored = repo.insert(&note).await.unwrap();
        repo.update(&note, stored.version).await.unwrap();

        let err = repo.update(&note, stored.version).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
