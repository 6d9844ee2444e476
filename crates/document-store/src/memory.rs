use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    DocumentEnvelope, DocumentId, DocumentQuery, DocumentStoreError, Result, SortOrder, Version,
    store::{DocumentStore, DocumentWrite, validate_writes},
};

type Key = (String, DocumentId);

#[derive(Default)]
struct Collections {
    /// Stored documents with their insertion sequence number.
    documents: HashMap<Key, (u64, DocumentEnvelope)>,
    next_seq: u64,
}

/// In-memory document store implementation.
///
/// Used for tests and for running the server without a database. Commits hold
/// a single write lock, which makes every batch atomic.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored across all collections.
    pub async fn document_count(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.documents.clear();
        inner.next_seq = 0;
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn commit(&self, writes: Vec<DocumentWrite>) -> Result<Vec<DocumentEnvelope>> {
        validate_writes(&writes)?;

        let mut inner = self.inner.write().await;

        // Check every write before touching anything
        for write in &writes {
            let document = write.document();
            let key = (document.collection.clone(), document.id);
            match write {
                DocumentWrite::Insert(_) => {
                    if inner.documents.contains_key(&key) {
                        return Err(DocumentStoreError::AlreadyExists {
                            collection: document.collection.clone(),
                            id: document.id,
                        });
                    }
                }
                DocumentWrite::Update {
                    expected_version, ..
                } => {
                    let (_, stored) = inner.documents.get(&key).ok_or_else(|| {
                        DocumentStoreError::NotFound {
                            collection: document.collection.clone(),
                            id: document.id,
                        }
                    })?;
                    if stored.version != *expected_version {
                        metrics::counter!("document_store_conflicts_total").increment(1);
                        return Err(DocumentStoreError::ConcurrencyConflict {
                            collection: document.collection.clone(),
                            id: document.id,
                            expected: *expected_version,
                            actual: stored.version,
                        });
                    }
                }
            }
        }

        let now = Utc::now();
        let mut committed = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                DocumentWrite::Insert(mut document) => {
                    document.version = Version::first();
                    document.created_at = now;
                    document.updated_at = now;

                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    inner.documents.insert(
                        (document.collection.clone(), document.id),
                        (seq, document.clone()),
                    );
                    committed.push(document);
                }
                DocumentWrite::Update {
                    mut document,
                    expected_version,
                } => {
                    let key = (document.collection.clone(), document.id);
                    if let Some((_, stored)) = inner.documents.get_mut(&key) {
                        document.version = expected_version.next();
                        document.created_at = stored.created_at;
                        document.updated_at = now;
                        *stored = document.clone();
                    }
                    committed.push(document);
                }
            }
        }

        Ok(committed)
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<DocumentEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&(collection.to_string(), id))
            .map(|(_, document)| document.clone()))
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<DocumentEnvelope>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<_> = inner
            .documents
            .values()
            .filter(|(_, document)| query.matches(document))
            .collect();

        matches.sort_by(|(seq_a, a), (seq_b, b)| {
            a.created_at.cmp(&b.created_at).then(seq_a.cmp(seq_b))
        });
        if query.sort == SortOrder::NewestFirst {
            matches.reverse();
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let inner = self.inner.read().await;
        let count = inner
            .documents
            .values()
            .filter(|(_, document)| query.matches(document))
            .count();
        Ok(count as u64)
    }
}
