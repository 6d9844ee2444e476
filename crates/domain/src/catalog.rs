//! Catalog Store: medicine reference data.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{DocumentId, MedicineId};
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::order::Money;
use crate::repository::{Document, Repository};

/// A catalog medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,

    /// Reference price, used when a pharmacy stocks the medicine without
    /// setting its own price.
    pub price: Money,

    #[serde(default)]
    pub requires_prescription: bool,
}

impl Medicine {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            id: MedicineId::new(),
            name: name.into(),
            price,
            requires_prescription: false,
        }
    }

    pub fn prescription_only(mut self) -> Self {
        self.requires_prescription = true;
        self
    }
}

impl Document for Medicine {
    const COLLECTION: &'static str = "medicines";
    const KIND: &'static str = "medicine";

    fn document_id(&self) -> DocumentId {
        self.id.document_id()
    }
}

/// Read access to the medicine catalog.
#[async_trait]
pub trait MedicineCatalog: Send + Sync {
    async fn medicine(&self, id: MedicineId) -> Result<Option<Medicine>, DomainError>;

    /// Looks up several medicines at once. Unknown ids are left out.
    async fn medicines(
        &self,
        ids: &[MedicineId],
    ) -> Result<HashMap<MedicineId, Medicine>, DomainError> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(medicine) = self.medicine(*id).await? {
                found.insert(*id, medicine);
            }
        }
        Ok(found)
    }
}

/// Catalog kept in the `medicines` collection of the document store.
pub struct DocumentCatalog<S> {
    medicines: Repository<S, Medicine>,
}

impl<S> Clone for DocumentCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            medicines: self.medicines.clone(),
        }
    }
}

impl<S: DocumentStore> DocumentCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            medicines: Repository::new(store),
        }
    }

    /// Inserts a medicine or replaces the stored one with the same id.
    #[tracing::instrument(skip(self, medicine), fields(medicine = %medicine.id))]
    pub async fn upsert_medicine(&self, medicine: Medicine) -> Result<Medicine, DomainError> {
        let stored = match self.medicines.load(medicine.document_id()).await? {
            Some(current) => self.medicines.update(&medicine, current.version).await?,
            None => self.medicines.insert(&medicine).await?,
        };
        tracing::debug!(name = %stored.value.name, "medicine upserted");
        Ok(stored.value)
    }
}

#[async_trait]
impl<S: DocumentStore> MedicineCatalog for DocumentCatalog<S> {
    async fn medicine(&self, id: MedicineId) -> Result<Option<Medicine>, DomainError> {
        Ok(self
            .medicines
            .load(id.document_id())
            .await?
            .map(|stored| stored.value))
    }
}
