//! Startup seeding of catalog medicines and pharmacies.
//!
//! The seed file looks like:
//!
//! ```json
//! {
//!   "medicines": [{ "id": "...", "name": "Paracetamol 500mg", "price": 4.0 }],
//!   "pharmacies": [{
//!     "id": "...", "name": "Central",
//!     "stock": [{ "medicine": "...", "quantity": 5, "price": 5.5 }]
//!   }]
//! }
//! ```
//!
//! Medicines are upserted. Pharmacies that already exist are left untouched,
//! so restarting against a persistent store does not reset stock.

use std::path::Path;

use chrono::Utc;
use common::{MedicineId, PharmacyId};
use document_store::DocumentStore;
use domain::{DomainError, Medicine, MedicineCatalog, Money, Pharmacy};
use serde::Deserialize;
use thiserror::Error;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Pharmacy {pharmacy} stocks unknown medicine {medicine}")]
    UnknownMedicine {
        pharmacy: PharmacyId,
        medicine: MedicineId,
    },

    #[error("Failed to store seed data: {0}")]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub medicines: Vec<Medicine>,
    pub pharmacies: Vec<SeedPharmacy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPharmacy {
    pub id: PharmacyId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub stock: Vec<SeedStock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStock {
    pub medicine: MedicineId,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Money>,
}

fn active_by_default() -> bool {
    true
}

/// Counts of what a seeding run stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub medicines: usize,
    pub pharmacies: usize,
    pub skipped_pharmacies: usize,
}

impl SeedData {
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Stores the seed data through the catalog and the stock ledger.
    #[tracing::instrument(skip_all, fields(medicines = self.medicines.len(), pharmacies = self.pharmacies.len()))]
    pub async fn apply<S: DocumentStore>(&self, state: &AppState<S>) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();

        for medicine in &self.medicines {
            state.catalog.upsert_medicine(medicine.clone()).await?;
            report.medicines += 1;
        }

        for seed in &self.pharmacies {
            match state.stock.pharmacy(seed.id).await {
                Ok(_) => {
                    tracing::debug!(pharmacy = %seed.id, "pharmacy already present, skipping");
                    report.skipped_pharmacies += 1;
                    continue;
                }
                Err(DomainError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }

            let pharmacy = self.build_pharmacy(state, seed).await?;
            state.stock.register_pharmacy(pharmacy).await?;
            report.pharmacies += 1;
        }

        tracing::info!(
            medicines = report.medicines,
            pharmacies = report.pharmacies,
            skipped = report.skipped_pharmacies,
            "seed data applied"
        );
        Ok(report)
    }

    async fn build_pharmacy<S: DocumentStore>(
        &self,
        state: &AppState<S>,
        seed: &SeedPharmacy,
    ) -> Result<Pharmacy, SeedError> {
        let mut pharmacy = Pharmacy::new(seed.id, seed.name.clone());
        pharmacy.address = seed.address.clone();
        pharmacy.active = seed.active;

        let now = Utc::now();
        for entry in &seed.stock {
            let medicine = state.catalog.medicine(entry.medicine).await?.ok_or(
                SeedError::UnknownMedicine {
                    pharmacy: seed.id,
                    medicine: entry.medicine,
                },
            )?;
            pharmacy = pharmacy.upserted(
                entry.medicine,
                entry.quantity,
                entry.price,
                medicine.price,
                now,
            );
        }
        Ok(pharmacy)
    }
}
