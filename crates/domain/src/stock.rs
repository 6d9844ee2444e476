//! Pharmacy Stock Ledger.
//!
//! Each pharmacy document carries its own stock entries, so an entry is only
//! ever written together with the pharmacy it belongs to.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{DocumentId, MedicineId, PharmacyId};
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Actor;
use crate::catalog::MedicineCatalog;
use crate::error::DomainError;
use crate::order::Money;
use crate::repository::{Document, Repository};
use crate::validation::ValidationErrors;

/// Quantity on hand and price of one medicine at one pharmacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub medicine: MedicineId,
    pub quantity: u32,
    pub price: Money,
    pub last_updated: DateTime<Utc>,
}

/// A pharmacy and its stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    pub id: PharmacyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub stock: Vec<StockEntry>,
}

fn default_active() -> bool {
    true
}

impl Document for Pharmacy {
    const COLLECTION: &'static str = "pharmacies";
    const KIND: &'static str = "pharmacy";

    fn document_id(&self) -> DocumentId {
        self.id.document_id()
    }
}

impl Pharmacy {
    pub fn new(id: PharmacyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            address: None,
            active: true,
            stock: Vec::new(),
        }
    }

    /// Adds or replaces a stock entry at its own price.
    pub fn with_stock(self, medicine: MedicineId, quantity: u32, price: Money) -> Self {
        self.upserted(medicine, quantity, Some(price), price, Utc::now())
    }

    /// Returns the entry for a medicine, or None if the pharmacy does not carry it.
    pub fn stock_entry(&self, medicine: MedicineId) -> Option<&StockEntry> {
        self.stock.iter().find(|entry| entry.medicine == medicine)
    }

    /// Returns true if the pharmacy carries the medicine with at least `quantity` on hand.
    pub fn has_available(&self, medicine: MedicineId, quantity: u32) -> bool {
        self.stock_entry(medicine)
            .is_some_and(|entry| quantity <= entry.quantity)
    }

    /// Returns the pharmacy with each listed quantity taken off its entry,
    /// floored at zero. Medicines the pharmacy no longer carries are skipped.
    pub fn decremented<I>(&self, lines: I, now: DateTime<Utc>) -> Pharmacy
    where
        I: IntoIterator<Item = (MedicineId, u32)>,
    {
        let mut next = self.clone();
        for (medicine, quantity) in lines {
            if let Some(entry) = next.stock.iter_mut().find(|e| e.medicine == medicine) {
                entry.quantity = entry.quantity.saturating_sub(quantity);
                entry.last_updated = now;
            }
        }
        next
    }

    /// Returns the pharmacy with a medicine's quantity set, and its price too
    /// when given. A new entry without a price takes `reference_price`.
    pub fn upserted(
        &self,
        medicine: MedicineId,
        quantity: u32,
        price: Option<Money>,
        reference_price: Money,
        now: DateTime<Utc>,
    ) -> Pharmacy {
        let mut next = self.clone();
        match next.stock.iter_mut().find(|e| e.medicine == medicine) {
            Some(entry) => {
                entry.quantity = quantity;
                if let Some(price) = price {
                    entry.price = price;
                }
                entry.last_updated = now;
            }
            None => next.stock.push(StockEntry {
                medicine,
                quantity,
                price: price.unwrap_or(reference_price),
                last_updated: now,
            }),
        }
        next
    }
}

/// A line that the pharmacy cannot serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub medicine: MedicineId,
    pub medicine_name: Option<String>,
    pub requested: u32,
    /// Quantity on hand, or None when the pharmacy does not carry the medicine.
    pub available: Option<u32>,
}

impl std::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.medicine_name {
            Some(name) => write!(f, "{name}")?,
            None => write!(f, "{}", self.medicine)?,
        }
        match self.available {
            Some(available) => write!(f, " (only {available} available)"),
            None => write!(f, " (not available at this pharmacy)"),
        }
    }
}

/// Errors specific to stock management.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    #[error("Not allowed to manage stock of pharmacy {pharmacy}")]
    Forbidden { pharmacy: PharmacyId },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Body of a stock update: `{medicine, stock, price?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStock {
    pub medicine: String,
    pub stock: Option<i64>,
    pub price: Option<f64>,
}

/// A stock update that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub medicine: MedicineId,
    pub quantity: u32,
    pub price: Option<Money>,
}

impl UpdateStock {
    pub fn new(medicine: MedicineId, stock: i64) -> Self {
        Self {
            medicine: medicine.to_string(),
            stock: Some(stock),
            price: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn validate(&self) -> Result<StockChange, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let medicine = match self.medicine.trim() {
            "" => {
                errors.add("medicine", "is required");
                None
            }
            raw => raw
                .parse::<MedicineId>()
                .map_err(|_| errors.add("medicine", "must be a valid medicine id"))
                .ok(),
        };

        let quantity = match self.stock {
            None => {
                errors.add("stock", "is required");
                None
            }
            Some(stock) => u32::try_from(stock)
                .map_err(|_| errors.add("stock", "must be a non-negative integer"))
                .ok(),
        };

        let price = match self.price.map(Money::from_decimal) {
            None => None,
            Some(Some(price)) if !price.is_negative() => Some(price),
            Some(_) => {
                errors.add(
                    "price",
                    format!("must be a number between 0 and {}", Money::MAX_DECIMAL),
                );
                None
            }
        };

        match (medicine, quantity) {
            (Some(medicine), Some(quantity)) if errors.is_empty() => Ok(StockChange {
                medicine,
                quantity,
                price,
            }),
            _ => Err(errors),
        }
    }
}

/// Reads and maintains pharmacy stock.
pub struct StockLedger<S, C> {
    pharmacies: Repository<S, Pharmacy>,
    catalog: C,
}

impl<S, C> StockLedger<S, C>
where
    S: DocumentStore,
    C: MedicineCatalog,
{
    pub fn new(store: Arc<S>, catalog: C) -> Self {
        Self {
            pharmacies: Repository::new(store),
            catalog,
        }
    }

    /// Loads a pharmacy, failing with `NotFound` if it doesn't exist.
    pub async fn pharmacy(&self, pharmacy: PharmacyId) -> Result<Pharmacy, DomainError> {
        Ok(self
            .pharmacies
            .load_existing(pharmacy.document_id())
            .await?
            .value)
    }

    /// Returns the stock entry, or None if the pharmacy does not carry the medicine.
    pub async fn get_stock(
        &self,
        pharmacy: PharmacyId,
        medicine: MedicineId,
    ) -> Result<Option<StockEntry>, DomainError> {
        Ok(self.pharmacy(pharmacy).await?.stock_entry(medicine).cloned())
    }

    pub async fn has_available(
        &self,
        pharmacy: PharmacyId,
        medicine: MedicineId,
        quantity: u32,
    ) -> Result<bool, DomainError> {
        Ok(self.pharmacy(pharmacy).await?.has_available(medicine, quantity))
    }

    /// Returns every stock entry of a pharmacy.
    pub async fn list_stock(&self, pharmacy: PharmacyId) -> Result<Vec<StockEntry>, DomainError> {
        Ok(self.pharmacy(pharmacy).await?.stock)
    }

    /// Reduces a medicine's quantity, floored at zero.
    #[tracing::instrument(skip(self))]
    pub async fn decrement(
        &self,
        pharmacy: PharmacyId,
        medicine: MedicineId,
        quantity: u32,
    ) -> Result<(), DomainError> {
        let now = Utc::now();
        self.pharmacies
            .execute(pharmacy.document_id(), |current| {
                Ok::<_, DomainError>(current.decremented([(medicine, quantity)], now))
            })
            .await?;
        Ok(())
    }

    /// Sets a medicine's quantity (and price, when given) at a pharmacy.
    ///
    /// Only admins and the pharmacy's own account may do this. A new entry
    /// without a price takes the catalog reference price.
    #[tracing::instrument(skip(self, actor, update), fields(actor = %actor.id))]
    pub async fn upsert(
        &self,
        actor: &Actor,
        pharmacy: PharmacyId,
        update: UpdateStock,
    ) -> Result<StockEntry, DomainError> {
        if !actor.is_admin() && !actor.owns_pharmacy(pharmacy) {
            tracing::warn!(%pharmacy, "stock update rejected: not owner");
            return Err(StockError::Forbidden { pharmacy }.into());
        }
        let change = update.validate().map_err(StockError::Validation)?;

        let current = self
            .pharmacies
            .load_existing(pharmacy.document_id())
            .await?;
        let medicine = self
            .catalog
            .medicine(change.medicine)
            .await?
            .ok_or_else(|| DomainError::not_found("medicine", change.medicine))?;

        let next = current.value.upserted(
            change.medicine,
            change.quantity,
            change.price,
            medicine.price,
            Utc::now(),
        );
        let stored = self.pharmacies.update(&next, current.version).await?;

        let entry = stored
            .value
            .stock_entry(change.medicine)
            .cloned()
            .ok_or_else(|| DomainError::not_found("stock entry", change.medicine))?;

        metrics::counter!("stock_updates_total").increment(1);
        tracing::info!(
            %pharmacy,
            medicine = %medicine.name,
            quantity = entry.quantity,
            price = %entry.price,
            "stock updated"
        );
        Ok(entry)
    }

    /// Stores a new pharmacy with its opening stock.
    #[tracing::instrument(skip(self, pharmacy), fields(pharmacy = %pharmacy.id))]
    pub async fn register_pharmacy(&self, pharmacy: Pharmacy) -> Result<Pharmacy, DomainError> {
        let stored = self.pharmacies.insert(&pharmacy).await?;
        tracing::info!(
            name = %stored.value.name,
            entries = stored.value.stock.len(),
            "pharmacy registered"
        );
        Ok(stored.value)
    }
}
