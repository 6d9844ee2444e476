//! Pharmacy stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::PharmacyId;
use document_store::DocumentStore;
use domain::{StockEntry, UpdateStock};

use crate::error::ApiError;
use crate::extract::{AuthenticatedActor, JsonBody};
use crate::state::AppState;

fn pharmacy_id(raw: &str) -> Result<PharmacyId, ApiError> {
    raw.trim()
        .parse()
        .map_err(|e: common::IdParseError| ApiError::bad_request("id", e.to_string()))
}

/// GET /pharmacies/{id}/stock: public read of a pharmacy's ledger.
#[tracing::instrument(skip(state))]
pub async fn list_stock<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StockEntry>>, ApiError> {
    let pharmacy = pharmacy_id(&id)?;
    Ok(Json(state.stock.list_stock(pharmacy).await?))
}

/// PUT /pharmacies/{id}/stock: admin or the owning pharmacy sets a quantity
/// and optionally a price.
#[tracing::instrument(skip(state, actor, update))]
pub async fn update_stock<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<UpdateStock>,
) -> Result<Json<StockEntry>, ApiError> {
    let pharmacy = pharmacy_id(&id)?;
    Ok(Json(state.stock.upsert(&actor, pharmacy, update).await?))
}
