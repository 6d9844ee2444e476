//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Page;
use document_store::DocumentStore;
use domain::{
    CancelOrder, ChangeStatus, DomainError, ListOrders, Order, OrderError, OrderFilter,
    PlaceOrder, RateOrder,
};

use crate::error::ApiError;
use crate::extract::{AuthenticatedActor, JsonBody, OptionalJsonBody, QueryParams};
use crate::state::AppState;

type OrderResult = Result<Json<Order>, ApiError>;
type OrderPage = Result<Json<Page<Order>>, ApiError>;

fn filter(query: &ListOrders) -> Result<OrderFilter, ApiError> {
    query
        .validate()
        .map_err(|errors| DomainError::from(OrderError::Validation(errors)).into())
}

/// POST /orders: place an order as the authenticated customer.
#[tracing::instrument(skip_all)]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    JsonBody(request): JsonBody<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.place_order(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders: the customer's own orders, newest first.
#[tracing::instrument(skip_all)]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    QueryParams(query): QueryParams<ListOrders>,
) -> OrderPage {
    let page = state
        .orders
        .list_customer_orders(&actor, filter(&query)?)
        .await?;
    Ok(Json(page))
}

/// GET /orders/{id}: one order, by internal id or `ORD-` number.
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> OrderResult {
    Ok(Json(state.orders.get_order(&actor, &id).await?))
}

/// PUT /orders/{id}/cancel
#[tracing::instrument(skip(state, actor, cancel))]
pub async fn cancel<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    OptionalJsonBody(cancel): OptionalJsonBody<CancelOrder>,
) -> OrderResult {
    Ok(Json(state.orders.cancel_order(&actor, &id, cancel).await?))
}

/// PUT /orders/{id}/rate
#[tracing::instrument(skip(state, actor, rate))]
pub async fn rate<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    JsonBody(rate): JsonBody<RateOrder>,
) -> OrderResult {
    Ok(Json(state.orders.rate_order(&actor, &id, rate).await?))
}

/// GET /orders/driver/available: ready orders without a driver, oldest first.
#[tracing::instrument(skip_all)]
pub async fn available<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    QueryParams(query): QueryParams<ListOrders>,
) -> OrderPage {
    let pagination = filter(&query)?.pagination;
    let page = state
        .orders
        .list_available_for_drivers(&actor, pagination)
        .await?;
    Ok(Json(page))
}

/// GET /orders/driver/my-orders
#[tracing::instrument(skip_all)]
pub async fn driver_orders<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    QueryParams(query): QueryParams<ListOrders>,
) -> OrderPage {
    let page = state
        .orders
        .list_driver_orders(&actor, filter(&query)?)
        .await?;
    Ok(Json(page))
}

/// PUT /orders/{id}/assign-driver
#[tracing::instrument(skip(state, actor))]
pub async fn assign_driver<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
) -> OrderResult {
    Ok(Json(state.orders.assign_driver(&actor, &id).await?))
}

/// PUT /orders/{id}/update-status: driver or admin.
#[tracing::instrument(skip(state, actor, change))]
pub async fn update_status<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    JsonBody(change): JsonBody<ChangeStatus>,
) -> OrderResult {
    Ok(Json(state.orders.update_status(&actor, &id, change).await?))
}

/// GET /orders/pharmacy/my-orders
#[tracing::instrument(skip_all)]
pub async fn pharmacy_orders<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    QueryParams(query): QueryParams<ListOrders>,
) -> OrderPage {
    let page = state
        .orders
        .list_pharmacy_orders(&actor, filter(&query)?)
        .await?;
    Ok(Json(page))
}

/// PUT /orders/{id}/pharmacy-status
#[tracing::instrument(skip(state, actor, change))]
pub async fn pharmacy_status<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<String>,
    JsonBody(change): JsonBody<ChangeStatus>,
) -> OrderResult {
    Ok(Json(
        state
            .orders
            .pharmacy_update_status(&actor, &id, change)
            .await?,
    ))
}
