//! HTTP API for the pharmacy ordering platform.
//!
//! Provides REST endpoints for the order lifecycle and pharmacy stock, with
//! bearer-token authentication, structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use document_store::DocumentStore;
use domain::{AccessGate, LifecycleConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{orders, pharmacies};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", get(orders::list::<S>).post(orders::create::<S>))
        .route("/orders/driver/available", get(orders::available::<S>))
        .route("/orders/driver/my-orders", get(orders::driver_orders::<S>))
        .route("/orders/pharmacy/my-orders", get(orders::pharmacy_orders::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/cancel", put(orders::cancel::<S>))
        .route("/orders/{id}/rate", put(orders::rate::<S>))
        .route("/orders/{id}/assign-driver", put(orders::assign_driver::<S>))
        .route("/orders/{id}/update-status", put(orders::update_status::<S>))
        .route("/orders/{id}/pharmacy-status", put(orders::pharmacy_status::<S>))
        .route(
            "/pharmacies/{id}/stock",
            get(pharmacies::list_stock::<S>).put(pharmacies::update_stock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
pub fn create_default_state<S: DocumentStore>(
    store: Arc<S>,
    access: Arc<dyn AccessGate>,
    lifecycle: LifecycleConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, access, lifecycle))
}
