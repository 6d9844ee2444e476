//! Health check endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: liveness probe, no credential required.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
