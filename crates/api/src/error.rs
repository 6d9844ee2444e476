//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::DocumentStoreError;
use domain::{AuthFailure, DomainError, FieldError, OrderError, StockError};
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request that never reached the domain.
    BadRequest {
        message: String,
        errors: Vec<FieldError>,
    },
    /// Missing, unknown or inactive credential.
    Unauthorized(AuthFailure),
    /// Domain logic error.
    Domain(DomainError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ApiError {
    pub fn bad_request(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError::BadRequest {
            errors: vec![FieldError::new(field, message.clone())],
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, errors) = match self {
            ApiError::BadRequest { message, errors } => (StatusCode::BAD_REQUEST, message, errors),
            ApiError::Unauthorized(failure) => {
                (StatusCode::UNAUTHORIZED, unauthorized_message(&failure), Vec::new())
            }
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        metrics::counter!("http_errors_total", "status" => status.as_str().to_string())
            .increment(1);
        let body = ErrorBody { error, errors };
        (status, axum::Json(body)).into_response()
    }
}

/// Inactive accounts get the same answer as unknown credentials.
fn unauthorized_message(failure: &AuthFailure) -> String {
    match failure {
        AuthFailure::MissingCredential => failure.to_string(),
        AuthFailure::InvalidCredential | AuthFailure::Inactive => {
            AuthFailure::InvalidCredential.to_string()
        }
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String, Vec<FieldError>) {
    let message = err.to_string();
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, message, errors.errors().to_vec())
            }
            OrderError::StockUnavailable(shortfalls) => {
                let errors = shortfalls
                    .iter()
                    .map(|s| FieldError::new("items", s.to_string()))
                    .collect();
                (StatusCode::BAD_REQUEST, message, errors)
            }
            OrderError::Forbidden { .. } => (StatusCode::FORBIDDEN, message, Vec::new()),
            OrderError::AmbiguousOrderNumber(_) | OrderError::OrderNumberUnavailable => {
                (StatusCode::CONFLICT, message, Vec::new())
            }
            OrderError::InvalidTransition { .. }
            | OrderError::InvalidState { .. }
            | OrderError::DriverAlreadyAssigned
            | OrderError::AlreadyRated
            | OrderError::PrescriptionRequired { .. } => {
                (StatusCode::BAD_REQUEST, message, Vec::new())
            }
        },
        DomainError::Stock(StockError::Validation(errors)) => {
            (StatusCode::BAD_REQUEST, message, errors.errors().to_vec())
        }
        DomainError::Stock(StockError::Forbidden { .. }) => {
            (StatusCode::FORBIDDEN, message, Vec::new())
        }
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, message, Vec::new()),
        DomainError::Unauthenticated(failure) => {
            (StatusCode::UNAUTHORIZED, unauthorized_message(&failure), Vec::new())
        }
        DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. }) => (
            StatusCode::CONFLICT,
            "The resource was modified concurrently, retry the request".to_string(),
            Vec::new(),
        ),
        other => {
            tracing::error!(error = %other, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Vec::new(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        ApiError::Unauthorized(failure)
    }
}
