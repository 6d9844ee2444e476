//! Request extractors that report failures as [`ApiError`].

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use document_store::DocumentStore;
use domain::{Actor, AuthFailure};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::AppState;

/// The actor behind the request's `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

impl<S> FromRequestParts<Arc<AppState<S>>> for AuthenticatedActor
where
    S: DocumentStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let actor = state.access.authenticate(&token).await.inspect_err(|failure| {
            tracing::warn!(%failure, path = %parts.uri.path(), "authentication failed");
        })?;
        Ok(AuthenticatedActor(actor))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthFailure> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingCredential)?
        .to_str()
        .map_err(|_| AuthFailure::InvalidCredential)?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            Ok(token.trim().to_string())
        }
        _ => Err(AuthFailure::InvalidCredential),
    }
}

/// JSON body whose rejections become 400 responses with a `body` field error.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, St> FromRequest<St> for JsonBody<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::bad_request("body", rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// JSON body that may be absent; an empty body yields `T::default()`.
#[derive(Debug, Clone)]
pub struct OptionalJsonBody<T>(pub T);

impl<T, St> FromRequest<St> for OptionalJsonBody<T>
where
    T: DeserializeOwned + Default,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request("body", rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJsonBody(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJsonBody)
            .map_err(|e| ApiError::bad_request("body", e.to_string()))
    }
}

/// Query string whose rejections become 400 responses with a `query` field error.
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

impl<T, St> FromRequestParts<St> for QueryParams<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                ApiError::bad_request("query", rejection.body_text())
            })?;
        Ok(QueryParams(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/orders");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))).unwrap(), "abc123");
        assert_eq!(bearer_token(&parts(Some("bearer  abc123 "))).unwrap(), "abc123");
    }

    #[test]
    fn rejects_missing_or_other_schemes() {
        assert_eq!(
            bearer_token(&parts(None)),
            Err(AuthFailure::MissingCredential)
        );
        assert_eq!(
            bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))),
            Err(AuthFailure::InvalidCredential)
        );
        assert_eq!(
            bearer_token(&parts(Some("abc123"))),
            Err(AuthFailure::InvalidCredential)
        );
    }
}
