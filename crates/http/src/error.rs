// SPDX-License-Identifier: MIT

//! Maps the cross-cutting [`ao_core::ErrorKind`] taxonomy onto HTTP
//! status codes and a JSON error body. Every handler in [`crate::routes`]
//! returns `Result<_, ApiError>`; this is the single place that knows how a
//! `NotFound` becomes a 404 or a `Validation` becomes a 400 with field
//! errors.

use ao_core::{ErrorKind, FieldError, HasErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    fields: Vec<FieldError>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), fields: Vec::new() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Path-traversal / unsafe-filename failures surface as 400 with this
    /// exact message.
    pub fn invalid_file_path() -> Self {
        Self::new(ErrorKind::PathTraversal, "Invalid file path")
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::new(ErrorKind::RateLimited, format!("rate limit exceeded, retry after {retry_after_ms}ms"))
    }

    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self { kind: ErrorKind::Validation, message: message.into(), fields }
    }

    pub fn with_kind(kind: impl HasErrorKind + std::fmt::Display) -> Self {
        Self { kind: kind.kind(), message: kind.to_string(), fields: Vec::new() }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: &'a [FieldError],
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { error: &self.message, fields: &self.fields };
        (status, Json(body)).into_response()
    }
}

/// Blanket conversion for any crate-local error that implements
/// [`HasErrorKind`] and `Display` (`SupervisorError`, `StoreError`'s
/// siblings, ...), so handlers can just use `?`.
impl<E> From<E> for ApiError
where
    E: HasErrorKind + std::fmt::Display,
{
    fn from(e: E) -> Self {
        ApiError::with_kind(e)
    }
}
