// SPDX-License-Identifier: MIT

//! Cross-cutting error taxonomy. Individual crates define their
//! own `thiserror` enums for the specifics of what went wrong; every such
//! error also reports one of these kinds so the HTTP layer can map it to a
//! status code without needing to know about every crate's error type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    Unauthorized,
    NotFound,
    Conflict,
    Validation,
    PathTraversal,
    RateLimited,
    Transient,
    Internal,
}

impl ErrorKind {
    /// HTTP status code this kind maps to.
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Unauthorized => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation | ErrorKind::PathTraversal => 400,
            ErrorKind::RateLimited => 429,
            ErrorKind::Transient | ErrorKind::Internal => 500,
        }
    }
}

/// Implemented by every crate-local error enum so `ao-http` can map any of
/// them to a response without a dependency on the crate that produced it.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
    pub code: String,
}
