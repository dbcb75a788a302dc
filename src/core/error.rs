//! Typed errors
//!
//! Translation never fails; errors only come from executing a query or from
//! the HTTP layer around it.
//!
//! - [`StoreError`]: raised by a [`DocumentStore`](crate::core::store::DocumentStore) at execution time
//! - [`ObserversError`]: everything an endpoint can answer with, mapped to an HTTP status
//!
//! Responses follow the list envelope convention: 4xx errors carry
//! `status: "fail"`, 5xx errors `status: "error"`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a document store while executing a query
#[derive(Debug, Error)]
pub enum StoreError {
    /// The collection is not known to the store
    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),

    /// No document with this id
    #[error("Document not found in '{collection}': {id}")]
    NotFound { collection: String, id: String },

    /// The store cannot execute the query as described
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The payload is not a storable document
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The backend failed (connection, driver, lock poisoning, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::UnknownCollection(_) | StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::InvalidQuery(_) | StoreError::InvalidDocument(_) => {
                StatusCode::BAD_REQUEST
            }
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::UnknownCollection(_) => "UNKNOWN_COLLECTION",
            StoreError::NotFound { .. } => "DOCUMENT_NOT_FOUND",
            StoreError::InvalidQuery(_) => "INVALID_QUERY",
            StoreError::InvalidDocument(_) => "INVALID_DOCUMENT",
            StoreError::Backend(_) => "STORAGE_ERROR",
        }
    }
}

/// The main error type of the HTTP surface
#[derive(Debug, Error)]
pub enum ObserversError {
    /// Query execution or persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request itself is unusable (bad JSON body, bad id, ...)
    #[error("Bad request: {0}")]
    Request(String),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body of HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// `"fail"` for client errors, `"error"` for server errors
    pub status: &'static str,
    /// Error code for programmatic handling
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
}

impl ObserversError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ObserversError::Store(e) => e.status_code(),
            ObserversError::Request(_) => StatusCode::BAD_REQUEST,
            ObserversError::Config(_) | ObserversError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ObserversError::Store(e) => e.error_code(),
            ObserversError::Config(_) => "CONFIG_ERROR",
            ObserversError::Request(_) => "BAD_REQUEST",
            ObserversError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: if self.status_code().is_client_error() {
                "fail"
            } else {
                "error"
            },
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}

impl From<anyhow::Error> for ObserversError {
    fn from(err: anyhow::Error) -> Self {
        ObserversError::Internal(err.to_string())
    }
}

impl IntoResponse for ObserversError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(self.to_response())).into_response()
    }
}

/// Result alias for HTTP handlers
pub type ObserversResult<T> = std::result::Result<T, ObserversError>;
