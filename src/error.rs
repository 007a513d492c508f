//! Error types for the knowledge cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the knowledge cache.
///
/// The facade returns `LoadFailed`, `Serialization` and `Internal`.
/// `CompressionFailed` is absorbed internally; `NotFound` and
/// `InvalidRequest` belong to the HTTP surface.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The caller-supplied loader failed; shared by every waiter on the key
    #[error("Load failed for key '{key}': {cause}")]
    LoadFailed {
        key: String,
        cause: Arc<anyhow::Error>,
    },

    /// A value could not be serialized to or decoded from its stored form
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression of a payload failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A loader panicked; reported instead of poisoning the shared load
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps a loader error for `key`.
    pub fn load_failed(key: impl Into<String>, cause: anyhow::Error) -> Self {
        CacheError::LoadFailed {
            key: key.into(),
            cause: Arc::new(cause),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::LoadFailed { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::CompressionFailed(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the knowledge cache.
pub type Result<T> = std::result::Result<T, CacheError>;
