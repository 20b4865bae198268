//! Error types for the document QA system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for docqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Document QA errors
#[derive(Debug, Error)]
pub enum Error {
    /// Declared content type / extension is not one of the recognized kinds
    #[error("Unsupported format for '{filename}': {declared}")]
    UnsupportedFormat { filename: String, declared: String },

    /// File bytes could not be decoded per their declared kind
    #[error("Failed to parse '{filename}': {message}")]
    Parse { filename: String, message: String },

    /// Invalid configuration (chunking parameters, dimensions, timeouts)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed request from a caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Vector length differs from the store's dimensionality
    #[error("Dimension mismatch in {operation}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    /// No chunks are stored
    #[error("Vector store is empty ({operation})")]
    EmptyStore { operation: String },

    /// Embedding provider failed or timed out
    #[error("Embedding unavailable during {operation}: {message}")]
    EmbeddingUnavailable { operation: String, message: String },

    /// Generation provider failed or timed out
    #[error("Generation failed (model {model}): {message}")]
    Generation { model: String, message: String },

    /// Persisted store is missing, unreadable, or inconsistent
    #[error("Store corrupted at '{path}': {message}")]
    StoreCorrupted { path: String, message: String },

    /// Upstream provider answered with a non-success status
    #[error("Upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// A provider call exceeded its time budget
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error
    pub fn parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an empty-store error for the named operation
    pub fn empty_store(operation: impl Into<String>) -> Self {
        Self::EmptyStore {
            operation: operation.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a generation error
    pub fn generation(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a store-corrupted error
    pub fn corrupted(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::StoreCorrupted {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a provider call that failed with this error is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() {
                    return true;
                }
                err.status()
                    .map(|s| s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS)
                    .unwrap_or(false)
            }
            Error::Upstream { status, .. } => *status == 429 || *status >= 500,
            Error::Timeout { .. } | Error::Io(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::UnsupportedFormat { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
            }
            Error::Parse { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "parse_error"),
            Error::InvalidConfig(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::EmptyStore { .. } => (StatusCode::CONFLICT, "empty_store"),
            Error::EmbeddingUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            Error::Generation { .. } => (StatusCode::BAD_GATEWAY, "generation_error"),
            Error::StoreCorrupted { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_corrupted")
            }
            Error::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = Error::DocumentNotFound(Uuid::new_v4()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = Error::UnsupportedFormat {
            filename: "a.exe".into(),
            declared: "application/x-msdownload".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let resp = Error::generation("phi3", "boom").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_domain_errors_are_not_transient() {
        assert!(!Error::parse("x.pdf", "bad").is_transient());
        assert!(!Error::empty_store("search").is_transient());
        assert!(!Error::generation("m", "4xx").is_transient());
    }

    #[test]
    fn test_upstream_transience() {
        let busy = Error::Upstream { status: 503, message: "loading".into() };
        let missing = Error::Upstream { status: 404, message: "model not found".into() };
        assert!(busy.is_transient());
        assert!(!missing.is_transient());
        assert!(Error::Timeout { operation: "embed".into(), millis: 10 }.is_transient());
    }
}
