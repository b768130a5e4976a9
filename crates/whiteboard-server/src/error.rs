//! Error types for the whiteboard session server.
//!
//! Uses `thiserror` for structured error handling with automatic `From`
//! implementations. `ApiError` doubles as the HTTP error body: it renders
//! as `{"error": "..."}` with the status code matching its variant.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors from the durable element store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// LMDB-level failure (open, transaction, put, get).
    #[error("database error: {0}")]
    Db(#[from] heed3::Error),

    /// Data directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session record failed to serialize.
    #[error("failed to encode session record: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored session record failed to parse.
    #[error("corrupt session record for '{key}': {source}")]
    Decode {
        /// Store key of the unreadable record.
        key: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create a decode error for a store key.
    #[must_use]
    pub fn decode(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode { key: key.into(), source }
    }
}

/// Element schema violations detected at the input boundary.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// Request body is not parseable JSON.
    #[error("invalid JSON: {0}")]
    Json(serde_json::Error),

    /// Element is not a JSON object.
    #[error("element must be a JSON object")]
    NotAnObject,

    /// Element has no `type` field.
    #[error("element missing 'type' field")]
    MissingType,

    /// Element `type` is not one of the supported tags.
    #[error("unknown element type '{0}'")]
    UnknownType(String),

    /// Element has a `type` tag but its declared fields do not decode.
    #[error("invalid element: {0}")]
    Shape(serde_json::Error),

    /// Batch body is not a JSON array.
    #[error("batch body must be an array of elements")]
    NotAnArray,
}

/// Errors surfaced by session operations and the HTTP front end.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Session identifier has no record in memory or in the store.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// Element identifier is absent from the session's sequence.
    #[error("element '{0}' not found")]
    ElementNotFound(String),

    /// Input failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The durable write failed; the operation was refused.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// The session actor went away mid-request (eviction race).
    #[error("session is shutting down")]
    SessionClosed,

    /// Invariant breakage that has no client-side remedy.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a session not-found error.
    #[must_use]
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound(id.into())
    }

    /// Create an element not-found error.
    #[must_use]
    pub fn element_not_found(id: impl Into<String>) -> Self {
        Self::ElementNotFound(id.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) | Self::ElementNotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for session and HTTP operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(ApiError::session_not_found("abc").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::element_not_found("e1").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Validation(ValidationError::MissingType).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::SessionClosed.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::UnknownType("triangle".to_string());
        assert!(err.to_string().contains("triangle"));

        let err = ValidationError::MissingType;
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_api_error_from_validation() {
        let err: ApiError = ValidationError::NotAnArray.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("array"));
    }
}
