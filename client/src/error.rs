//! Error taxonomy for everything that talks to the backend.
//!
//! Status codes are mapped once, in [`ApiError::from_status`], so callers can
//! match on the variant instead of inspecting numbers.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached or did not answer in time
    #[error("Cannot connect to server: {0}")]
    Connection(String),

    /// HTTP 401. Stored credentials have been wiped by the time this is seen.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// HTTP 403
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// HTTP 404
    #[error("{0} not found")]
    NotFound(String),

    /// HTTP 409
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any 5xx
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status
    #[error("Unknown error ({status}): {message}")]
    Unknown { status: u16, message: String },

    /// HTTP succeeded but the envelope reported `success: false`
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Payload failed client-side validation, nothing was sent
    #[error("Invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request could not be built (bad path, bad header)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

impl ApiError {
    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            s if s.is_server_error() => ApiError::Server {
                status: s.as_u16(),
                message,
            },
            s => ApiError::Unknown {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Transport failures and server errors may succeed on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Connection(_) | ApiError::Server { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidRequest(format!("undecodable response: {}", err))
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

/// Result type alias for client operations
pub type ApiResult<T> = Result<T, ApiError>;
