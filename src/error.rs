/// Unified error types for the Subguard login gate
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the gate
#[derive(Error, Debug)]
pub enum GateError {
    /// Backing store errors (device registry reads/writes)
    #[error("Store unavailable: {0}")]
    Store(#[from] sqlx::Error),

    /// Email not on the configured allow-list
    #[error("Access denied. This email is not authorized to access this system.")]
    AccessDenied,

    /// Credential check rejected by the auth provider
    #[error("Authentication failed: {0}")]
    CredentialRejected(String),

    /// Concurrent-session ceiling hit; message lists the active device names
    #[error("Maximum number of devices reached. Active sessions: {device_names}")]
    SessionLimitReached { device_names: String },

    /// Device row could not be written during login
    #[error("Failed to register device. Please try again.")]
    DeviceRegistrationFailed,

    /// TOTP challenge/verify rejected
    #[error("Invalid code: {0}")]
    InvalidMfaCode(String),

    /// Any other auth provider failure, normalized at the client boundary
    #[error("Auth provider error: {0}")]
    Provider(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response format returned to the dashboard client
#[derive(Debug, Serialize, Deserialize)]
pub struct GateErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert GateError to HTTP response
impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            GateError::AccessDenied => (
                StatusCode::FORBIDDEN,
                "AccessDenied",
                self.to_string(),
            ),
            GateError::CredentialRejected(_) => (
                StatusCode::UNAUTHORIZED,
                "CredentialRejected",
                self.to_string(),
            ),
            GateError::SessionLimitReached { .. } => (
                StatusCode::FORBIDDEN,
                "SessionLimitReached",
                self.to_string(),
            ),
            GateError::DeviceRegistrationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DeviceRegistrationFailed",
                self.to_string(),
            ),
            GateError::InvalidMfaCode(_) => (
                StatusCode::UNAUTHORIZED,
                "InvalidMfaCode",
                self.to_string(),
            ),
            GateError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            GateError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            GateError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            GateError::Provider(_) => (
                StatusCode::BAD_GATEWAY,
                "ProviderError",
                self.to_string(),
            ),
            GateError::Store(_) | GateError::Internal(_) | GateError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(GateErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for gate operations
pub type GateResult<T> = Result<T, GateError>;
