/// Unified error types for the keyring frontend
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for key enrollment, resolution and message authentication
#[derive(Error, Debug)]
pub enum KeyringError {
    /// The CSR (or other PEM input) could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The presented key uses an algorithm outside the supported scheme set
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The claimed common name does not hash from the presented key
    #[error("Identity mismatch: CSR claims {claimed} but key derives {expected}")]
    IdentityMismatch { claimed: String, expected: String },

    /// Backing key store read or write failure
    #[error("Key store unavailable: {0}")]
    StoreUnavailable(String),

    /// Required server key material is absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// A message arrived from an identifier with no resolvable key
    #[error("Unknown sender: {0}")]
    UnknownSender(String),

    /// A message signature did not verify against the sender's key
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),

    /// Missing or wrong operator credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert KeyringError to HTTP response
impl IntoResponse for KeyringError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            KeyringError::RateLimitExceeded { retry_after } => {
                Some(retry_after.as_secs_f64().ceil().max(1.0) as u64)
            }
            _ => None,
        };

        let (status, error_code, message) = match self {
            KeyringError::MalformedRequest(_) => (
                StatusCode::BAD_REQUEST,
                "MalformedRequest",
                self.to_string(),
            ),
            KeyringError::UnsupportedAlgorithm(_) => (
                StatusCode::BAD_REQUEST,
                "UnsupportedAlgorithm",
                self.to_string(),
            ),
            KeyringError::IdentityMismatch { .. } => (
                StatusCode::BAD_REQUEST,
                "IdentityMismatch",
                self.to_string(),
            ),
            KeyringError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            KeyringError::UnknownSender(_)
            | KeyringError::InvalidSignature(_)
            | KeyringError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            KeyringError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            KeyringError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            KeyringError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "StoreUnavailable",
                "Key store unavailable".to_string(),
            ),
            KeyringError::ConfigurationMissing(_)
            | KeyringError::Database(_)
            | KeyringError::Io(_)
            | KeyringError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from(seconds));
        }
        response
    }
}

/// Result type alias for keyring operations
pub type KeyringResult<T> = Result<T, KeyringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let err = KeyringError::IdentityMismatch {
            claimed: "C.0000000000000000".to_string(),
            expected: "C.1111111111111111".to_string(),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = KeyringError::UnsupportedAlgorithm("id-ecPublicKey".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failures_do_not_leak_details() {
        let err = KeyringError::StoreUnavailable("disk on fire at /var/lib".to_string());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = KeyringError::Internal("secret path".to_string());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_authentication_failures_are_unauthorized() {
        let err = KeyringError::UnknownSender("C.abcd1234".to_string());
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let err = KeyringError::RateLimitExceeded {
            retry_after: std::time::Duration::from_millis(2500),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");

        let err = KeyringError::RateLimitExceeded {
            retry_after: std::time::Duration::ZERO,
        };
        assert_eq!(err.into_response().headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_admin_authentication_failure_is_unauthorized() {
        let err = KeyringError::Authentication("Missing authorization header".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
