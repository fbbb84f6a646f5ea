/// Unified error types for Client Pulse
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum PulseError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or unusable credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Valid identity, insufficient role
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Verification code did not match
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    /// Pending registration locked after repeated failures
    #[error("Too many attempts: {0}")]
    TooManyAttempts(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Stable machine-readable code carried in the failure envelope
    pub fn code(&self) -> &'static str {
        match self {
            PulseError::Authentication(_) => "Unauthenticated",
            PulseError::Authorization(_) => "Forbidden",
            PulseError::Validation(_) => "ValidationError",
            PulseError::NotFound(_) => "NotFound",
            PulseError::Conflict(_) => "Conflict",
            PulseError::InvalidCode(_) => "InvalidCode",
            PulseError::TooManyAttempts(_) => "TooManyAttempts",
            PulseError::RateLimitExceeded { .. } => "RateLimitExceeded",
            PulseError::Database(_)
            | PulseError::Jwt(_)
            | PulseError::Internal(_)
            | PulseError::Io(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PulseError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PulseError::Authorization(_) => StatusCode::FORBIDDEN,
            PulseError::Validation(_) | PulseError::InvalidCode(_) => StatusCode::BAD_REQUEST,
            PulseError::NotFound(_) => StatusCode::NOT_FOUND,
            PulseError::Conflict(_) => StatusCode::CONFLICT,
            PulseError::TooManyAttempts(_) | PulseError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            PulseError::Database(_)
            | PulseError::Jwt(_)
            | PulseError::Internal(_)
            | PulseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to put on the wire
    fn public_message(&self) -> String {
        match self {
            PulseError::Authentication(msg)
            | PulseError::Authorization(msg)
            | PulseError::Validation(msg)
            | PulseError::NotFound(msg)
            | PulseError::Conflict(msg)
            | PulseError::InvalidCode(msg)
            | PulseError::TooManyAttempts(msg) => msg.clone(),
            PulseError::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            // Don't leak details
            _ => "Internal server error".to_string(),
        }
    }
}

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

impl IntoResponse for PulseError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            crate::metrics::record_error(self.code());
        }

        let body = Json(ErrorResponse {
            success: false,
            message: self.public_message(),
            error: self.code().to_string(),
        });

        let mut response = (status, body).into_response();
        if let PulseError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<JsonRejection> for PulseError {
    fn from(rejection: JsonRejection) -> Self {
        PulseError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for PulseError {
    fn from(rejection: QueryRejection) -> Self {
        PulseError::Validation(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for PulseError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        PulseError::Validation(fields.join("; "))
    }
}

impl From<jsonwebtoken::errors::Error> for PulseError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        PulseError::Jwt(e.to_string())
    }
}

/// Result type alias for service operations
pub type PulseResult<T> = Result<T, PulseError>;
