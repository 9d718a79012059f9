//! Unified API error handling.
//!
//! Every failure leaves the service as `{"message": "..."}` with a status taken
//! from its [`ErrorCode`]. Internal failures are logged here and replaced with
//! a generic message so store or crypto details never reach the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::identity::IdentityError;
use crate::auth::{AuthError, TokenError};

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    ValidationError,
    Unauthorized,

    // Server errors (5xx)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

/// Wire shape of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    // -------------------------------------------------------------------------
    // Convenience constructors for common error types
    // -------------------------------------------------------------------------

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Input failed validation (400)
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Unauthorized error (401)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversions from domain errors
// -------------------------------------------------------------------------

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateEmail => {
                tracing::info!("Sign-up rejected: email already registered");
                ApiError::bad_request("user with this email already exists")
            }
            AuthError::InvalidCredentials => {
                tracing::info!("Sign-in rejected: invalid credentials");
                ApiError::unauthorized("invalid email or password")
            }
            AuthError::UnknownOrExpiredSession
            | AuthError::UnknownSession
            | AuthError::RefreshTokenExpired => {
                tracing::info!("Session rejected: {}", err);
                ApiError::unauthorized(err.to_string())
            }
            AuthError::NotFound => {
                // Only reachable with a valid token whose user no longer resolves.
                tracing::info!("Identity rejected: {}", err);
                ApiError::unauthorized(err.to_string())
            }
            AuthError::InvalidResetCode | AuthError::ResetCodeExpired => {
                tracing::info!("Reset code rejected: {}", err);
                ApiError::bad_request(err.to_string())
            }
            AuthError::Store(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::database("A database error occurred")
            }
            AuthError::Token(e) => {
                tracing::error!("Token error: {}", e);
                ApiError::internal("An internal error occurred")
            }
            other => {
                tracing::error!("Internal error: {}", other);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingHeader | IdentityError::MalformedHeader => {
                tracing::debug!("Rejected request: {}", err);
                ApiError::unauthorized(err.to_string())
            }
            IdentityError::InvalidToken(TokenError::Expired) => {
                tracing::debug!("Rejected request: access token expired");
                ApiError::unauthorized(TokenError::Expired.to_string())
            }
            IdentityError::InvalidToken(e) => {
                // Anything but expiry is reported as a server fault.
                tracing::warn!("Access token rejected: {}", e);
                ApiError::internal(e.to_string())
            }
        }
    }
}
