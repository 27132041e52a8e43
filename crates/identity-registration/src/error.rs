//! Error types for the registration service.

use crate::notify::NotifyError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned for any unexpected failure. Details stay in the logs.
const INTERNAL_MESSAGE: &str = "Something went wrong";

/// Registration error types.
///
/// The `Display` text of the expected failures is the message sent to clients.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Missing fields")]
    MissingFields,

    #[error("Invalid Aadhaar")]
    InvalidIdentifier,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("No OTP session found")]
    NoChallenge,

    #[error("Invalid OTP")]
    PasscodeMismatch,

    #[error("OTP expired")]
    ChallengeExpired,

    /// Lost a race with a concurrent registration of the same identifier
    #[error("User already registered")]
    DuplicateAccount,

    #[error("Too many requests")]
    RateLimitExceeded,

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Notification(#[from] NotifyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationError::MissingFields => "MISSING_FIELDS",
            RegistrationError::InvalidIdentifier => "INVALID_AADHAAR",
            RegistrationError::AlreadyRegistered => "ALREADY_REGISTERED",
            RegistrationError::NoChallenge => "NO_OTP_SESSION",
            RegistrationError::PasscodeMismatch => "INVALID_OTP",
            RegistrationError::ChallengeExpired => "OTP_EXPIRED",
            RegistrationError::DuplicateAccount => "DUPLICATE_ACCOUNT",
            RegistrationError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            RegistrationError::Storage(_)
            | RegistrationError::PasswordHash(_)
            | RegistrationError::Notification(_)
            | RegistrationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RegistrationError::MissingFields
            | RegistrationError::InvalidIdentifier
            | RegistrationError::AlreadyRegistered
            | RegistrationError::NoChallenge
            | RegistrationError::PasscodeMismatch
            | RegistrationError::ChallengeExpired
            | RegistrationError::DuplicateAccount => StatusCode::BAD_REQUEST,
            RegistrationError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            RegistrationError::Storage(_)
            | RegistrationError::PasswordHash(_)
            | RegistrationError::Notification(_)
            | RegistrationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            message,
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => RegistrationError::DuplicateAccount,
            other => RegistrationError::Storage(other),
        }
    }
}

impl From<bcrypt::BcryptError> for RegistrationError {
    fn from(e: bcrypt::BcryptError) -> Self {
        RegistrationError::PasswordHash(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RegistrationError {
    fn from(e: tokio::task::JoinError) -> Self {
        RegistrationError::Internal(format!("Blocking task failed: {}", e))
    }
}
