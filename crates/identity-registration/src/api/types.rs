//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to issue an OTP.
///
/// Fields are optional so that absent and empty values both surface as
/// "Missing fields" rather than a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct SendOtpRequest {
    /// 12-digit Aadhaar number
    pub aadhaar: Option<String>,

    /// Display name of the applicant
    pub name: Option<String>,
}

/// Response after issuing an OTP.
#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub message: String,

    /// Only present when passcode echo is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,

    pub expires_at: String,
}

/// Request to check an OTP.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    pub aadhaar: Option<String>,
    pub otp: Option<String>,
}

/// Request to complete registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub aadhaar: Option<String>,
    pub otp: Option<String>,
    pub password: Option<String>,
}

/// Plain success response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub challenges: usize,
    pub accounts: usize,
}
