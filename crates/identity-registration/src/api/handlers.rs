//! HTTP request handlers.

use super::types::{
    HealthResponse, MessageResponse, RegisterRequest, SendOtpRequest, SendOtpResponse,
    VerifyOtpRequest,
};
use super::AppState;
use crate::error::RegistrationError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

/// Unwrap a JSON body, treating any malformed body as missing fields.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RegistrationError> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected request body");
            Err(RegistrationError::MissingFields)
        }
    }
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.store.stats().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        storage: state.store.backend().to_string(),
        challenges: stats.challenges,
        accounts: stats.accounts,
    })
}

/// Issue an OTP for an Aadhaar number.
pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<SendOtpResponse>, RegistrationError> {
    let request = body(payload)?;

    let issued = state
        .service
        .issue_challenge(
            request.aadhaar.as_deref().unwrap_or_default(),
            request.name.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(SendOtpResponse {
        message: "OTP sent successfully".to_string(),
        otp: state.expose_passcode.then_some(issued.passcode),
        expires_at: issued.expires_at.to_rfc3339(),
    }))
}

/// Check an OTP without consuming it.
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, RegistrationError> {
    let request = body(payload)?;

    state
        .service
        .verify_challenge(
            request.aadhaar.as_deref().unwrap_or_default(),
            request.otp.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(MessageResponse::new("OTP verified successfully!")))
}

/// Consume an OTP and create the account.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), RegistrationError> {
    let request = body(payload)?;

    state
        .service
        .register(
            request.aadhaar.as_deref().unwrap_or_default(),
            request.otp.as_deref().unwrap_or_default(),
            request.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Registration successful")),
    ))
}
