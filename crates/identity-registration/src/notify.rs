//! Out-of-band passcode delivery.

use crate::identifier::AadhaarNumber;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("Passcode delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Channel that delivers a passcode to the holder of an identifier.
#[async_trait]
pub trait OtpNotifier: Send + Sync {
    async fn send_passcode(
        &self,
        identifier: &AadhaarNumber,
        display_name: &str,
        passcode: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;

    /// Provider name for logs.
    fn provider_name(&self) -> &str;
}

/// Stand-in for an SMS gateway: writes the passcode to the operational log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl OtpNotifier for LogNotifier {
    async fn send_passcode(
        &self,
        identifier: &AadhaarNumber,
        display_name: &str,
        passcode: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        info!(
            name = %display_name,
            aadhaar = %identifier,
            otp = %passcode,
            expires_at = %expires_at.to_rfc3339(),
            "Generated OTP (simulated SMS)"
        );
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "log"
    }
}
