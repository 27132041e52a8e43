//! Issue, verify and register: the OTP registration flow.

use crate::error::RegistrationError;
use crate::identifier::{AadhaarNumber, IdentifierHash, IdentifierHasher};
use crate::notify::{LogNotifier, OtpNotifier};
use crate::otp::{check_challenge, generate_passcode, ChallengeCheck, Clock, SystemClock};
use crate::store::{Account, AccountStore, ChallengeStore, OtpChallenge};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tunables for the flow.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// How long an issued passcode stays valid
    pub otp_ttl: std::time::Duration,
    /// bcrypt cost factor for account passwords
    pub bcrypt_cost: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            otp_ttl: std::time::Duration::from_secs(5 * 60),
            bcrypt_cost: 10,
        }
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub passcode: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegisteredAccount {
    pub last4: String,
    pub created_at: DateTime<Utc>,
}

/// Stateless orchestration over the hasher and the two stores.
pub struct RegistrationService {
    hasher: IdentifierHasher,
    challenges: Arc<dyn ChallengeStore>,
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn OtpNotifier>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl RegistrationService {
    /// Create a service that logs passcodes and uses the system clock.
    pub fn new(
        hasher: IdentifierHasher,
        challenges: Arc<dyn ChallengeStore>,
        accounts: Arc<dyn AccountStore>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            hasher,
            challenges,
            accounts,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OtpNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a passcode for `aadhaar`, replacing any outstanding one.
    #[instrument(skip_all)]
    pub async fn issue_challenge(
        &self,
        aadhaar: &str,
        name: &str,
    ) -> Result<IssuedChallenge, RegistrationError> {
        if aadhaar.is_empty() || name.is_empty() {
            return Err(RegistrationError::MissingFields);
        }
        let identifier =
            AadhaarNumber::parse(aadhaar).ok_or(RegistrationError::InvalidIdentifier)?;
        let key = self.hasher.hash(&identifier);

        if self.accounts.find_account(&key).await?.is_some() {
            warn!(aadhaar = %identifier, "OTP requested for registered identifier");
            return Err(RegistrationError::AlreadyRegistered);
        }

        let ttl = Duration::from_std(self.settings.otp_ttl)
            .map_err(|e| RegistrationError::Internal(format!("Invalid OTP TTL: {}", e)))?;
        let passcode = generate_passcode();
        let expires_at = self.clock.now() + ttl;

        self.challenges
            .upsert_challenge(OtpChallenge {
                identifier_hash: key,
                display_name: name.to_string(),
                passcode: passcode.clone(),
                expires_at,
            })
            .await?;

        self.notifier
            .send_passcode(&identifier, name, &passcode, expires_at)
            .await?;

        info!(
            aadhaar = %identifier,
            provider = self.notifier.provider_name(),
            "OTP issued"
        );

        Ok(IssuedChallenge {
            passcode,
            expires_at,
        })
    }

    /// Check a passcode without consuming it.
    #[instrument(skip_all)]
    pub async fn verify_challenge(
        &self,
        aadhaar: &str,
        passcode: &str,
    ) -> Result<(), RegistrationError> {
        if aadhaar.is_empty() || passcode.is_empty() {
            return Err(RegistrationError::MissingFields);
        }

        let (_, key) = self.validate_passcode(aadhaar, passcode).await?;
        debug!(identifier_hash = %key, "OTP verified");
        Ok(())
    }

    /// Verify the passcode, create the account and consume the challenge.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        aadhaar: &str,
        passcode: &str,
        password: &str,
    ) -> Result<RegisteredAccount, RegistrationError> {
        if aadhaar.is_empty() || passcode.is_empty() || password.is_empty() {
            return Err(RegistrationError::MissingFields);
        }

        let (identifier, key) = self.validate_passcode(aadhaar, passcode).await?;
        let last4 = identifier.last4().to_string();

        let password = password.to_string();
        let cost = self.settings.bcrypt_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let created_at = self.clock.now();
        self.accounts
            .insert_account(Account::new(
                key.clone(),
                last4.clone(),
                password_hash,
                created_at,
            ))
            .await?;

        // The account now blocks reuse even if the delete fails.
        if let Err(e) = self.challenges.delete_challenge(&key).await {
            warn!(identifier_hash = %key, error = %e, "Failed to consume OTP challenge");
        }

        info!(last4 = %last4, "Registration successful");

        Ok(RegisteredAccount { last4, created_at })
    }

    /// Shared check for verify and register. Never mutates the store.
    async fn validate_passcode(
        &self,
        aadhaar: &str,
        passcode: &str,
    ) -> Result<(AadhaarNumber, IdentifierHash), RegistrationError> {
        // A malformed identifier can never have been issued a challenge
        let identifier = AadhaarNumber::parse(aadhaar).ok_or(RegistrationError::NoChallenge)?;
        let key = self.hasher.hash(&identifier);

        let challenge = self.challenges.find_challenge(&key).await?;

        match check_challenge(challenge.as_ref(), passcode, self.clock.now()) {
            ChallengeCheck::Valid => Ok((identifier, key)),
            ChallengeCheck::Missing => Err(RegistrationError::NoChallenge),
            ChallengeCheck::Mismatch => {
                warn!(aadhaar = %identifier, "OTP mismatch");
                Err(RegistrationError::PasscodeMismatch)
            }
            ChallengeCheck::Expired => Err(RegistrationError::ChallengeExpired),
        }
    }
}
