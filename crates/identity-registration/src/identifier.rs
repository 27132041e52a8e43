//! Aadhaar number parsing and keyed identifier hashing.
//!
//! Raw Aadhaar numbers only live for the duration of a request. Everything
//! that is stored or logged uses either the keyed hash or the masked form.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Number of digits in an Aadhaar number.
pub const AADHAAR_LENGTH: usize = 12;

/// Hasher construction errors.
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("identifier secret must not be empty")]
    EmptySecret,

    #[error("identifier secret rejected by HMAC")]
    InvalidKey,
}

/// A syntactically valid Aadhaar number (exactly 12 ASCII digits).
///
/// `Debug` and `Display` only reveal the last four digits.
#[derive(Clone, PartialEq, Eq)]
pub struct AadhaarNumber(String);

impl AadhaarNumber {
    /// Parse a raw Aadhaar number. Returns `None` unless the input is
    /// exactly 12 ASCII decimal digits (no whitespace, no separators).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == AADHAAR_LENGTH && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Last four digits, kept on the account for display.
    pub fn last4(&self) -> &str {
        &self.0[AADHAAR_LENGTH - 4..]
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AadhaarNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XXXXXXXX{}", self.last4())
    }
}

impl fmt::Debug for AadhaarNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AadhaarNumber").field(&self.to_string()).finish()
    }
}

/// Opaque storage key derived from an Aadhaar number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierHash(String);

impl IdentifierHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentifierHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// HMAC-SHA256 over the raw identifier, hex encoded.
#[derive(Clone)]
pub struct IdentifierHasher {
    mac: HmacSha256,
}

impl IdentifierHasher {
    pub fn new(secret: &SecretString) -> Result<Self, IdentifierError> {
        let key = secret.expose_secret();
        if key.is_empty() {
            return Err(IdentifierError::EmptySecret);
        }

        let mac =
            HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| IdentifierError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Hash a validated Aadhaar number.
    pub fn hash(&self, identifier: &AadhaarNumber) -> IdentifierHash {
        IdentifierHash(self.digest(identifier.as_bytes()))
    }

    fn digest(&self, input: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(input);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for IdentifierHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierHasher").finish_non_exhaustive()
    }
}
