//! Identity Registration - Aadhaar-backed account sign-up.
//!
//! A caller proves control of an Aadhaar number with a one-time passcode,
//! then sets a password to create an account:
//! - Raw Aadhaar numbers are never stored; records are keyed by an HMAC
//! - At most one live passcode per identifier, valid for a short window
//! - A passcode is consumed when the account is created

pub mod api;
pub mod config;
pub mod error;
pub mod identifier;
pub mod notify;
pub mod otp;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::RegistrationError;
pub use identifier::{AadhaarNumber, IdentifierHash, IdentifierHasher};
pub use service::{RegistrationService, ServiceSettings};
pub use store::{Account, AccountStore, ChallengeStore, OtpChallenge, Store};
