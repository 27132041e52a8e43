//! One-time passcode generation, validation and the clock it is checked against.

use crate::store::OtpChallenge;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Mutex;

/// Smallest passcode handed out. Six digits, no leading zero.
const PASSCODE_MIN: u32 = 100_000;
const PASSCODE_MAX: u32 = 999_999;

/// Draw a uniformly random six-digit passcode.
pub fn generate_passcode() -> String {
    rand::thread_rng()
        .gen_range(PASSCODE_MIN..=PASSCODE_MAX)
        .to_string()
}

/// Outcome of checking a submitted passcode against the stored challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeCheck {
    Valid,
    /// No challenge exists for the identifier
    Missing,
    /// Passcode does not match
    Mismatch,
    /// Passcode matched but the validity window has passed
    Expired,
}

/// Check a passcode. Order matters: existence, then match, then expiry.
///
/// A challenge is still valid at exactly `expires_at`.
pub fn check_challenge(
    challenge: Option<&OtpChallenge>,
    passcode: &str,
    now: DateTime<Utc>,
) -> ChallengeCheck {
    let Some(challenge) = challenge else {
        return ChallengeCheck::Missing;
    };

    if challenge.passcode != passcode {
        return ChallengeCheck::Mismatch;
    }

    if now > challenge.expires_at {
        return ChallengeCheck::Expired;
    }

    ChallengeCheck::Valid
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to exercise expiry.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
