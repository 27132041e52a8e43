//! In-memory tables backing both stores.

use super::{Account, OtpChallenge, StoreError};
use crate::identifier::IdentifierHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Challenge and account tables, keyed by identifier hash.
///
/// This is also the unit that gets snapshotted to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    challenges: HashMap<IdentifierHash, OtpChallenge>,
    #[serde(default)]
    accounts: HashMap<IdentifierHash, Account>,
}

impl Tables {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live challenge for an identifier.
    pub fn challenge(&self, key: &IdentifierHash) -> Option<&OtpChallenge> {
        self.challenges.get(key)
    }

    /// Insert or replace the challenge for its identifier.
    ///
    /// Returns the challenge that was replaced, if any.
    pub fn upsert_challenge(&mut self, challenge: OtpChallenge) -> Option<OtpChallenge> {
        self.challenges.insert(challenge.identifier_hash.clone(), challenge)
    }

    /// Remove the challenge for an identifier.
    pub fn remove_challenge(&mut self, key: &IdentifierHash) -> Option<OtpChallenge> {
        self.challenges.remove(key)
    }

    /// Get an account by identifier.
    pub fn account(&self, key: &IdentifierHash) -> Option<&Account> {
        self.accounts.get(key)
    }

    /// Insert a new account. Fails if one already exists for the identifier.
    pub fn insert_account(&mut self, account: Account) -> Result<(), StoreError> {
        if self.accounts.contains_key(&account.identifier_hash) {
            return Err(StoreError::Duplicate(account.identifier_hash));
        }
        self.accounts.insert(account.identifier_hash.clone(), account);
        Ok(())
    }

    /// Undo an account insert after a failed persist.
    pub(super) fn remove_account(&mut self, key: &IdentifierHash) -> Option<Account> {
        self.accounts.remove(key)
    }

    pub fn count_challenges(&self) -> usize {
        self.challenges.len()
    }

    pub fn count_accounts(&self) -> usize {
        self.accounts.len()
    }
}
