//! Persistence for OTP challenges and accounts.

mod encrypted;
mod memory;

pub use encrypted::{derive_store_key, EncryptedFile};
pub use memory::Tables;

use crate::identifier::IdentifierHash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record already exists for identifier {0}")]
    Duplicate(IdentifierHash),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot encryption error: {0}")]
    Encryption(String),

    #[error("Unsupported store URL: {0}")]
    InvalidUrl(String),
}

/// A live passcode challenge. At most one per identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub identifier_hash: IdentifierHash,
    pub display_name: String,
    pub passcode: String,
    pub expires_at: DateTime<Utc>,
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub identifier_hash: IdentifierHash,
    /// Last four digits of the Aadhaar number, display only
    pub last4: String,
    /// bcrypt hash
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        identifier_hash: IdentifierHash,
        last4: String,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier_hash,
            last4,
            password_hash,
            created_at,
        }
    }
}

/// Challenge persistence: upsert, exact lookup, delete.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn find_challenge(
        &self,
        key: &IdentifierHash,
    ) -> Result<Option<OtpChallenge>, StoreError>;

    /// Insert or replace the challenge for its identifier.
    async fn upsert_challenge(&self, challenge: OtpChallenge) -> Result<(), StoreError>;

    /// Returns whether a challenge was removed.
    async fn delete_challenge(&self, key: &IdentifierHash) -> Result<bool, StoreError>;
}

/// Account persistence: exact lookup and unique insert.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, key: &IdentifierHash) -> Result<Option<Account>, StoreError>;

    /// Insert a new account. Fails with [`StoreError::Duplicate`] if the
    /// identifier is already registered.
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;
}

/// Where the tables are persisted.
pub enum Persistence {
    /// AES-GCM encrypted file
    Encrypted(EncryptedFile),
    /// Process memory only
    Memory,
}

/// Record counts, for the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub challenges: usize,
    pub accounts: usize,
}

/// Store implementing both [`ChallengeStore`] and [`AccountStore`].
///
/// Writers are serialized by one lock; with file persistence each write is
/// flushed to disk before the lock is released and rolled back if that fails.
pub struct Store {
    tables: RwLock<Tables>,
    persistence: Persistence,
}

impl Store {
    /// Open a store from a connection URL.
    ///
    /// - `memory://` keeps everything in process memory
    /// - `file:///path/to/store.enc` or a bare path uses an encrypted snapshot
    ///   keyed from `secret`
    pub async fn open(url: &str, secret: &SecretString) -> Result<Self, StoreError> {
        let url = url.trim();

        if url == "memory://" || url == "memory" {
            warn!("Using in-memory storage (data will be lost on restart)");
            return Ok(Self::memory());
        }

        let path = match url.split_once("://") {
            Some(("file", path)) if !path.is_empty() => PathBuf::from(path),
            Some(_) => return Err(StoreError::InvalidUrl(url.to_string())),
            None if !url.is_empty() => PathBuf::from(url),
            None => return Err(StoreError::InvalidUrl(url.to_string())),
        };

        let file = EncryptedFile::new(path, derive_store_key(secret));
        let tables = file.load().await?;
        info!(path = ?file.path(), "Using encrypted file storage");

        Ok(Self {
            tables: RwLock::new(tables),
            persistence: Persistence::Encrypted(file),
        })
    }

    /// Empty in-memory store.
    pub fn memory() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            persistence: Persistence::Memory,
        }
    }

    /// Short backend name for diagnostics.
    pub fn backend(&self) -> &'static str {
        match self.persistence {
            Persistence::Encrypted(_) => "encrypted-file",
            Persistence::Memory => "memory",
        }
    }

    pub async fn stats(&self) -> StoreStats {
        let tables = self.tables.read().await;
        StoreStats {
            challenges: tables.count_challenges(),
            accounts: tables.count_accounts(),
        }
    }

    async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        match &self.persistence {
            Persistence::Encrypted(file) => file.save(tables).await,
            Persistence::Memory => Ok(()),
        }
    }
}

#[async_trait]
impl ChallengeStore for Store {
    async fn find_challenge(
        &self,
        key: &IdentifierHash,
    ) -> Result<Option<OtpChallenge>, StoreError> {
        Ok(self.tables.read().await.challenge(key).cloned())
    }

    async fn upsert_challenge(&self, challenge: OtpChallenge) -> Result<(), StoreError> {
        let key = challenge.identifier_hash.clone();
        let mut tables = self.tables.write().await;
        let previous = tables.upsert_challenge(challenge);

        if let Err(e) = self.persist(&tables).await {
            match previous {
                Some(previous) => {
                    tables.upsert_challenge(previous);
                }
                None => {
                    tables.remove_challenge(&key);
                }
            }
            return Err(e);
        }

        debug!(replaced = previous.is_some(), "Challenge stored");
        Ok(())
    }

    async fn delete_challenge(&self, key: &IdentifierHash) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(removed) = tables.remove_challenge(key) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&tables).await {
            tables.upsert_challenge(removed);
            return Err(e);
        }

        Ok(true)
    }
}

#[async_trait]
impl AccountStore for Store {
    async fn find_account(&self, key: &IdentifierHash) -> Result<Option<Account>, StoreError> {
        Ok(self.tables.read().await.account(key).cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let key = account.identifier_hash.clone();
        let mut tables = self.tables.write().await;
        tables.insert_account(account)?;

        if let Err(e) = self.persist(&tables).await {
            tables.remove_account(&key);
            return Err(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn key(s: &str) -> IdentifierHash {
        IdentifierHash::from(s.to_string())
    }

    fn secret() -> SecretString {
        SecretString::new("test-secret".into())
    }

    fn challenge(k: &str, passcode: &str) -> OtpChallenge {
        OtpChallenge {
            identifier_hash: key(k),
            display_name: "Asha".into(),
            passcode: passcode.into(),
            expires_at: Utc::now() + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = Store::open("memory://", &secret()).await.unwrap();
        assert_eq!(store.backend(), "memory");
        assert_eq!(
            store.stats().await,
            StoreStats {
                challenges: 0,
                accounts: 0
            }
        );
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_scheme() {
        let result = Store::open("mongodb://localhost:27017/app", &secret()).await;
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));

        let result = Store::open("", &secret()).await;
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_challenge_lifecycle() {
        let store = Store::memory();

        assert!(store.find_challenge(&key("h1")).await.unwrap().is_none());

        store.upsert_challenge(challenge("h1", "111111")).await.unwrap();
        store.upsert_challenge(challenge("h1", "222222")).await.unwrap();

        let found = store.find_challenge(&key("h1")).await.unwrap().unwrap();
        assert_eq!(found.passcode, "222222");
        assert_eq!(store.stats().await.challenges, 1);

        assert!(store.delete_challenge(&key("h1")).await.unwrap());
        assert!(!store.delete_challenge(&key("h1")).await.unwrap());
        assert!(store.find_challenge(&key("h1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_account_insert_has_single_winner() {
        let store = Arc::new(Store::memory());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let account =
                    Account::new(key("h1"), "9012".into(), format!("hash-{}", i), Utc::now());
                store.insert_account(account).await
            }));
        }

        let mut ok = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::Duplicate(_)) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(store.stats().await.accounts, 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("store.enc").display());

        {
            let store = Store::open(&url, &secret()).await.unwrap();
            assert_eq!(store.backend(), "encrypted-file");
            store.upsert_challenge(challenge("h1", "111111")).await.unwrap();
            store
                .insert_account(Account::new(key("h2"), "9012".into(), "x".into(), Utc::now()))
                .await
                .unwrap();
        }

        let store = Store::open(&url, &secret()).await.unwrap();
        assert_eq!(
            store.find_challenge(&key("h1")).await.unwrap().unwrap().passcode,
            "111111"
        );
        assert!(store.find_account(&key("h2")).await.unwrap().is_some());

        let other = Store::open(&url, &SecretString::new("other".into())).await;
        assert!(matches!(other, Err(StoreError::Encryption(_))));
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // Parent is a regular file, so every save fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let store = Store {
            tables: RwLock::new(Tables::new()),
            persistence: Persistence::Encrypted(EncryptedFile::new(
                blocker.join("store.enc"),
                [1u8; 32],
            )),
        };

        assert!(store.upsert_challenge(challenge("h1", "111111")).await.is_err());
        assert!(store.find_challenge(&key("h1")).await.unwrap().is_none());

        let account = Account::new(key("h2"), "9012".into(), "x".into(), Utc::now());
        assert!(store.insert_account(account).await.is_err());
        assert!(store.find_account(&key("h2")).await.unwrap().is_none());
    }
}
