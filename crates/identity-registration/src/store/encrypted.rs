//! Encrypted snapshot file for the store tables.

use super::{StoreError, Tables};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Key derivation path for snapshot encryption.
const KEY_DERIVATION_PATH: &str = "identity-registration/store";

/// Nonce size for AES-GCM (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// Derive the 32-byte snapshot key from the identifier secret.
///
/// SHA256(secret || key_derivation_path)
pub fn derive_store_key(secret: &SecretString) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.update(KEY_DERIVATION_PATH.as_bytes());

    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// AES-256-GCM encrypted snapshot of the tables on local disk.
pub struct EncryptedFile {
    path: PathBuf,
    key: [u8; 32],
}

impl EncryptedFile {
    pub fn new(path: PathBuf, key: [u8; 32]) -> Self {
        Self { path, key }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the tables.
    ///
    /// File format: [12 bytes nonce][ciphertext with auth tag]
    pub async fn save(&self, tables: &Tables) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(tables)?;
        let data = encrypt(&plaintext, &self.key)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(bytes = data.len(), path = ?self.path, "Saved encrypted snapshot");
        Ok(())
    }

    /// Load the tables. A missing file yields empty tables.
    pub async fn load(&self) -> Result<Tables, StoreError> {
        if !fs::try_exists(&self.path).await? {
            info!(path = ?self.path, "Snapshot not found, starting with empty store");
            return Ok(Tables::new());
        }

        let data = fs::read(&self.path).await?;
        if data.is_empty() {
            warn!(path = ?self.path, "Snapshot file is empty, starting with empty store");
            return Ok(Tables::new());
        }

        let plaintext = decrypt(&data, &self.key)?;
        let tables: Tables = serde_json::from_slice(&plaintext)?;

        info!(
            challenges = tables.count_challenges(),
            accounts = tables.count_accounts(),
            path = ?self.path,
            "Loaded encrypted snapshot"
        );
        Ok(tables)
    }
}

fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, StoreError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| StoreError::Encryption("AES-GCM encryption failed".into()))?;

    let mut data = nonce_bytes.to_vec();
    data.extend(ciphertext);
    Ok(data)
}

fn decrypt(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, StoreError> {
    if data.len() < NONCE_SIZE {
        return Err(StoreError::Encryption("Snapshot too short".into()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);

    cipher.decrypt(nonce, &data[NONCE_SIZE..]).map_err(|_| {
        StoreError::Encryption(
            "Failed to decrypt snapshot. The identity secret may have changed.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::IdentifierHash;
    use crate::store::Account;
    use chrono::Utc;

    #[test]
    fn test_encryption_round_trip() {
        let key = [0x42u8; 32];
        let data = b"Hello, World!";

        let encrypted = encrypt(data, &key).unwrap();
        assert_ne!(&encrypted[NONCE_SIZE..], data);
        assert!(encrypted.len() > data.len());

        assert_eq!(decrypt(&encrypted, &key).unwrap(), data);
    }

    #[test]
    fn test_encryption_different_keys() {
        let encrypted = encrypt(b"Secret data", &[0x42u8; 32]).unwrap();
        assert!(decrypt(&encrypted, &[0x43u8; 32]).is_err());
    }

    #[test]
    fn test_encryption_tamper_detection() {
        let key = [0x42u8; 32];
        let mut encrypted = encrypt(b"Sensitive information", &key).unwrap();

        if let Some(byte) = encrypted.last_mut() {
            *byte ^= 0xFF;
        }

        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_derive_store_key_depends_on_secret() {
        let a = derive_store_key(&SecretString::new("one".into()));
        let b = derive_store_key(&SecretString::new("one".into()));
        let c = derive_store_key(&SecretString::new("two".into()));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = EncryptedFile::new(dir.path().join("store.enc"), [7u8; 32]);

        let tables = file.load().await.unwrap();
        assert_eq!(tables.count_accounts(), 0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.enc");
        let file = EncryptedFile::new(path.clone(), [7u8; 32]);

        let mut tables = Tables::new();
        let key = IdentifierHash::from("h1".to_string());
        tables
            .insert_account(Account::new(key.clone(), "9012".into(), "hash".into(), Utc::now()))
            .unwrap();
        file.save(&tables).await.unwrap();

        // Nothing readable on disk
        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("9012"));

        let restored = file.load().await.unwrap();
        assert_eq!(restored.account(&key).unwrap().last4, "9012");

        let wrong_key = EncryptedFile::new(path, [8u8; 32]);
        assert!(matches!(
            wrong_key.load().await,
            Err(StoreError::Encryption(_))
        ));
    }
}
