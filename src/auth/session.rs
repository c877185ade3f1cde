use std::path::PathBuf;

use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use keyring::Entry;
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Vault file name in the data directory
const VAULT_FILE: &str = "session.vault";

/// Keychain service under which the vault master secret is stored
const SERVICE_NAME: &str = "chatvault";

/// Keychain entry name for the vault master secret
const KEY_ENTRY: &str = "session-vault-key";

/// Argon2id salt length prepended to the vault file
const SALT_LEN: usize = 16;

/// ChaCha20-Poly1305 nonce length, stored after the salt
const NONCE_LEN: usize = 12;

/// Derived cipher key length
const KEY_LEN: usize = 32;

/// The single active session: bearer tokens plus the identity snapshot
/// captured at login or refresh time. Either all five fields exist in the
/// vault or the vault is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
    pub user_phone: String,
    pub user_name: String,
}

/// Master secret for the session vault.
///
/// Production callers obtain it from the OS keychain with
/// [`MasterKey::load_or_create`]; tests build one from raw bytes. The cipher
/// key is never this value directly: each write derives a fresh key from it
/// with Argon2id and a random salt.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Fetch the master secret from the OS keychain, creating and storing a
    /// random one on first use.
    pub fn load_or_create() -> Result<Self, StoreError> {
        let entry = Entry::new(SERVICE_NAME, KEY_ENTRY)?;
        match entry.get_password() {
            Ok(encoded) => Self::decode(&encoded),
            Err(keyring::Error::NoEntry) => {
                let mut secret = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut secret);
                entry.set_password(&BASE64.encode(secret))?;
                debug!("Created new session vault master key");
                Ok(Self(secret))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    fn decode(encoded: &str) -> Result<Self, StoreError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| StoreError::Crypto(format!("Malformed vault key in keychain: {}", e)))?;
        let secret: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| StoreError::Crypto("Vault key has wrong length".to_string()))?;
        Ok(Self(secret))
    }
}

/// Encrypted single-slot storage for the active session.
///
/// The vault file holds `salt ‖ nonce ‖ ciphertext`, where the ciphertext is
/// the ChaCha20-Poly1305 encryption of the JSON-serialized [`SessionTokens`]
/// under an Argon2id-derived key. Saves write the whole tuple to a temp file
/// and rename it into place, so a partial session can never be committed.
pub struct SessionStore {
    path: PathBuf,
    key: MasterKey,
    lock: RwLock<()>,
}

impl SessionStore {
    pub fn open(data_dir: PathBuf, key: MasterKey) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            path: data_dir.join(VAULT_FILE),
            key,
            lock: RwLock::new(()),
        })
    }

    /// Atomically overwrite the vault with the full session tuple
    pub fn save(&self, tokens: &SessionTokens) -> Result<(), StoreError> {
        let _guard = self.lock.write();

        let plaintext = serde_json::to_vec(tokens)?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| StoreError::Crypto("Vault encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        let tmp = self.path.with_extension("vault.tmp");
        std::fs::write(&tmp, &blob)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(user_id = tokens.user_id, "Session saved");
        Ok(())
    }

    /// Current session tuple, or `None` when never written or cleared.
    ///
    /// A vault that exists but cannot be decrypted or parsed is a persistence
    /// fault, not empty state.
    pub fn read(&self) -> Result<Option<SessionTokens>, StoreError> {
        let _guard = self.lock.read();

        if !self.path.exists() {
            return Ok(None);
        }
        let blob = std::fs::read(&self.path)?;
        if blob.len() < SALT_LEN + NONCE_LEN {
            return Err(StoreError::Crypto("Vault file truncated".to_string()));
        }

        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                StoreError::Crypto("Vault decryption failed (wrong key or tampered data)".to_string())
            })?;

        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// True iff both bearer tokens are present and non-empty
    pub fn has_session(&self) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .map(|t| !t.access_token.is_empty() && !t.refresh_token.is_empty())
            .unwrap_or(false))
    }

    /// Remove the vault; absent state afterwards
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        debug!("Session cleared");
        Ok(())
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], StoreError> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(&self.key.0, salt, &mut key)
            .map_err(|e| StoreError::Crypto(format!("Key derivation failed: {}", e)))?;
        Ok(key)
    }
}

// ============================================================================
// Tests
// ============================================================================
