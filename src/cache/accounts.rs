use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Maximum number of cached accounts. Saving an 11th distinct phone evicts
/// the least-recently-used record.
const MAX_CACHE_COUNT: usize = 10;

/// File name of the persisted account cache document
const ACCOUNTS_FILE: &str = "accounts.json";

/// One cached login identity, keyed by phone number.
///
/// The password is opaque to this store; callers are expected to hand it an
/// already-encrypted value (or the empty string to keep the slot without a
/// remembered password). The token fields are reserved schema for a
/// per-account session cache and are not written by the session path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub phone: String,
    /// Milliseconds since epoch of the most recent write-or-touch
    pub last_used_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expire_time: Option<i64>,
}

/// Serialization container for the whole cache document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountCache {
    accounts: Vec<AccountRecord>,
}

/// Durable, bounded, recency-ordered cache of per-phone credentials.
///
/// The parsed document lives in memory under an `RwLock`; every mutation
/// rewrites the JSON file on disk while the write lock is held, so concurrent
/// writers cannot interleave partial updates. Construct one instance and pass
/// it to consumers.
pub struct AccountStore {
    path: PathBuf,
    cache: RwLock<AccountCache>,
}

impl AccountStore {
    /// Open the store rooted at `data_dir`, loading any existing document.
    ///
    /// A missing or empty file is normal empty state. A document that exists
    /// but fails to parse is a persistence fault and is returned as an error.
    pub fn open(data_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        let path = data_dir.join(ACCOUNTS_FILE);
        let cache = Self::load_document(&path)?;
        debug!(?path, accounts = cache.accounts.len(), "Account cache opened");
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    fn load_document(path: &PathBuf) -> Result<AccountCache, StoreError> {
        if !path.exists() {
            return Ok(AccountCache::default());
        }
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(AccountCache::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Create or overwrite the record for `phone` and mark it most recent.
    ///
    /// An empty `password` is a deliberate "forget the password, keep the
    /// slot" write: the record is kept (or created) with no stored password
    /// and its recency still updates.
    pub fn save_or_update(&self, phone: &str, password: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write();
        let stamp = Self::next_stamp(&cache);
        let stored = if password.is_empty() {
            None
        } else {
            Some(password.to_string())
        };

        if let Some(record) = cache.accounts.iter_mut().find(|a| a.phone == phone) {
            record.password = stored;
            record.last_used_time = stamp;
        } else {
            cache.accounts.push(AccountRecord {
                phone: phone.to_string(),
                last_used_time: stamp,
                password: stored,
                access_token: None,
                refresh_token: None,
                token_expire_time: None,
            });
            if cache.accounts.len() > MAX_CACHE_COUNT {
                Self::evict_least_used(&mut cache);
            }
        }
        self.persist(&cache)
    }

    /// Drop the record with the smallest `last_used_time`; the first-inserted
    /// record loses a timestamp tie.
    fn evict_least_used(cache: &mut AccountCache) {
        let mut victim = 0;
        for (i, record) in cache.accounts.iter().enumerate() {
            if record.last_used_time < cache.accounts[victim].last_used_time {
                victim = i;
            }
        }
        let evicted = cache.accounts.remove(victim);
        debug!(phone = %evicted.phone, "Evicted least-recently-used account");
    }

    /// Stored password for `phone`, or the empty string when the phone is
    /// unknown or has no remembered password. Never an error.
    pub fn get_password(&self, phone: &str) -> String {
        self.cache
            .read()
            .accounts
            .iter()
            .find(|a| a.phone == phone)
            .and_then(|a| a.password.clone())
            .unwrap_or_default()
    }

    /// Forget the password for `phone`, keeping the slot and refreshing its
    /// recency. No-op for an unknown phone.
    pub fn clear_password(&self, phone: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write();
        let stamp = Self::next_stamp(&cache);
        match cache.accounts.iter_mut().find(|a| a.phone == phone) {
            Some(record) => {
                record.password = None;
                record.last_used_time = stamp;
            }
            None => return Ok(()),
        }
        self.persist(&cache)
    }

    /// All known phone numbers, most-recently-used first
    pub fn list_by_recency(&self) -> Vec<String> {
        let cache = self.cache.read();
        let mut accounts: Vec<(&String, i64)> = cache
            .accounts
            .iter()
            .map(|a| (&a.phone, a.last_used_time))
            .collect();
        accounts.sort_by(|a, b| b.1.cmp(&a.1));
        accounts.into_iter().map(|(phone, _)| phone.clone()).collect()
    }

    pub fn get_record(&self, phone: &str) -> Option<AccountRecord> {
        self.cache
            .read()
            .accounts
            .iter()
            .find(|a| a.phone == phone)
            .cloned()
    }

    pub fn remove(&self, phone: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write();
        let before = cache.accounts.len();
        cache.accounts.retain(|a| a.phone != phone);
        if cache.accounts.len() == before {
            return Ok(());
        }
        self.persist(&cache)
    }

    /// Drop every record and the persisted document
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let mut cache = self.cache.write();
        cache.accounts.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cache.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().accounts.is_empty()
    }

    /// Timestamp for a write-or-touch: wall-clock millis, bumped past the
    /// current maximum so recency stays a strict order even when writes land
    /// inside the same millisecond.
    fn next_stamp(cache: &AccountCache) -> i64 {
        let now = Utc::now().timestamp_millis();
        let max = cache
            .accounts
            .iter()
            .map(|a| a.last_used_time)
            .max()
            .unwrap_or(i64::MIN);
        now.max(max.saturating_add(1))
    }

    fn persist(&self, cache: &AccountCache) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(cache)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
