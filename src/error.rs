//! Typed persistence errors for the credential and session stores.
//!
//! Expected absence (no cached document yet, no saved session) is modeled as
//! `Option`/empty results by the stores themselves; `StoreError` covers the
//! genuine faults that callers must see rather than have swallowed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store document: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("Vault encryption error: {0}")]
    Crypto(String),
}
