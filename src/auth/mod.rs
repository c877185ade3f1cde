//! Session storage and lifecycle.
//!
//! This module provides:
//! - `SessionStore`: encrypted single-slot storage for the active session's
//!   tokens and identity snapshot
//! - `MasterKey`: the keychain-backed secret the vault is encrypted under
//! - `SessionValidator`: the startup decision of whether a stored session is
//!   still usable, refreshing it transparently when possible
//!
//! Exactly one session exists at a time; the per-account credential cache
//! lives separately in the `cache` module.

pub mod session;
pub mod validator;

pub use session::{MasterKey, SessionStore, SessionTokens};
pub use validator::SessionValidator;
