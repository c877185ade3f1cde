//! Local credential caching for the login screen.
//!
//! This module provides the `AccountStore`, a bounded cache of per-phone
//! login credentials persisted as a single JSON document. Retention is
//! least-recently-used with a cap of 10 accounts, and retrieval order drives
//! the "recent accounts" quick-switch list.

pub mod accounts;

pub use accounts::{AccountRecord, AccountStore};
