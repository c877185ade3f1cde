//! Remote authentication service boundary.
//!
//! This module defines the [`AuthApi`] trait the rest of the subsystem calls
//! through, its wire payloads, the typed [`ApiError`] taxonomy, and the
//! reqwest-backed [`AuthClient`] implementation.

pub mod client;
pub mod error;
pub mod service;

pub use client::AuthClient;
pub use error::ApiError;
pub use service::{AuthApi, AuthPayload, TokenPair};
