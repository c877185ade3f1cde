//! Credential cache and session lifecycle core for the Chatvault messaging
//! client.
//!
//! This crate owns the pieces of the client with real invariants to keep:
//!
//! - `cache`: the bounded, least-recently-used cache of per-phone login
//!   credentials behind the login screen
//! - `auth`: encrypted single-slot storage for the active session's tokens,
//!   plus the startup validator that decides whether a stored session is
//!   still usable (refreshing it transparently when it is not)
//! - `login`: the debounced coordinator between the login form and the
//!   credential cache, and the login/registration flows that write the stores
//! - `api`: the remote authentication service boundary and its HTTP client
//!
//! Screen rendering, navigation, and message handling live elsewhere; nothing
//! here touches the UI beyond exposing form state.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod login;
pub mod models;

pub use api::{ApiError, AuthApi, AuthClient, AuthPayload, TokenPair};
pub use auth::{MasterKey, SessionStore, SessionTokens, SessionValidator};
pub use cache::{AccountRecord, AccountStore};
pub use config::Config;
pub use error::StoreError;
pub use login::{LoginCoordinator, LoginForm, LoginState};
