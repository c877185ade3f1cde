//! Login-screen state coordination.
//!
//! This module provides the `LoginCoordinator`, which backs the login form's
//! phone field with debounced credential-cache lookups, drives the recent
//! accounts quick-switch list, and runs the login/registration/logout flows
//! against the remote boundary and the two stores.

pub mod coordinator;

pub use coordinator::{LoginCoordinator, LoginForm, LoginState};
