use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::User;

use super::ApiError;

/// Access/refresh token pair issued by a refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Full authentication payload returned by login and registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Remote authentication service boundary.
///
/// The transport behind this trait is an external contract; this subsystem
/// only ever calls through the interface. `AuthClient` is the HTTP
/// implementation; tests substitute in-memory fakes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Authenticate with phone and password
    async fn login(&self, phone: &str, password: &str) -> Result<AuthPayload, ApiError>;

    /// Create an account and authenticate in one step
    async fn register(
        &self,
        phone: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthPayload, ApiError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;

    /// Fetch the identity behind an access token; an error here means the
    /// token was rejected or the service was unreachable
    async fn get_user_info(&self, access_token: &str, user_id: i64) -> Result<User, ApiError>;
}
