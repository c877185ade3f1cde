//! HTTP client for the Chatvault authentication service.
//!
//! This module provides `AuthClient`, the reqwest-backed implementation of
//! the [`AuthApi`] boundary used for login, registration, token refresh and
//! identity lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::models::User;

use super::{ApiError, AuthApi, AuthPayload, TokenPair};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the authentication service
const DEFAULT_BASE_URL: &str = "https://api.chatvault.dev";

/// HTTP request timeout in seconds.
/// Bounded so a hung network surfaces as a call error instead of hanging the
/// startup validator.
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    phone: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    phone: &'a str,
    password: &'a str,
    username: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Authentication service client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a client against `base_url`, or the default service URL
    pub fn new(base_url: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if a response is successful, turning the status and body into a
    /// typed error if not
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, phone: &str, password: &str) -> Result<AuthPayload, ApiError> {
        debug!(phone, "Login request");
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { phone, password })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn register(
        &self,
        phone: &str,
        password: &str,
        username: &str,
    ) -> Result<AuthPayload, ApiError> {
        debug!(phone, username, "Register request");
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&RegisterRequest {
                phone,
                password,
                username,
            })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        debug!("Refresh request");
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    async fn get_user_info(&self, access_token: &str, user_id: i64) -> Result<User, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/users/{}", user_id)))
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }
}
