use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::api::AuthApi;

use super::session::{SessionStore, SessionTokens};

/// Upper bound on each remote call during validation.
/// Expiry takes the same failure edge as a call error, so a hung network
/// cannot stall startup indefinitely.
const REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup/session-resume decision logic.
///
/// One `validate` run walks the stored session through: local presence check,
/// remote identity probe, transparent refresh, and finally a cleared store
/// when nothing salvages the session. The run always resolves to a single
/// boolean; transient network faults and explicit rejections are deliberately
/// not distinguished.
pub struct SessionValidator {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
}

impl SessionValidator {
    pub fn new(store: Arc<SessionStore>, api: Arc<dyn AuthApi>) -> Self {
        Self { store, api }
    }

    /// Decide whether the stored session is usable, refreshing it when the
    /// access token is no longer accepted. Never returns an error; every
    /// fault resolves to `false`.
    pub async fn validate(&self) -> bool {
        let tokens = match self.store.read() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                debug!("No stored session");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Session store unreadable, clearing");
                self.clear_best_effort();
                return false;
            }
        };

        if tokens.access_token.is_empty() {
            debug!("Stored session has no access token");
            return false;
        }

        // Refresh token missing while an access token exists is corrupt
        // state the store cannot recover from: purge it.
        if tokens.refresh_token.is_empty() {
            warn!("Stored session missing refresh token, clearing");
            self.clear_best_effort();
            return false;
        }

        match timeout(
            REMOTE_CALL_TIMEOUT,
            self.api.get_user_info(&tokens.access_token, tokens.user_id),
        )
        .await
        {
            Ok(Ok(_)) => {
                debug!(user_id = tokens.user_id, "Access token accepted");
                return true;
            }
            Ok(Err(e)) => debug!(error = %e, "Identity check failed, attempting refresh"),
            Err(_) => debug!("Identity check timed out, attempting refresh"),
        }

        match timeout(
            REMOTE_CALL_TIMEOUT,
            self.api.refresh_token(&tokens.refresh_token),
        )
        .await
        {
            Ok(Ok(pair)) => {
                // New tokens, same identity snapshot
                let renewed = SessionTokens {
                    access_token: pair.access_token,
                    refresh_token: pair.refresh_token,
                    user_id: tokens.user_id,
                    user_phone: tokens.user_phone,
                    user_name: tokens.user_name,
                };
                match self.store.save(&renewed) {
                    Ok(()) => {
                        debug!(user_id = renewed.user_id, "Session refreshed");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to persist refreshed session, clearing");
                        self.clear_best_effort();
                        false
                    }
                }
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Refresh rejected, clearing session");
                self.clear_best_effort();
                false
            }
            Err(_) => {
                debug!("Refresh timed out, clearing session");
                self.clear_best_effort();
                false
            }
        }
    }

    fn clear_best_effort(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear session store");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
