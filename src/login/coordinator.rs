use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::AuthApi;
use crate::auth::{SessionStore, SessionTokens};
use crate::cache::AccountStore;
use crate::error::StoreError;
use crate::models::User;

/// Debounce window for phone-number keystrokes
const DEBOUNCE_MS: u64 = 300;

/// Length of a complete phone number; shorter input never hits the store
const PHONE_NUMBER_LEN: usize = 11;

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 6;

/// Outcome of a login or registration attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LoginState {
    Idle,
    Loading,
    LoginSuccess(User),
    RegisterSuccess(User),
    Error(String),
}

/// UI-visible state backing the login screen
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub login_mode: bool,
    pub phone: String,
    pub selected_phone: String,
    pub password: String,
    pub username: String,
    pub remember_password: bool,
    pub recent_accounts: Vec<String>,
    pub login_state: LoginState,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            login_mode: true,
            phone: String::new(),
            selected_phone: String::new(),
            password: String::new(),
            username: String::new(),
            remember_password: false,
            recent_accounts: Vec::new(),
            login_state: LoginState::Idle,
        }
    }
}

/// Backs the login form with debounced credential-cache lookups and drives
/// the login/registration flows that write the two stores.
///
/// Each keystroke echoes into form state immediately; the cache lookup runs
/// only after `DEBOUNCE_MS` of quiet. A new keystroke aborts the previous
/// lookup task while holding the form lock, so a superseded lookup either
/// applied before the keystroke or never applies at all.
pub struct LoginCoordinator {
    accounts: Arc<AccountStore>,
    session: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    form: Arc<Mutex<LoginForm>>,
    debounce: Option<JoinHandle<()>>,
}

impl LoginCoordinator {
    /// Build the coordinator, pre-filling the form with the most recently
    /// used account and its remembered password
    pub fn new(
        accounts: Arc<AccountStore>,
        session: Arc<SessionStore>,
        api: Arc<dyn AuthApi>,
    ) -> Self {
        let mut form = LoginForm::default();
        Self::load_initial(&accounts, &mut form);
        Self {
            accounts,
            session,
            api,
            form: Arc::new(Mutex::new(form)),
            debounce: None,
        }
    }

    fn load_initial(accounts: &AccountStore, form: &mut LoginForm) {
        form.recent_accounts = accounts.list_by_recency();
        let phone = form.recent_accounts.first().cloned().unwrap_or_default();
        let password = if phone.is_empty() {
            String::new()
        } else {
            accounts.get_password(&phone)
        };
        form.remember_password = !phone.is_empty() && !password.is_empty();
        form.selected_phone = phone.clone();
        form.phone = phone;
        form.password = password;
    }

    /// Snapshot of the current form state
    pub async fn form(&self) -> LoginForm {
        self.form.lock().await.clone()
    }

    /// Echo a phone-number keystroke and schedule the debounced cache lookup.
    ///
    /// The echo is synchronous; the lookup fires only if no further keystroke
    /// arrives within the debounce window, and only consults the store for a
    /// complete (11+ character) number.
    pub async fn on_phone_changed(&mut self, phone: &str) {
        {
            let mut form = self.form.lock().await;
            if let Some(handle) = self.debounce.take() {
                handle.abort();
            }
            form.phone = phone.to_string();
            form.selected_phone = phone.to_string();
        }

        let accounts = Arc::clone(&self.accounts);
        let form = Arc::clone(&self.form);
        let phone = phone.to_string();
        self.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            let password = if phone.chars().count() >= PHONE_NUMBER_LEN {
                accounts.get_password(&phone)
            } else {
                String::new()
            };
            let mut form = form.lock().await;
            form.remember_password = !password.is_empty();
            form.password = password;
        }));
    }

    /// Apply a selection from the recent-accounts list: immediate lookup,
    /// no debounce
    pub async fn on_account_selected(&mut self, phone: &str) {
        let mut form = self.form.lock().await;
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        let password = self.accounts.get_password(phone);
        form.phone = phone.to_string();
        form.selected_phone = phone.to_string();
        form.remember_password = !password.is_empty();
        form.password = password;
    }

    /// Re-read the recency-ordered account list into the form
    pub async fn refresh_recent_accounts(&self) {
        let recent = self.accounts.list_by_recency();
        self.form.lock().await.recent_accounts = recent;
    }

    /// Switch between login and registration. Register mode starts from a
    /// blank form; login mode reloads the most recent cached account.
    pub async fn set_login_mode(&mut self, login_mode: bool) {
        let mut form = self.form.lock().await;
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        form.login_mode = login_mode;
        if login_mode {
            Self::load_initial(&self.accounts, &mut form);
        } else {
            form.phone.clear();
            form.selected_phone.clear();
            form.password.clear();
            form.username.clear();
        }
    }

    pub async fn update_password(&self, password: &str) {
        self.form.lock().await.password = password.to_string();
    }

    pub async fn update_username(&self, username: &str) {
        self.form.lock().await.username = username.to_string();
    }

    pub async fn set_remember_password(&self, remember: bool) {
        self.form.lock().await.remember_password = remember;
    }

    /// Authenticate against the remote service, persisting the session tuple
    /// and the credential record on success.
    ///
    /// When the remember flag is off, the credential record is still written
    /// with an empty password so the phone keeps its recency slot. Remote and
    /// store faults surface as [`LoginState::Error`]; this method never
    /// propagates an error.
    pub async fn login(&self, phone: &str, password: &str) -> LoginState {
        self.set_state(LoginState::Loading).await;

        if !is_complete_phone(phone) {
            return self.fail("Enter a valid phone number").await;
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return self
                .fail(&format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LEN
                ))
                .await;
        }

        let outcome = match self.api.login(phone, password).await {
            Ok(payload) => match self.persist_login(phone, password, &payload).await {
                Ok(user) => LoginState::LoginSuccess(user),
                Err(e) => {
                    warn!(error = %e, "Failed to persist login");
                    LoginState::Error(format!("Login failed: {}", e))
                }
            },
            Err(e) => LoginState::Error(format!("Login failed: {}", e)),
        };
        self.set_state(outcome.clone()).await;
        outcome
    }

    async fn persist_login(
        &self,
        phone: &str,
        password: &str,
        payload: &crate::api::AuthPayload,
    ) -> Result<User, StoreError> {
        self.session.save(&SessionTokens {
            access_token: payload.access_token.clone(),
            refresh_token: payload.refresh_token.clone(),
            user_id: payload.user.id,
            user_phone: payload.user.phone.clone(),
            user_name: payload.user.username.clone().unwrap_or_default(),
        })?;

        let remember = self.form.lock().await.remember_password;
        if remember {
            self.accounts.save_or_update(phone, password)?;
        } else {
            // Keep the phone's slot, forget the password
            self.accounts.save_or_update(phone, "")?;
        }
        debug!(user_id = payload.user.id, "Login persisted");
        Ok(payload.user.clone())
    }

    /// Create an account and persist the resulting session. Registration
    /// does not write a credential record.
    pub async fn register(&self, phone: &str, password: &str, username: &str) -> LoginState {
        self.set_state(LoginState::Loading).await;

        if !is_complete_phone(phone) {
            return self.fail("Enter a valid phone number").await;
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return self
                .fail(&format!(
                    "Password must be at least {} characters",
                    MIN_PASSWORD_LEN
                ))
                .await;
        }
        if username.trim().is_empty() {
            return self.fail("Username must not be empty").await;
        }

        let outcome = match self.api.register(phone, password, username).await {
            Ok(payload) => {
                let saved = self.session.save(&SessionTokens {
                    access_token: payload.access_token.clone(),
                    refresh_token: payload.refresh_token.clone(),
                    user_id: payload.user.id,
                    user_phone: payload.user.phone.clone(),
                    user_name: payload.user.username.clone().unwrap_or_default(),
                });
                match saved {
                    Ok(()) => LoginState::RegisterSuccess(payload.user),
                    Err(e) => {
                        warn!(error = %e, "Failed to persist registration");
                        LoginState::Error(format!("Registration failed: {}", e))
                    }
                }
            }
            Err(e) => LoginState::Error(format!("Registration failed: {}", e)),
        };
        self.set_state(outcome.clone()).await;
        outcome
    }

    /// Drop the active session
    pub fn logout(&self) -> Result<(), StoreError> {
        self.session.clear()
    }

    async fn set_state(&self, state: LoginState) {
        self.form.lock().await.login_state = state;
    }

    async fn fail(&self, message: &str) -> LoginState {
        let state = LoginState::Error(message.to_string());
        self.set_state(state.clone()).await;
        state
    }
}

/// A complete phone number: at least 11 characters, digits only
fn is_complete_phone(phone: &str) -> bool {
    phone.chars().count() >= PHONE_NUMBER_LEN && phone.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::api::{ApiError, AuthPayload, TokenPair};
    use crate::auth::MasterKey;

    use super::*;

    /// Boundary fake with one known account (13800138000 / 123456) and a
    /// registration path that rejects that phone as taken
    struct FakeAuthApi {
        login_calls: AtomicUsize,
    }

    impl FakeAuthApi {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                login_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuthApi {
        async fn login(&self, phone: &str, password: &str) -> Result<AuthPayload, ApiError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if phone == "13800138000" && password == "123456" {
                Ok(AuthPayload {
                    access_token: "access-1".to_string(),
                    refresh_token: "refresh-1".to_string(),
                    user: User {
                        id: 1,
                        phone: phone.to_string(),
                        username: Some("zhangsan".to_string()),
                        avatar: None,
                    },
                })
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn register(
            &self,
            phone: &str,
            _password: &str,
            username: &str,
        ) -> Result<AuthPayload, ApiError> {
            if phone == "13800138000" {
                return Err(ApiError::Conflict("phone already registered".to_string()));
            }
            Ok(AuthPayload {
                access_token: "access-r".to_string(),
                refresh_token: "refresh-r".to_string(),
                user: User {
                    id: 100001,
                    phone: phone.to_string(),
                    username: Some(username.to_string()),
                    avatar: None,
                },
            })
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
            Err(ApiError::Unauthorized)
        }

        async fn get_user_info(&self, _access_token: &str, _user_id: i64) -> Result<User, ApiError> {
            Err(ApiError::Unauthorized)
        }
    }

    struct Fixture {
        accounts: Arc<AccountStore>,
        session: Arc<SessionStore>,
        api: Arc<FakeAuthApi>,
        coordinator: LoginCoordinator,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let accounts = Arc::new(AccountStore::open(dir.path().join("cache")).unwrap());
        let session = Arc::new(
            SessionStore::open(dir.path().join("vault"), MasterKey::from_bytes([7u8; 32])).unwrap(),
        );
        let api = FakeAuthApi::new();
        let coordinator = LoginCoordinator::new(
            Arc::clone(&accounts),
            Arc::clone(&session),
            Arc::clone(&api) as Arc<dyn AuthApi>,
        );
        Fixture {
            accounts,
            session,
            api,
            coordinator,
            _dir: dir,
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn test_initial_form_loads_most_recent_account() {
        let dir = TempDir::new().unwrap();
        let accounts = Arc::new(AccountStore::open(dir.path().join("cache")).unwrap());
        accounts.save_or_update("13900139000", "old-pass").unwrap();
        accounts.save_or_update("13800138000", "new-pass").unwrap();
        let session = Arc::new(
            SessionStore::open(dir.path().join("vault"), MasterKey::from_bytes([7u8; 32])).unwrap(),
        );

        let coordinator = LoginCoordinator::new(accounts, session, FakeAuthApi::new());
        let form = coordinator.form().await;

        assert_eq!(form.phone, "13800138000");
        assert_eq!(form.password, "new-pass");
        assert!(form.remember_password);
        assert_eq!(form.recent_accounts, vec!["13800138000", "13900139000"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keystrokes_collapse_to_one_lookup_of_final_value() {
        let mut fx = fixture();
        fx.accounts.save_or_update("13800138000", "secret").unwrap();

        let full = "13800138000";
        for end in 1..=full.len() {
            fx.coordinator.on_phone_changed(&full[..end]).await;
            sleep_ms(50).await;
        }
        sleep_ms(350).await;

        let form = fx.coordinator.form().await;
        assert_eq!(form.phone, full);
        assert_eq!(form.password, "secret");
        assert!(form.remember_password);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_lookup_before_window_elapses() {
        let mut fx = fixture();
        fx.accounts.save_or_update("13800138000", "secret").unwrap();
        // Construction pre-filled the form from the cache; type over it
        fx.coordinator.on_phone_changed("139").await;
        fx.coordinator.update_password("").await;

        fx.coordinator.on_phone_changed("13800138000").await;
        sleep_ms(250).await;
        assert_eq!(fx.coordinator.form().await.password, "");

        sleep_ms(100).await;
        assert_eq!(fx.coordinator.form().await.password, "secret");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_never_reads_the_store() {
        let mut fx = fixture();
        // A 10-character phone with a cached password: the length gate, not
        // absence from the cache, must keep the lookup from resolving it
        fx.accounts.save_or_update("1380013800", "secret").unwrap();
        fx.coordinator.on_phone_changed("1390").await;
        sleep_ms(350).await;
        fx.coordinator.on_phone_changed("1380013800").await;
        sleep_ms(350).await;

        assert_eq!(fx.coordinator.form().await.password, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_keystroke_cancels_pending_lookup() {
        let mut fx = fixture();
        fx.accounts.save_or_update("13800138000", "secret").unwrap();
        fx.coordinator.on_phone_changed("139").await;
        fx.coordinator.update_password("").await;

        fx.coordinator.on_phone_changed("13800138000").await;
        sleep_ms(250).await;
        // Superseding keystroke lands before the 300ms window elapses
        fx.coordinator.on_phone_changed("1").await;
        sleep_ms(350).await;

        let form = fx.coordinator.form().await;
        assert_eq!(form.phone, "1");
        assert_eq!(form.password, "");
    }

    #[tokio::test]
    async fn test_account_selected_applies_immediately() {
        let mut fx = fixture();
        fx.accounts.save_or_update("13900139000", "other").unwrap();

        fx.coordinator.on_account_selected("13900139000").await;

        let form = fx.coordinator.form().await;
        assert_eq!(form.phone, "13900139000");
        assert_eq!(form.password, "other");
        assert!(form.remember_password);
    }

    #[tokio::test]
    async fn test_mode_switch_clears_then_reloads() {
        let mut fx = fixture();
        fx.accounts.save_or_update("13800138000", "secret").unwrap();
        fx.coordinator.set_login_mode(true).await;
        assert_eq!(fx.coordinator.form().await.phone, "13800138000");

        fx.coordinator.set_login_mode(false).await;
        let form = fx.coordinator.form().await;
        assert!(!form.login_mode);
        assert_eq!(form.phone, "");
        assert_eq!(form.password, "");

        fx.coordinator.set_login_mode(true).await;
        let form = fx.coordinator.form().await;
        assert_eq!(form.phone, "13800138000");
        assert_eq!(form.password, "secret");
    }

    #[tokio::test]
    async fn test_login_persists_session_and_remembered_credentials() {
        let fx = fixture();
        fx.coordinator.set_remember_password(true).await;

        let state = fx.coordinator.login("13800138000", "123456").await;

        match state {
            LoginState::LoginSuccess(user) => assert_eq!(user.id, 1),
            other => panic!("expected LoginSuccess, got {:?}", other),
        }
        let tokens = fx.session.read().unwrap().unwrap();
        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.user_phone, "13800138000");
        assert_eq!(tokens.user_name, "zhangsan");
        assert_eq!(fx.accounts.get_password("13800138000"), "123456");
    }

    #[tokio::test]
    async fn test_login_without_remember_keeps_slot_only() {
        let fx = fixture();
        fx.coordinator.set_remember_password(false).await;

        fx.coordinator.login("13800138000", "123456").await;

        let record = fx.accounts.get_record("13800138000").unwrap();
        assert!(record.password.is_none());
        assert_eq!(fx.accounts.list_by_recency(), vec!["13800138000"]);
    }

    #[tokio::test]
    async fn test_login_validation_short_circuits_before_remote_call() {
        let fx = fixture();

        let state = fx.coordinator.login("123", "123456").await;
        assert!(matches!(state, LoginState::Error(_)));

        let state = fx.coordinator.login("13800138000", "123").await;
        assert!(matches!(state, LoginState::Error(_)));

        assert_eq!(fx.api.login_calls.load(Ordering::SeqCst), 0);
        assert!(!fx.session.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_stores_untouched() {
        let fx = fixture();

        let state = fx.coordinator.login("13800138000", "wrong-pass").await;

        assert!(matches!(state, LoginState::Error(_)));
        assert!(matches!(
            fx.coordinator.form().await.login_state,
            LoginState::Error(_)
        ));
        assert!(!fx.session.has_session().unwrap());
        assert!(fx.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_register_saves_session_but_no_credential_record() {
        let fx = fixture();

        let state = fx.coordinator.register("13700137000", "654321", "wangwu").await;

        match state {
            LoginState::RegisterSuccess(user) => assert_eq!(user.id, 100001),
            other => panic!("expected RegisterSuccess, got {:?}", other),
        }
        assert!(fx.session.has_session().unwrap());
        assert!(fx.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_register_requires_username() {
        let fx = fixture();
        let state = fx.coordinator.register("13700137000", "654321", "  ").await;
        assert!(matches!(state, LoginState::Error(_)));
        assert!(!fx.session.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let fx = fixture();
        fx.coordinator.login("13800138000", "123456").await;
        assert!(fx.session.has_session().unwrap());

        fx.coordinator.logout().unwrap();
        assert!(!fx.session.has_session().unwrap());
    }
}
