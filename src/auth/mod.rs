//! GitHub sign-in and session management
//!
//! [`SessionManager`] runs the OAuth authorization-code flow through the
//! token-exchange relay, keeps the session in a [`KeyValueStore`] and publishes
//! every change of [`AuthState`] to subscribers.

mod navigator;
mod session;
mod storage;
mod types;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::fetch::Fetch;

pub use navigator::*;
pub use session::*;
pub use storage::*;
pub use types::*;

const GITHUB_JSON: &str = "application/vnd.github+json";
const EXCHANGE_PATH: &str = "api/auth/callback";

/// Owns the authentication state of one client.
///
/// Create one at the composition root and share it through `Arc`; there is no
/// global instance.
pub struct SessionManager {
    /// Client configuration
    config: Config,

    /// HTTP client used for requests
    client: Client,

    /// Durable session storage
    store: Arc<dyn KeyValueStore>,

    /// Performs the authorization and home redirects
    navigator: Arc<dyn Navigator>,

    /// Current state, observable through [`SessionManager::subscribe`]
    state: watch::Sender<AuthState>,

    /// Bumped by every sign-in, callback and sign-out; fetches started under an
    /// older generation never apply their result
    generation: AtomicU64,

    /// Set once the persisted session has been read
    restored: AtomicBool,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        config: Config,
        client: Client,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());

        Self {
            config,
            client,
            store,
            navigator,
            state,
            generation: AtomicU64::new(0),
            restored: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<GithubUser> {
        self.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Applies `change` and notifies subscribers only if something changed
    fn update(&self, change: impl FnOnce(&mut AuthState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            change(state);
            *state != before
        });
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn owns_token(&self, token: &str) -> bool {
        self.state.borrow().token.as_deref() == Some(token)
    }

    /// Restores the persisted session. Runs once; later calls return
    /// [`RestoreOutcome::AlreadyRestored`].
    ///
    /// No network call is made here. For [`RestoreOutcome::NeedsUserFetch`] the
    /// state stays loading until the caller runs [`SessionManager::fetch_user_data`];
    /// [`SessionManager::initialize`] does both.
    pub fn restore(&self) -> RestoreOutcome {
        if self.restored.swap(true, Ordering::SeqCst) {
            return RestoreOutcome::AlreadyRestored;
        }

        let persisted = match PersistedSession::load(self.store.as_ref()) {
            Ok(persisted) => persisted,
            Err(err) => {
                log::error!("could not read persisted session: {}", err);
                self.update(|state| state.is_loading = false);
                return RestoreOutcome::SignedOut;
            }
        };

        let Some(token) = persisted.token.clone() else {
            self.update(|state| state.is_loading = false);
            return RestoreOutcome::SignedOut;
        };

        if persisted.is_expired(Utc::now()) {
            log::info!("persisted GitHub token expired, signing out");
            self.sign_out();
            return RestoreOutcome::Expired;
        }

        match persisted.user {
            Some(user) => {
                log::debug!("restored session for {}", user.login);
                let restored = user.clone();
                self.update(|state| {
                    state.token = Some(token);
                    state.expires_at = persisted.expires_at;
                    state.user = Some(restored);
                    state.is_loading = false;
                    state.phase = AuthPhase::Authenticated;
                });
                RestoreOutcome::Restored(user)
            }
            None => {
                let fetch_token = token.clone();
                self.update(|state| {
                    state.token = Some(token);
                    state.expires_at = persisted.expires_at;
                    state.is_loading = true;
                });
                RestoreOutcome::NeedsUserFetch(fetch_token)
            }
        }
    }

    /// Restores the session and fetches the user when the cache was missing.
    /// Fetch failures are recorded in the state, not returned.
    pub async fn initialize(&self) -> RestoreOutcome {
        let outcome = self.restore();
        if let RestoreOutcome::NeedsUserFetch(token) = &outcome {
            if let Err(err) = self.fetch_user_data(token).await {
                log::warn!("user fetch after restore failed: {}", err);
            }
        }
        outcome
    }

    /// Starts the GitHub sign-in: persists a fresh `state` nonce and navigates
    /// to the authorization page. Returns the authorization URL.
    ///
    /// The state stays loading afterwards; the flow continues in
    /// [`SessionManager::handle_auth_callback`] once GitHub redirects back.
    pub fn sign_in(&self) -> Result<Url, Error> {
        self.next_generation();
        self.update(|state| {
            state.error = None;
            state.is_loading = true;
            state.phase = AuthPhase::SigningIn;
        });

        match self.authorization_request() {
            Ok(url) => {
                log::info!("redirecting to GitHub authorization");
                self.navigator.navigate(&url);
                Ok(url)
            }
            Err(err) => {
                log::error!("could not start sign-in: {}", err);
                self.update(|state| state.fail(err.to_string()));
                Err(err)
            }
        }
    }

    fn authorization_request(&self) -> Result<Url, Error> {
        let redirect_uri = self.config.redirect_uri()?;
        let nonce = generate_state();
        self.store.set(STATE_KEY, &nonce)?;

        let mut url = self.config.authorize_url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id())
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("scope", self.config.scope())
            .append_pair("state", &nonce);
        Ok(url)
    }

    /// Completes the sign-in after GitHub redirected back with `code` and `state`.
    ///
    /// On success the token, expiry and user are persisted and the navigator is
    /// sent to the home location. On failure the error is recorded in the state
    /// and no token or user is kept.
    pub async fn handle_auth_callback(
        &self,
        code: &str,
        received_state: &str,
    ) -> Result<GithubUser, Error> {
        let generation = self.next_generation();
        let previous_token = self.token();
        self.update(|state| {
            state.error = None;
            state.is_loading = true;
            state.phase = AuthPhase::CallbackPending;
        });

        match self.complete_callback(code, received_state, generation).await {
            Ok(user) => {
                log::info!("signed in as {}", user.login);
                self.update(|state| {
                    state.is_loading = false;
                    state.phase = AuthPhase::Authenticated;
                });
                self.navigator.navigate(&self.config.home_url());
                Ok(user)
            }
            Err(Error::Superseded) => {
                log::warn!("sign-in callback superseded by a newer session change");
                Err(Error::Superseded)
            }
            Err(err) => {
                log::error!("sign-in callback failed: {}", err);
                if self.is_current(generation) {
                    let token_stored = self.state.borrow().token != previous_token;
                    if token_stored {
                        self.discard_token();
                    }
                    self.update(|state| state.fail(err.to_string()));
                } else if matches!(err, Error::TokenInvalid) {
                    self.update(|state| state.fail(err.to_string()));
                }
                Err(err)
            }
        }
    }

    async fn complete_callback(
        &self,
        code: &str,
        received_state: &str,
        generation: u64,
    ) -> Result<GithubUser, Error> {
        let expected = PersistedSession::take_state(self.store.as_ref())?;
        match expected {
            Some(expected) if !expected.is_empty() && expected == received_state => {}
            _ => return Err(Error::InvalidState),
        }

        let (token, exchange) = self.exchange_code(code).await?;
        if !self.is_current(generation) {
            return Err(Error::Superseded);
        }

        if !exchange.grants_read_user() {
            return Err(Error::InsufficientScope {
                granted: exchange.scope.unwrap_or_default(),
            });
        }

        let expires_at = exchange.expiry(Utc::now());
        PersistedSession::store_token(self.store.as_ref(), &token, expires_at)?;
        let stored = token.clone();
        self.update(|state| {
            state.token = Some(stored);
            state.expires_at = expires_at;
            state.user = None;
        });

        self.fetch_user_data(&token).await
    }

    /// Exchanges the authorization code at the relay. Any transport or relay
    /// failure is reported as [`Error::ExchangeFailed`].
    async fn exchange_code(&self, code: &str) -> Result<(String, TokenExchangeResponse), Error> {
        let url = self.config.worker_url().join(EXCHANGE_PATH)?;

        let response = Fetch::get(&self.client, url)
            .query("code", code)
            .execute_raw()
            .await
            .map_err(Error::exchange)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::exchange)?;
        let parsed = serde_json::from_str::<TokenExchangeResponse>(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|exchange| exchange.error_message())
                .unwrap_or_else(|| format!("relay answered {}", status));
            return Err(Error::ExchangeFailed(message));
        }

        let exchange = parsed.ok_or_else(|| Error::exchange("relay returned malformed JSON"))?;
        if let Some(message) = exchange.error_message() {
            return Err(Error::ExchangeFailed(message));
        }

        match exchange.access_token.clone().filter(|token| !token.is_empty()) {
            Some(token) => Ok((token, exchange)),
            None => Err(Error::exchange("relay response did not include an access token")),
        }
    }

    /// Fetches the GitHub user for `token`, then stores and persists it.
    ///
    /// `token` must be the session's current token; any other token is
    /// rejected with [`Error::Superseded`] before a request is made and the
    /// state is left untouched. A 401 signs the session out and yields
    /// [`Error::TokenInvalid`]. A result arriving after a newer sign-in or
    /// sign-out is dropped with [`Error::Superseded`].
    pub async fn fetch_user_data(&self, token: &str) -> Result<GithubUser, Error> {
        let generation = self.generation.load(Ordering::SeqCst);
        if !self.owns_token(token) {
            log::warn!("not fetching the GitHub user for a token the session does not hold");
            return Err(Error::Superseded);
        }
        self.update(|state| state.is_loading = true);

        let result = self.request_user(token, generation).await;
        match &result {
            Ok(_) => {}
            Err(Error::Superseded) => {
                if self.is_current(generation) {
                    self.update(|state| state.is_loading = false);
                }
            }
            Err(err) => {
                log::error!("fetching GitHub user failed: {}", err);
                self.update(|state| state.fail(err.to_string()));
            }
        }
        result
    }

    async fn request_user(&self, token: &str, generation: u64) -> Result<GithubUser, Error> {
        let url = self.config.api_url().join("user")?;

        let response = Fetch::get(&self.client, url)
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_JSON)
            .user_agent(self.config.user_agent())
            .execute_raw()
            .await?;

        if !self.is_current(generation) || !self.owns_token(token) {
            return Err(Error::Superseded);
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("GitHub rejected the token, signing out");
            self.sign_out();
            return Err(Error::TokenInvalid);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let user: GithubUser = response.json().await?;

        if !self.is_current(generation) || !self.owns_token(token) {
            return Err(Error::Superseded);
        }

        if let Err(err) = PersistedSession::store_user(self.store.as_ref(), &user) {
            log::warn!("could not persist GitHub user: {}", err);
        }
        let fetched = user.clone();
        self.update(|state| {
            state.user = Some(fetched);
            state.error = None;
            state.is_loading = false;
            state.phase = AuthPhase::Authenticated;
        });

        Ok(user)
    }

    /// Forgets the token obtained by a failed callback
    fn discard_token(&self) {
        for key in [TOKEN_KEY, EXPIRY_KEY, USER_KEY] {
            if let Err(err) = self.store.remove(key) {
                log::warn!("failed to remove {}: {}", key, err);
            }
        }
        self.update(AuthState::clear_session);
    }

    /// Clears the in-memory and persisted session. Idempotent and infallible;
    /// in-flight user fetches are invalidated.
    pub fn sign_out(&self) {
        self.next_generation();
        if let Err(err) = PersistedSession::clear(self.store.as_ref()) {
            log::warn!("session storage not fully cleared: {}", err);
        }
        self.update(|state| {
            state.clear_session();
            state.error = None;
        });
        log::info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(store: MemoryStore, navigator: RedirectQueue) -> SessionManager {
        let config = Config::new(
            "client-123",
            "https://worker.example.com",
            "https://app.example.com",
        )
        .unwrap();
        SessionManager::new(config, Client::new(), Arc::new(store), Arc::new(navigator))
    }

    #[test]
    fn test_sign_in_persists_nonce_and_redirects() {
        let store = MemoryStore::new();
        let navigator = RedirectQueue::new();
        let manager = manager(store.clone(), navigator.clone());

        let url = manager.sign_in().unwrap();
        let nonce = store.get(STATE_KEY).unwrap().unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://app.example.com/auth/callback".to_string()
        )));
        assert!(pairs.contains(&("scope".to_string(), "read:user".to_string())));
        assert!(pairs.contains(&("state".to_string(), nonce)));

        assert_eq!(navigator.last(), Some(url));
        let state = manager.state();
        assert!(state.is_loading);
        assert_eq!(state.phase, AuthPhase::SigningIn);
    }

    #[test]
    fn test_sign_in_replaces_previous_nonce() {
        let store = MemoryStore::new();
        let manager = manager(store.clone(), RedirectQueue::new());

        manager.sign_in().unwrap();
        let first = store.get(STATE_KEY).unwrap();
        manager.sign_in().unwrap();
        let second = store.get(STATE_KEY).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_restore_with_nothing_persisted() {
        let manager = manager(MemoryStore::new(), RedirectQueue::new());
        assert!(manager.state().is_loading);

        assert_eq!(manager.restore(), RestoreOutcome::SignedOut);
        assert!(!manager.state().is_loading);
        assert_eq!(manager.restore(), RestoreOutcome::AlreadyRestored);
    }

    #[test]
    fn test_restore_with_token_only_needs_fetch() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "gho_cached").unwrap();
        store.set(USER_KEY, "not json").unwrap();
        let manager = manager(store, RedirectQueue::new());

        assert_eq!(
            manager.restore(),
            RestoreOutcome::NeedsUserFetch("gho_cached".to_string())
        );
        let state = manager.state();
        assert_eq!(state.token.as_deref(), Some("gho_cached"));
        assert!(state.user.is_none());
        assert!(state.is_loading);
    }

    #[test]
    fn test_subscribers_see_sign_out() {
        let store = MemoryStore::new();
        store.set(TOKEN_KEY, "gho_cached").unwrap();
        let manager = manager(store, RedirectQueue::new());
        manager.restore();

        let mut receiver = manager.subscribe();
        receiver.borrow_and_update();
        manager.sign_out();

        assert!(receiver.has_changed().unwrap());
        assert!(receiver.borrow_and_update().token.is_none());

        manager.sign_out();
        assert!(!receiver.has_changed().unwrap());
    }
}
