//! Persisted session fields and the CSRF nonce

use chrono::{DateTime, TimeZone, Utc};

use super::storage::KeyValueStore;
use super::types::GithubUser;
use crate::error::Error;

/// Key holding the access token
pub const TOKEN_KEY: &str = "github_token";
/// Key holding the serialized [`GithubUser`]
pub const USER_KEY: &str = "github_user";
/// Key holding the token expiry in epoch milliseconds
pub const EXPIRY_KEY: &str = "github_token_expiry";
/// Key holding the pending OAuth `state` nonce
pub const STATE_KEY: &str = "github_oauth_state";

/// Every key the session owns
pub const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, USER_KEY, EXPIRY_KEY, STATE_KEY];

/// Generates a fresh CSRF nonce for the authorization request
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Snapshot of the persisted session as read on start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub token: Option<String>,
    pub user: Option<GithubUser>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Reads token, user and expiry. Malformed user JSON or expiry text is
    /// logged and read as absent.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, Error> {
        let token = store.get(TOKEN_KEY)?.filter(|token| !token.is_empty());

        let user = match store.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<GithubUser>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    log::warn!("{}", Error::malformed(format!("{}: {}", USER_KEY, err)));
                    None
                }
            },
            None => None,
        };

        let expires_at = match store.get(EXPIRY_KEY)? {
            Some(raw) => {
                let parsed = raw
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single());
                if parsed.is_none() {
                    log::warn!(
                        "{}",
                        Error::malformed(format!("{}: `{}` is not epoch milliseconds", EXPIRY_KEY, raw))
                    );
                }
                parsed
            }
            None => None,
        };

        Ok(Self {
            token,
            user,
            expires_at,
        })
    }

    /// Whether the token has an expiry at or before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expiry| expiry <= now).unwrap_or(false)
    }

    /// Writes the token and its expiry; an unknown expiry removes any stale one
    pub fn store_token(
        store: &dyn KeyValueStore,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        store.set(TOKEN_KEY, token)?;
        match expires_at {
            Some(expiry) => store.set(EXPIRY_KEY, &expiry.timestamp_millis().to_string()),
            None => store.remove(EXPIRY_KEY),
        }
    }

    pub fn store_user(store: &dyn KeyValueStore, user: &GithubUser) -> Result<(), Error> {
        store.set(USER_KEY, &serde_json::to_string(user)?)
    }

    /// Removes every session key. Keeps going past failures and reports the first one.
    pub fn clear(store: &dyn KeyValueStore) -> Result<(), Error> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(err) = store.remove(key) {
                log::warn!("failed to remove {}: {}", key, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Reads and deletes the pending nonce
    pub fn take_state(store: &dyn KeyValueStore) -> Result<Option<String>, Error> {
        let state = store.get(STATE_KEY)?;
        store.remove(STATE_KEY)?;
        Ok(state)
    }
}
