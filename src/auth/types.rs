//! Types for the GitHub sign-in flow

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::READ_USER_SCOPE;

/// GitHub identity record as returned by `GET /user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    /// Numeric GitHub account id
    pub id: u64,

    /// Login handle
    pub login: String,

    /// Display name, if the user set one
    #[serde(default)]
    pub name: Option<String>,

    /// Avatar image URL
    pub avatar_url: String,

    /// Profile page URL
    pub html_url: String,
}

impl GithubUser {
    /// Display name, falling back to the login
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.login)
    }
}

/// Response of the token-exchange relay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenExchangeResponse {
    /// The access token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Granted scopes, comma or space separated
    #[serde(default)]
    pub scope: Option<String>,

    /// The token type
    #[serde(default)]
    pub token_type: Option<String>,

    /// Absolute expiry, epoch milliseconds
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// Relative expiry in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Error code reported by the relay
    #[serde(default)]
    pub error: Option<String>,

    /// Human readable error detail
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenExchangeResponse {
    /// The relay's error message, preferring the description
    pub fn error_message(&self) -> Option<String> {
        match (&self.error, &self.error_description) {
            (_, Some(description)) if !description.is_empty() => Some(description.clone()),
            (Some(error), _) if !error.is_empty() => Some(error.clone()),
            _ => None,
        }
    }

    /// Whether the granted scopes allow reading the user profile
    pub fn grants_read_user(&self) -> bool {
        self.scope.as_deref().map(scope_grants_read_user).unwrap_or(false)
    }

    /// Token expiry; `expires_at` wins over `expires_in`
    pub fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(millis) = self.expires_at {
            return Utc.timestamp_millis_opt(millis).single();
        }
        self.expires_in
            .filter(|seconds| *seconds > 0)
            .map(|seconds| now + Duration::seconds(seconds))
    }
}

/// GitHub reports scopes comma separated; the `user` scope includes `read:user`.
pub fn scope_grants_read_user(scope: &str) -> bool {
    scope
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .any(|granted| granted == READ_USER_SCOPE || granted == "user")
}

/// Where the session is in the sign-in lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Unauthenticated,
    /// Authorization redirect issued
    SigningIn,
    /// Exchanging the callback code
    CallbackPending,
    Authenticated,
    /// Last operation failed; see [`AuthState::error`]
    Failed,
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<GithubUser>,
    pub token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub phase: AuthPhase,
}

impl Default for AuthState {
    /// Loading until the persisted session has been restored
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            expires_at: None,
            is_loading: true,
            error: None,
            phase: AuthPhase::Unauthenticated,
        }
    }
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Drop every session field, keeping `error`
    pub(crate) fn clear_session(&mut self) {
        self.user = None;
        self.token = None;
        self.expires_at = None;
        self.is_loading = false;
        self.phase = AuthPhase::Unauthenticated;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.is_loading = false;
        self.phase = AuthPhase::Failed;
    }
}

/// Result of restoring the persisted session on start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was persisted
    SignedOut,
    /// The persisted token had expired and was discarded
    Expired,
    /// Token and cached user restored without a network call
    Restored(GithubUser),
    /// Token restored; the user has to be fetched
    NeedsUserFetch(String),
    /// `restore` already ran for this manager
    AlreadyRestored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_grants_read_user() {
        assert!(scope_grants_read_user("read:user"));
        assert!(scope_grants_read_user("repo,read:user"));
        assert!(scope_grants_read_user("user:email read:user"));
        assert!(scope_grants_read_user("user"));
        assert!(!scope_grants_read_user("user:email"));
        assert!(!scope_grants_read_user("repo, gist"));
        assert!(!scope_grants_read_user(""));
    }

    #[test]
    fn test_exchange_error_message_prefers_description() {
        let response = TokenExchangeResponse {
            error: Some("bad_verification_code".to_string()),
            error_description: Some("The code passed is incorrect or expired.".to_string()),
            ..Default::default()
        };
        assert_eq!(
            response.error_message().as_deref(),
            Some("The code passed is incorrect or expired.")
        );

        let response = TokenExchangeResponse {
            error: Some("bad_verification_code".to_string()),
            ..Default::default()
        };
        assert_eq!(response.error_message().as_deref(), Some("bad_verification_code"));
        assert_eq!(TokenExchangeResponse::default().error_message(), None);
    }

    #[test]
    fn test_expiry_sources() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let absolute = TokenExchangeResponse {
            expires_at: Some(1_700_000_600_000),
            expires_in: Some(10),
            ..Default::default()
        };
        assert_eq!(
            absolute.expiry(now).map(|t| t.timestamp_millis()),
            Some(1_700_000_600_000)
        );

        let relative = TokenExchangeResponse {
            expires_in: Some(3600),
            ..Default::default()
        };
        assert_eq!(relative.expiry(now), Some(now + Duration::seconds(3600)));

        assert_eq!(TokenExchangeResponse::default().expiry(now), None);
    }

    #[test]
    fn test_user_display_name() {
        let mut user = GithubUser {
            id: 1,
            login: "octocat".to_string(),
            name: None,
            avatar_url: "https://avatars.githubusercontent.com/u/1".to_string(),
            html_url: "https://github.com/octocat".to_string(),
        };
        assert_eq!(user.display_name(), "octocat");

        user.name = Some("The Octocat".to_string());
        assert_eq!(user.display_name(), "The Octocat");
    }

    #[test]
    fn test_user_deserializes_github_payload() {
        let user: GithubUser = serde_json::from_value(serde_json::json!({
            "id": 583231,
            "login": "octocat",
            "name": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231?v=4",
            "html_url": "https://github.com/octocat",
            "public_repos": 8
        }))
        .unwrap();

        assert_eq!(user.id, 583231);
        assert_eq!(user.name, None);
    }
}
