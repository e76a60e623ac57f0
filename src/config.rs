//! Configuration options for the DevScore client

use url::Url;

use crate::error::Error;

/// Scope the identity endpoint needs to read the signed-in user's profile
pub const READ_USER_SCOPE: &str = "read:user";

const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = concat!("devscore/", env!("CARGO_PKG_VERSION"));
const CALLBACK_PATH: &str = "auth/callback";

/// Configuration for the session manager and profile views.
///
/// Required values are constructor parameters and are validated up front, so
/// an empty client id never turns into a broken authorization URL later.
#[derive(Debug, Clone)]
pub struct Config {
    /// GitHub OAuth app client id
    client_id: String,

    /// Base URL of the token-exchange relay
    worker_url: Url,

    /// Base URL of this application (callback and home derive from it)
    app_url: Url,

    /// GitHub authorization endpoint
    authorize_url: Url,

    /// GitHub REST API base
    api_url: Url,

    /// Wallet lookup service base, if any
    wallet_api_url: Option<Url>,

    /// Requested OAuth scope
    scope: String,

    /// User-Agent sent to GitHub
    user_agent: String,
}

impl Config {
    /// Create a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client id is blank or a URL is not http(s).
    pub fn new(client_id: impl Into<String>, worker_url: &str, app_url: &str) -> Result<Self, Error> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(Error::config("GitHub client id must not be empty"));
        }

        Ok(Self {
            client_id,
            worker_url: parse_base_url("worker URL", worker_url)?,
            app_url: parse_base_url("app URL", app_url)?,
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL)?,
            api_url: Url::parse(DEFAULT_API_URL)?,
            wallet_api_url: None,
            scope: READ_USER_SCOPE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `GITHUB_CLIENT_ID`
    /// - `AUTH_WORKER_URL`
    /// - `APP_URL`
    ///
    /// # Optional env vars
    /// - `GITHUB_AUTHORIZE_URL`
    /// - `GITHUB_API_URL`
    /// - `WALLET_API_URL`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is unset or any URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::new(
            required_env("GITHUB_CLIENT_ID")?,
            &required_env("AUTH_WORKER_URL")?,
            &required_env("APP_URL")?,
        )?;

        if let Some(url) = optional_env("GITHUB_AUTHORIZE_URL") {
            config = config.with_authorize_url(&url)?;
        }
        if let Some(url) = optional_env("GITHUB_API_URL") {
            config = config.with_api_url(&url)?;
        }
        if let Some(url) = optional_env("WALLET_API_URL") {
            config = config.with_wallet_api_url(&url)?;
        }

        Ok(config)
    }

    /// Override the GitHub authorization endpoint
    pub fn with_authorize_url(mut self, url: &str) -> Result<Self, Error> {
        self.authorize_url = parse_http_url("authorize URL", url)?;
        Ok(self)
    }

    /// Override the GitHub API base (GitHub Enterprise, tests)
    pub fn with_api_url(mut self, url: &str) -> Result<Self, Error> {
        self.api_url = parse_base_url("API URL", url)?;
        Ok(self)
    }

    /// Set the wallet lookup service base
    pub fn with_wallet_api_url(mut self, url: &str) -> Result<Self, Error> {
        self.wallet_api_url = Some(parse_base_url("wallet API URL", url)?);
        Ok(self)
    }

    /// Override the requested scope
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Override the User-Agent sent to GitHub
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn worker_url(&self) -> &Url {
        &self.worker_url
    }

    pub fn app_url(&self) -> &Url {
        &self.app_url
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn wallet_api_url(&self) -> Option<&Url> {
        self.wallet_api_url.as_ref()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// OAuth callback location handled by this application
    pub fn redirect_uri(&self) -> Result<Url, Error> {
        Ok(self.app_url.join(CALLBACK_PATH)?)
    }

    /// Where the application lands after a completed sign-in
    pub fn home_url(&self) -> Url {
        let mut home = self.app_url.clone();
        home.set_query(None);
        home.set_fragment(None);
        home
    }
}

fn required_env(name: &str) -> Result<String, Error> {
    optional_env(name).ok_or_else(|| Error::config(format!("{} is required", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_http_url(what: &str, raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::config(format!("{}: {}", what, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::config(format!(
            "{}: unsupported scheme `{}`",
            what, other
        ))),
    }
}

/// Parses a base URL and makes sure it ends with `/` so `join` appends instead of replacing.
fn parse_base_url(what: &str, raw: &str) -> Result<Url, Error> {
    let mut url = parse_http_url(what, raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_client_id() {
        let result = Config::new("  ", "https://worker.example.com", "https://app.example.com");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_new_rejects_non_http_urls() {
        let result = Config::new("client", "ftp://worker.example.com", "https://app.example.com");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = Config::new("client", "https://worker.example.com", "not a url");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_derived_urls() {
        let config =
            Config::new("client", "https://worker.example.com", "https://app.example.com/devscore")
                .unwrap();

        assert_eq!(
            config.redirect_uri().unwrap().as_str(),
            "https://app.example.com/devscore/auth/callback"
        );
        assert_eq!(config.home_url().as_str(), "https://app.example.com/devscore/");
        assert_eq!(config.worker_url().as_str(), "https://worker.example.com/");
        assert_eq!(config.scope(), READ_USER_SCOPE);
        assert_eq!(config.api_url().as_str(), "https://api.github.com/");
    }

    #[test]
    fn test_overrides() {
        let config = Config::new("client", "https://worker.example.com", "https://app.example.com")
            .unwrap()
            .with_api_url("http://localhost:9000/api")
            .unwrap()
            .with_wallet_api_url("http://localhost:9001")
            .unwrap()
            .with_scope("read:user user:email");

        assert_eq!(config.api_url().as_str(), "http://localhost:9000/api/");
        assert_eq!(
            config.wallet_api_url().map(Url::as_str),
            Some("http://localhost:9001/")
        );
        assert_eq!(config.scope(), "read:user user:email");
    }
}
