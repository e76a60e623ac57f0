//! DevScore client library
//!
//! GitHub sign-in with persisted sessions, and the contribution profile view.
//!
//! ```no_run
//! use std::sync::Arc;
//! use devscore::{Config, DevScore};
//! use devscore::auth::{MemoryStore, RedirectQueue};
//!
//! # async fn run() -> Result<(), devscore::Error> {
//! let config = Config::from_env()?;
//! let redirects = RedirectQueue::new();
//! let devscore = DevScore::new(config, Arc::new(MemoryStore::new()), Arc::new(redirects.clone()));
//!
//! devscore.session().initialize().await;
//! if !devscore.session().is_authenticated() {
//!     let url = devscore.session().sign_in()?;
//!     println!("open {}", url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod profile;

use std::sync::Arc;

use reqwest::Client;

use crate::auth::{KeyValueStore, Navigator, SessionManager};
use crate::profile::{HttpWalletLookup, ProfileData, ProfileView, WalletLookup};

pub use crate::config::Config;
pub use crate::error::{Error, Result};

/// Composition root: owns the configuration, the HTTP client and the one
/// session manager, and hands out profile views.
pub struct DevScore {
    /// Client configuration
    pub config: Config,
    /// HTTP client shared by every outbound call
    pub http_client: Client,
    session: Arc<SessionManager>,
}

impl DevScore {
    /// Create the client with the given session store and navigator
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self::new_with_client(config, Client::new(), store, navigator)
    }

    /// Create the client with a custom HTTP client (connection pool reuse, proxies)
    pub fn new_with_client(
        config: Config,
        http_client: Client,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            config.clone(),
            http_client.clone(),
            store,
            navigator,
        ));

        Self {
            config,
            http_client,
            session,
        }
    }

    /// The session manager, shareable with consumers
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Wallet lookup configured by `wallet_api_url`
    pub fn wallet_lookup(&self) -> Option<HttpWalletLookup> {
        HttpWalletLookup::from_config(&self.config, self.http_client.clone())
    }

    /// Mount a profile view using the configured wallet lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no wallet API URL is configured.
    pub fn mount_profile(&self, data: ProfileData) -> Result<ProfileView> {
        let lookup = self
            .wallet_lookup()
            .ok_or_else(|| Error::config("WALLET_API_URL is not configured"))?;
        Ok(self.mount_profile_with(data, Arc::new(lookup)))
    }

    /// Mount a profile view with a custom wallet lookup
    pub fn mount_profile_with(&self, data: ProfileData, lookup: Arc<dyn WalletLookup>) -> ProfileView {
        ProfileView::mount(data, lookup)
    }
}
