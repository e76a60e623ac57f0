//! Chain wallet lookup keyed by GitHub username

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::fetch::Fetch;

/// Chains a wallet address can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[serde(alias = "evm", alias = "eth")]
    Ethereum,
    #[serde(alias = "sol")]
    Solana,
    #[serde(other)]
    Other,
}

/// One address reported by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAddress {
    pub chain: Chain,
    pub address: String,
}

/// The two addresses shown as profile badges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBadges {
    #[serde(default)]
    pub evm: Option<String>,
    #[serde(default)]
    pub solana: Option<String>,
}

impl WalletBadges {
    /// First non-empty address per chain wins; other chains are ignored
    pub fn from_addresses(addresses: &[WalletAddress]) -> Self {
        let first = |chain: Chain| {
            addresses
                .iter()
                .filter(|wallet| wallet.chain == chain)
                .map(|wallet| wallet.address.trim())
                .find(|address| !address.is_empty())
                .map(str::to_string)
        };

        Self {
            evm: first(Chain::Ethereum),
            solana: first(Chain::Solana),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.evm.is_none() && self.solana.is_none()
    }
}

/// Looks up the wallets registered for a GitHub username
#[async_trait]
pub trait WalletLookup: Send + Sync {
    async fn addresses(&self, username: &str) -> Result<Vec<WalletAddress>, Error>;
}

/// Wallet lookup over HTTP: `GET {base}/wallets/{username}`
#[derive(Debug, Clone)]
pub struct HttpWalletLookup {
    client: Client,
    base_url: Url,
    user_agent: String,
}

impl HttpWalletLookup {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            user_agent: concat!("devscore/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Lookup configured by `wallet_api_url`, if set
    pub fn from_config(config: &Config, client: Client) -> Option<Self> {
        config.wallet_api_url().map(|base| Self {
            client,
            base_url: base.clone(),
            user_agent: config.user_agent().to_string(),
        })
    }

    fn lookup_url(&self, username: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::wallet(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("wallets")
            .push(username);
        Ok(url)
    }
}

#[async_trait]
impl WalletLookup for HttpWalletLookup {
    async fn addresses(&self, username: &str) -> Result<Vec<WalletAddress>, Error> {
        let url = self.lookup_url(username)?;

        match Fetch::get(&self.client, url)
            .user_agent(&self.user_agent)
            .execute::<Vec<WalletAddress>>()
            .await
        {
            Ok(addresses) => Ok(addresses),
            Err(Error::ApiError { status: 404, .. }) => Ok(Vec::new()),
            Err(err) => Err(Error::wallet(err)),
        }
    }
}
