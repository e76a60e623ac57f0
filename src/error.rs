//! Error handling for the DevScore client

use std::fmt;
use thiserror::Error;

/// Unified error type for the DevScore client
#[derive(Error, Debug)]
pub enum Error {
    /// The OAuth `state` nonce was missing or did not match the one issued at sign-in
    #[error("Invalid OAuth state: the sign-in request is stale or was not issued by this client")]
    InvalidState,

    /// The token-exchange relay rejected the authorization code
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// The granted token lacks the scope needed to read the profile
    #[error("Insufficient scope: granted `{granted}`, `read:user` is required")]
    InsufficientScope { granted: String },

    /// The identity endpoint answered 401
    #[error("The access token is invalid or has been revoked")]
    TokenInvalid,

    /// Any other non-success answer from the identity endpoint
    #[error("GitHub API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Persisted session data could not be parsed
    #[error("Malformed local data: {0}")]
    MalformedLocalData(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A newer sign-in or sign-out started while the request was in flight
    #[error("Request superseded by a newer session change")]
    Superseded,

    /// Durable store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Wallet lookup errors
    #[error("Wallet lookup error: {0}")]
    Wallet(String),

    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new token exchange error
    pub fn exchange<T: fmt::Display>(msg: T) -> Self {
        Error::ExchangeFailed(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new malformed-data error
    pub fn malformed<T: fmt::Display>(msg: T) -> Self {
        Error::MalformedLocalData(msg.to_string())
    }

    /// Create a new wallet lookup error
    pub fn wallet<T: fmt::Display>(msg: T) -> Self {
        Error::Wallet(msg.to_string())
    }

    /// Whether the error came from the OAuth flow itself rather than transport or local state
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidState
                | Error::ExchangeFailed(_)
                | Error::InsufficientScope { .. }
                | Error::TokenInvalid
                | Error::ApiError { .. }
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
