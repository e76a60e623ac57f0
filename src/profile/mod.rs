//! Contribution profile rendering
//!
//! A [`ProfileView`] holds one developer's [`ProfileData`] and the wallet badges
//! fetched for that developer after mount.

mod dashboard;
mod types;
mod wallet;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

pub use dashboard::*;
pub use types::*;
pub use wallet::*;

/// A mounted profile page.
///
/// Mounting and every username change start a wallet lookup in the background.
/// Each lookup is tied to the generation it started under; results that arrive
/// after the username changed or the view was unmounted are dropped. Must be
/// created inside a tokio runtime.
pub struct ProfileView {
    data: ProfileData,
    lookup: Arc<dyn WalletLookup>,
    wallets: Arc<Mutex<WalletBadges>>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ProfileView {
    /// Mount the view and start the wallet lookup for `data.username`
    pub fn mount(data: ProfileData, lookup: Arc<dyn WalletLookup>) -> Self {
        let mut view = Self {
            data,
            lookup,
            wallets: Arc::new(Mutex::new(WalletBadges::default())),
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        };
        view.start_wallet_fetch();
        view
    }

    pub fn data(&self) -> &ProfileData {
        &self.data
    }

    /// Badges fetched for the current username so far
    pub fn wallets(&self) -> WalletBadges {
        self.wallets
            .lock()
            .map(|wallets| wallets.clone())
            .unwrap_or_default()
    }

    /// Fetched badges, or the addresses supplied with the data when none arrived
    pub fn displayed_wallets(&self) -> WalletBadges {
        let fetched = self.wallets();
        if fetched.is_empty() {
            self.data.addresses.clone()
        } else {
            fetched
        }
    }

    pub fn render(&self) -> Dashboard {
        Dashboard::build(&self.data, &self.displayed_wallets())
    }

    /// Replace the data. A different username cancels the running lookup,
    /// clears the badges and starts a new lookup.
    pub fn update(&mut self, data: ProfileData) {
        let username_changed = data.username != self.data.username;
        self.data = data;
        if username_changed {
            self.start_wallet_fetch();
        }
    }

    /// Stop applying lookup results. Also runs on drop.
    pub fn unmount(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Wait for the current lookup to finish (or be cancelled)
    pub async fn wallets_settled(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    log::error!("wallet lookup task failed: {}", err);
                }
            }
        }
    }

    fn start_wallet_fetch(&mut self) {
        self.unmount();
        let generation = self.generation.load(Ordering::SeqCst);
        if let Ok(mut wallets) = self.wallets.lock() {
            *wallets = WalletBadges::default();
        }

        let username = self.data.username.trim().to_string();
        if username.is_empty() {
            return;
        }

        let lookup = Arc::clone(&self.lookup);
        let wallets = Arc::clone(&self.wallets);
        let current = Arc::clone(&self.generation);

        self.task = Some(tokio::spawn(async move {
            match lookup.addresses(&username).await {
                Ok(addresses) => {
                    // checked under the lock so a concurrent username change cannot interleave
                    if let Ok(mut slot) = wallets.lock() {
                        if current.load(Ordering::SeqCst) == generation {
                            *slot = WalletBadges::from_addresses(&addresses);
                        } else {
                            log::debug!("discarding stale wallet lookup for {}", username);
                        }
                    }
                }
                Err(err) => log::warn!("wallet lookup for {} failed: {}", username, err),
            }
        }));
    }
}

impl Drop for ProfileView {
    fn drop(&mut self) {
        self.unmount();
    }
}
