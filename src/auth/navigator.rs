//! Full-page navigation performed by the sign-in flow

use std::sync::{Arc, Mutex};

use url::Url;

/// Performs a top-level navigation (authorization redirect, return home).
///
/// The host decides what navigating means: a browser redirect, an HTTP 302 from
/// a server handler, or opening a system browser from a CLI.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Navigator that queues locations for the host to act on
#[derive(Debug, Clone, Default)]
pub struct RedirectQueue {
    pending: Arc<Mutex<Vec<Url>>>,
}

impl RedirectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued location, oldest first
    pub fn drain(&self) -> Vec<Url> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }

    /// Most recent location without consuming it
    pub fn last(&self) -> Option<Url> {
        self.pending
            .lock()
            .ok()
            .and_then(|pending| pending.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Navigator for RedirectQueue {
    fn navigate(&self, url: &Url) {
        log::info!("navigating to {}", url);
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_queue_drains_in_order() {
        let queue = RedirectQueue::new();
        let shared = queue.clone();

        shared.navigate(&Url::parse("https://github.com/login/oauth/authorize").unwrap());
        shared.navigate(&Url::parse("https://app.example.com/").unwrap());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.last().unwrap().as_str(), "https://app.example.com/");

        let drained = queue.drain();
        assert_eq!(drained[0].host_str(), Some("github.com"));
        assert!(queue.is_empty());
    }
}
