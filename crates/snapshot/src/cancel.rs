//! Cooperative cancellation shared by the driver and extraction workers.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable cancellation flag.
///
/// Workers poll [`CancelToken::is_cancelled`] between attempts and race
/// [`CancelToken::cancelled`] against the bulk-copy stream so an in-flight
/// copy aborts at the next chunk boundary.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelToken { tx: Arc::new(tx) }
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is tripped.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}
