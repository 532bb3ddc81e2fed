// Cancellation Scope
//
// One scope per reconciliation cycle; every monitor spawned in that cycle holds
// a token. The daemon uses the same pair for process shutdown.

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Cancellation signal observed at every suspension point
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Check if the scope was cancelled (a dropped scope counts as cancelled)
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait for cancellation
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` to completion unless the scope is cancelled first
    pub async fn guard<F, T, E>(&mut self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<AppError>,
    {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(AppError::Cancelled),
            out = fut => out.map_err(Into::into),
        }
    }

    /// Sleep for `duration`; returns false if cancelled first
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }
}

/// Owner side of a cancellation scope
pub struct CancelScope {
    tx: watch::Sender<bool>,
}

impl CancelScope {
    /// Signal cancellation to every token of this scope
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// New token bound to this scope
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a cancellation scope
pub fn cancel_scope() -> (CancelScope, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelScope { tx }, CancelToken { rx })
}
