//! Shared reconnect condition.
//!
//! Set externally while the network layer re-establishes connectivity.
//! Workers that hit the reconnect path re-queue their file first and then
//! block on this signal before dequeuing further work, so the worker (not the
//! file) is what waits. Modeled as an explicit signal object injected into
//! every worker rather than ambient global state.

use tokio::sync::watch;

/// Shared boolean condition indicating a reconnect in progress
#[derive(Clone)]
pub struct ReconnectSignal {
    tx: watch::Sender<bool>,
}

impl ReconnectSignal {
    /// Create a signal in the cleared state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mark a reconnect as in progress (or finished)
    pub fn set(&self, active: bool) {
        // send_replace never fails; the sender keeps the channel alive
        self.tx.send_replace(active);
    }

    /// Whether a reconnect is currently in progress
    pub fn is_active(&self) -> bool {
        *self.tx.borrow()
    }

    /// Block until the signal is cleared; returns immediately if it already is
    pub async fn wait_until_clear(&self) {
        let mut rx = self.tx.subscribe();
        // The sender half lives as long as self, so this cannot error
        let _ = rx.wait_for(|active| !*active).await;
    }
}

impl Default for ReconnectSignal {
    fn default() -> Self {
        Self::new()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_immediately_when_clear() {
        let signal = ReconnectSignal::new();
        tokio::time::timeout(Duration::from_millis(100), signal.wait_until_clear())
            .await
            .expect("clear signal must not block");
    }

    #[tokio::test]
    async fn wait_blocks_until_cleared() {
        let signal = ReconnectSignal::new();
        signal.set(true);
        assert!(signal.is_active());

        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.wait_until_clear().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "waiter must block while reconnecting");

        signal.set(false);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter must wake after clear")
            .unwrap();
    }
}
