//! A one-shot flag that any number of tasks can await.

use std::sync::Arc;

use tokio::sync::watch;

/// Fires at most once; every clone observes the same flag.
///
/// Used for the client's shutdown and completion notifications, where
/// several tasks (read loop, heartbeat, backoff sleep, `wait()` callers)
/// need to learn about the same event.
#[derive(Debug, Clone)]
pub struct Signal {
    tx: Arc<watch::Sender<bool>>,
}

impl Signal {
    /// An unfired signal.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Fires the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Whether [`fire`](Self::fire) has been called. Never goes back to
    /// `false`.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired (immediately if it already has).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this can't see a closed channel.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
