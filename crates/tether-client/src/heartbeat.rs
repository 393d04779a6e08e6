//! Periodic ping task.

use std::time::Duration;

use tether_protocol::Envelope;
use tokio::time::MissedTickBehavior;

use crate::{Client, ClientError, Signal};

/// Sends `{"type":"ping"}` every `interval` until `shutdown` fires.
///
/// The first tick of a tokio interval completes immediately, so it is
/// consumed up front and the first ping goes out one full interval after
/// connecting. Send failures are logged and otherwise ignored: detecting
/// a dead connection is the read loop's job.
pub(crate) async fn run(client: Client, interval: Duration, shutdown: Signal) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    tracing::debug!(?interval, "heartbeat started");

    let ping = Envelope::ping();
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {}
        }

        match client.send_message(&ping).await {
            Ok(()) => tracing::trace!("heartbeat ping sent"),
            Err(ClientError::NotConnected) => {
                tracing::debug!("heartbeat skipped, not connected");
            }
            Err(e) => tracing::warn!(error = %e, "heartbeat ping failed"),
        }
    }

    tracing::debug!("heartbeat stopped");
}
