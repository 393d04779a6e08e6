//! Connection and reconnection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Settings for a [`Client`](crate::Client).
///
/// Start from [`ConnectConfig::default`] and override what you need:
///
/// ```
/// use std::time::Duration;
/// use tether_client::ConnectConfig;
///
/// let config = ConnectConfig {
///     heartbeat_interval: Duration::from_secs(5),
///     max_reconnect_retries: 3,
///     ..ConnectConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Redial after the connection drops. Default: `true`.
    pub reconnect_enabled: bool,
    /// Wait after the first failed reconnect attempt. Default: 500 ms.
    pub reconnect_initial_delay: Duration,
    /// Upper bound for the backoff delay. Default: 10 s.
    pub reconnect_max_delay: Duration,
    /// Failed attempts before giving up. Zero or negative retries forever.
    /// Default: `-1`.
    pub max_reconnect_retries: i32,
    /// Maximum silence on the connection before it is considered dead.
    /// Default: 60 s.
    pub read_timeout: Duration,
    /// Interval between heartbeat pings. Default: 30 s.
    pub heartbeat_interval: Duration,
    /// Concurrent handler invocations. `0` runs handlers inline on the
    /// read loop, one at a time. Default: 10.
    pub handler_workers: usize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            reconnect_enabled: true,
            reconnect_initial_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(10),
            max_reconnect_retries: -1,
            read_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            handler_workers: 10,
        }
    }
}

impl ConnectConfig {
    /// Whether the reconnect loop should stop after `attempts` failures.
    pub fn retries_exhausted(&self, attempts: u32) -> bool {
        u32::try_from(self.max_reconnect_retries)
            .is_ok_and(|max| max > 0 && attempts >= max)
    }

    /// Checks that every duration is usable.
    ///
    /// # Errors
    /// Returns [`ClientError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.reconnect_initial_delay.is_zero() {
            return Err(ClientError::Config(
                "reconnect_initial_delay must be greater than zero".into(),
            ));
        }
        if self.reconnect_max_delay < self.reconnect_initial_delay {
            return Err(ClientError::Config(
                "reconnect_max_delay must be at least reconnect_initial_delay".into(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(ClientError::Config(
                "read_timeout must be greater than zero".into(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ClientError::Config(
                "heartbeat_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
