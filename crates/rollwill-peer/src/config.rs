//! Peer timing configuration.

use std::time::Duration;

use tracing::warn;

/// Timeouts and heartbeat settings for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// How long an endpoint may take to register before the attempt fails.
    pub open_timeout: Duration,
    /// How long a guest waits for its channel to the host to open.
    pub handshake_timeout: Duration,
    /// Interval between `PING`s on every channel. Zero disables the
    /// heartbeat.
    pub heartbeat_interval: Duration,
    /// Silence after which a channel counts as lost.
    pub heartbeat_timeout: Duration,
    /// First delay before retrying a failed signaling reconnect. Doubles
    /// after each failure.
    pub reconnect_backoff: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_backoff_max: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            reconnect_backoff: Duration::from_secs(1),
            reconnect_backoff_max: Duration::from_secs(30),
        }
    }
}

impl PeerConfig {
    /// Returns the config with the heartbeat switched off.
    pub fn without_heartbeat(self) -> Self {
        Self {
            heartbeat_interval: Duration::ZERO,
            ..self
        }
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - Zero open or handshake timeouts fall back to the defaults.
    /// - A heartbeat timeout shorter than two intervals is raised to two
    ///   intervals, so a single late `PONG` never drops a channel.
    /// - A zero reconnect backoff falls back to the default, and the cap
    ///   is never below the first delay.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.open_timeout.is_zero() {
            warn!("open_timeout of 0 replaced with default");
            self.open_timeout = defaults.open_timeout;
        }
        if self.handshake_timeout.is_zero() {
            warn!("handshake_timeout of 0 replaced with default");
            self.handshake_timeout = defaults.handshake_timeout;
        }
        let floor = self.heartbeat_interval * 2;
        if !self.heartbeat_interval.is_zero() && self.heartbeat_timeout < floor {
            warn!(
                interval = ?self.heartbeat_interval,
                timeout = ?self.heartbeat_timeout,
                "heartbeat_timeout below two intervals, raising"
            );
            self.heartbeat_timeout = floor;
        }
        if self.reconnect_backoff.is_zero() {
            warn!("reconnect_backoff of 0 replaced with default");
            self.reconnect_backoff = defaults.reconnect_backoff;
        }
        if self.reconnect_backoff_max < self.reconnect_backoff {
            self.reconnect_backoff_max = self.reconnect_backoff;
        }
        self
    }

    /// Heartbeat period, or `None` when disabled.
    pub fn heartbeat(&self) -> Option<Duration> {
        (!self.heartbeat_interval.is_zero()).then_some(self.heartbeat_interval)
    }
}
