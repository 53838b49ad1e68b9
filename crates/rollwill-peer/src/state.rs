//! Connection state machines.
//!
//! Raw transport events are folded into these states at one dispatch
//! point per endpoint or channel, so every handler agrees on what
//! "open" and "lost" mean.

use std::fmt;

use rollwill_transport::{ChannelEvent, IceState};

/// Lifecycle of a peer's endpoint.
///
/// ```text
/// Created → Connecting → Connected → { Disconnected, Error }
/// ```
///
/// `Disconnected` is the signaling link dropping; the endpoint asks to
/// reconnect right away and returns to `Connected` when it re-opens.
/// `Error` after open is not terminal: while offline the reconnect is
/// retried with backoff (see [`PeerConfig::reconnect_backoff`]).
///
/// [`PeerConfig::reconnect_backoff`]: crate::PeerConfig::reconnect_backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Created,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one data channel.
///
/// ```text
/// Idle → Connecting → Open → { Closed, Failed }
/// ```
///
/// `Closed` and `Failed` are terminal and absorb every later event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ChannelState {
    /// Returns the state after `event`.
    pub fn apply(self, event: &ChannelEvent) -> Self {
        if self.is_terminal() {
            return self;
        }
        match event {
            ChannelEvent::Open => Self::Open,
            ChannelEvent::Data(_) => self,
            ChannelEvent::IceStateChanged(IceState::Closed) => Self::Closed,
            ChannelEvent::IceStateChanged(state) if state.is_terminal() => Self::Failed,
            ChannelEvent::IceStateChanged(_) => self,
            ChannelEvent::Error(_) => Self::Failed,
            ChannelEvent::Close => Self::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_state_happy_path() {
        let state = ChannelState::Connecting.apply(&ChannelEvent::Open);
        assert_eq!(state, ChannelState::Open);
        let state = state.apply(&ChannelEvent::Data(vec![1]));
        assert_eq!(state, ChannelState::Open);
        assert_eq!(state.apply(&ChannelEvent::Close), ChannelState::Closed);
    }

    #[test]
    fn test_channel_state_ice_transitions() {
        let open = ChannelState::Open;
        assert_eq!(
            open.apply(&ChannelEvent::IceStateChanged(IceState::Checking)),
            ChannelState::Open
        );
        assert_eq!(
            open.apply(&ChannelEvent::IceStateChanged(IceState::Failed)),
            ChannelState::Failed
        );
        assert_eq!(
            open.apply(&ChannelEvent::IceStateChanged(IceState::Disconnected)),
            ChannelState::Failed
        );
        assert_eq!(
            open.apply(&ChannelEvent::IceStateChanged(IceState::Closed)),
            ChannelState::Closed
        );
    }

    #[test]
    fn test_channel_state_terminal_absorbs_events() {
        let failed = ChannelState::Open.apply(&ChannelEvent::Error("boom".into()));
        assert_eq!(failed, ChannelState::Failed);
        assert_eq!(failed.apply(&ChannelEvent::Open), ChannelState::Failed);
        assert_eq!(
            ChannelState::Closed.apply(&ChannelEvent::Open),
            ChannelState::Closed
        );
    }

    #[test]
    fn test_connection_status_display() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
