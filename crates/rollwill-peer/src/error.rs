//! Error types for the peer layer.

use std::time::Duration;

use rollwill_protocol::ProtocolError;
use rollwill_room::RoomError;
use rollwill_transport::TransportError;

/// Errors from creating, joining or driving a room peer.
///
/// Connection loss after setup is never an error value: it arrives as a
/// [`PeerEvent`](crate::PeerEvent) and a snapshot change instead.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The endpoint did not register in time.
    #[error("endpoint {name} did not open within {timeout:?}")]
    OpenTimeout { name: String, timeout: Duration },

    /// The channel to the host did not open in time.
    #[error("no answer from {target} within {timeout:?}")]
    HandshakeTimeout { target: String, timeout: Duration },

    /// The transport rejected the endpoint (e.g. name taken, relay
    /// unreachable).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The channel failed before it opened.
    #[error("channel error: {0}")]
    Channel(String),

    /// The host closed the channel before it opened.
    #[error("connection closed by host")]
    ClosedByHost,

    /// No host channel is tracked: this peer hosts, has not joined, or
    /// lost its host.
    #[error("not connected to a host")]
    NoHost,

    /// A host-only operation was called on a guest.
    #[error("this peer is not hosting a room")]
    NotHosting,

    /// The peer was disconnected.
    #[error("peer is disconnected")]
    Unavailable,

    /// The room rejected the mutation.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl PeerError {
    /// Returns `true` for failures while creating or joining a room. The
    /// whole create/join call may be retried.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::OpenTimeout { .. }
                | Self::HandshakeTimeout { .. }
                | Self::Transport(_)
                | Self::Channel(_)
                | Self::ClosedByHost
        )
    }

    /// A hint to show next to a setup failure.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::OpenTimeout { .. } => Some(
                "Could not reach the rendezvous service. Check your network connection and try again.",
            ),
            Self::HandshakeTimeout { .. } => Some(
                "The host did not answer. Check the room code; a strict NAT or firewall on either side can also block peer connections.",
            ),
            Self::Transport(TransportError::Signaling(_)) => Some(
                "The rendezvous service refused this session. If the room code is already in use, pick another one.",
            ),
            Self::Transport(_) | Self::Channel(_) => Some(
                "The connection failed. A firewall or VPN may be blocking peer-to-peer traffic.",
            ),
            Self::ClosedByHost => Some("The host closed the connection. The room may have ended."),
            _ => None,
        }
    }
}
