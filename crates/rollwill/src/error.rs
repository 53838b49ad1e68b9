//! Unified error type for Roll The Will.

use rollwill_peer::PeerError;
use rollwill_protocol::ProtocolError;
use rollwill_room::RoomError;
use rollwill_transport::TransportError;

/// Top-level error wrapping every crate-specific error.
///
/// Room, transport and protocol errors that reach the facade through the
/// peer layer are unwrapped into their own variant, so a caller matches
/// `RollWillError::Room(RoomError::NotMaster(_))` no matter which layer
/// rejected the action.
#[derive(Debug, thiserror::Error)]
pub enum RollWillError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid room code or an undecodable message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected room action (closed room, not the master, bad input).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Connection setup or lifecycle failure.
    #[error(transparent)]
    Peer(PeerError),
}

impl From<PeerError> for RollWillError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Room(e) => Self::Room(e),
            PeerError::Protocol(e) => Self::Protocol(e),
            other => Self::Peer(other),
        }
    }
}

impl RollWillError {
    /// Returns `true` if creating or joining a room failed and may be
    /// retried.
    pub fn is_setup_failure(&self) -> bool {
        match self {
            Self::Peer(e) => e.is_setup_failure(),
            Self::Transport(_) => true,
            _ => false,
        }
    }

    /// A hint to show the user next to the error, if there is one.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Peer(e) => e.remediation(),
            Self::Protocol(ProtocolError::InvalidRoomCode(_)) => {
                Some("Room codes are six letters or digits.")
            }
            _ => None,
        }
    }
}
