//! Error types for the room layer.

use rollwill_protocol::PlayerId;

/// Errors a room mutation can be rejected with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// There is no room snapshot yet (not joined) or any more (left).
    #[error("no active room")]
    NoRoom,

    /// The room is closed and accepts no further mutations.
    #[error("room is closed")]
    RoomClosed,

    /// The player never joined this room.
    #[error("player {0} is not in the room")]
    PlayerNotFound(PlayerId),

    /// Only the room master may choose a roll value.
    #[error("player {0} is not the room master")]
    NotMaster(PlayerId),

    /// A chat message with nothing but whitespace.
    #[error("message is empty")]
    EmptyMessage,

    /// A chat message above the configured limit.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    /// A player name that is empty or too long.
    #[error("invalid player name: {0}")]
    InvalidName(String),
}
