//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating protocol
/// values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not a valid envelope: malformed JSON, an unknown
    /// `type`, or a payload that does not match its type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A room code that is not six ASCII alphanumerics.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// An unknown dice name.
    #[error("unknown dice type: {0:?}")]
    InvalidDice(String),
}
