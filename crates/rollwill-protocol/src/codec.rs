//! Codec trait and the JSON implementation used on the wire.
//!
//! A codec turns envelopes into the bytes a data channel carries and back
//! again. Every channel handler owns one and never calls `serde_json`
//! itself, so the wire format is decided in exactly one place.
//!
//! Only [`JsonCodec`] exists today. Browser peers exchange UTF-8 JSON
//! text, and anything else on the same channel would be unreadable to
//! them.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts values to bytes and back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: a codec is shared by the reader tasks of every
///   channel, which Tokio may run on any worker thread.
/// - `'static`: codecs live inside long-running tasks and borrow nothing.
///
/// ## Generic methods
///
/// `encode` accepts any `T: Serialize` and `decode` any
/// `T: DeserializeOwned`. In practice `T` is [`P2PMessage`], whose
/// `Deserialize` impl checks the payload against the `type` tag, so a
/// successful decode already guarantees a well-formed message.
/// `DeserializeOwned` means the result owns its data and the frame
/// buffer can be dropped right after decoding.
///
/// [`P2PMessage`]: crate::P2PMessage
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`), the format browser peers
/// speak.
///
/// ```rust
/// use rollwill_protocol::{Codec, JsonCodec, Message, P2PMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&P2PMessage::with_timestamp(Message::Ping, 5)).unwrap();
/// assert_eq!(bytes, br#"{"type":"PING","timestamp":5}"#);
///
/// let back: P2PMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(back.message, Message::Ping);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, P2PMessage, PlayerId};

    #[test]
    fn test_json_codec_decode_truncated_input() {
        let codec = JsonCodec;
        let result = codec.decode::<P2PMessage>(br#"{"type":"PI"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_not_json() {
        let codec = JsonCodec;
        let result = codec.decode::<P2PMessage>(b"\xff\x00garbage");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_message_request_round_trip() {
        let codec = JsonCodec;
        let msg = P2PMessage::with_timestamp(
            Message::MessageRequest {
                player_id: PlayerId::new("p2"),
                content: "hello \"table\"".into(),
            },
            1_700_000_000_000,
        );
        let bytes = codec.encode(&msg).unwrap();
        let back: P2PMessage = codec.decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}
