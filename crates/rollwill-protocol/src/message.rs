//! The wire envelope exchanged over data channels.
//!
//! On the wire every message is one JSON object:
//!
//! ```text
//! { "type": "ROLL_REQUEST", "payload": { "playerId": "p2", "diceType": "d20" }, "timestamp": 1700000000000 }
//! ```
//!
//! In Rust the `type`/`payload` pair is the [`Message`] enum, so a payload
//! that does not match its type is rejected while decoding instead of
//! surfacing later as a missing field.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::types::{now_millis, DiceType, Player, PlayerId, Room};

/// The `type` tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Join,
    InitSync,
    StateUpdate,
    RollRequest,
    MessageRequest,
    Ping,
    Pong,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "JOIN",
            Self::InitSync => "INIT_SYNC",
            Self::StateUpdate => "STATE_UPDATE",
            Self::RollRequest => "ROLL_REQUEST",
            Self::MessageRequest => "MESSAGE_REQUEST",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message: the envelope's type together with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Guest → host, sent once right after the channel opens.
    Join { player: Player },
    /// Host → one guest, the reply to `Join`.
    InitSync { room: Room },
    /// Host → every guest after each mutation.
    StateUpdate { room: Room },
    /// Guest → host.
    RollRequest {
        player_id: PlayerId,
        dice_type: DiceType,
    },
    /// Guest → host.
    MessageRequest { player_id: PlayerId, content: String },
    /// Liveness ping, answered with `Pong`.
    Ping,
    Pong,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join { .. } => MessageType::Join,
            Self::InitSync { .. } => MessageType::InitSync,
            Self::StateUpdate { .. } => MessageType::StateUpdate,
            Self::RollRequest { .. } => MessageType::RollRequest,
            Self::MessageRequest { .. } => MessageType::MessageRequest,
            Self::Ping => MessageType::Ping,
            Self::Pong => MessageType::Pong,
        }
    }

    /// The player a guest request speaks for, if any.
    pub fn sender(&self) -> Option<&PlayerId> {
        match self {
            Self::Join { player } => Some(&player.id),
            Self::RollRequest { player_id, .. } | Self::MessageRequest { player_id, .. } => {
                Some(player_id)
            }
            _ => None,
        }
    }

    /// Returns the snapshot carried by `InitSync`/`StateUpdate`.
    pub fn room(&self) -> Option<&Room> {
        match self {
            Self::InitSync { room } | Self::StateUpdate { room } => Some(room),
            _ => None,
        }
    }
}

/// A message stamped with its creation time (Unix milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P2PMessage {
    pub message: Message,
    pub timestamp: i64,
}

impl P2PMessage {
    /// Wraps `message`, stamping the current time.
    pub fn new(message: Message) -> Self {
        Self::with_timestamp(message, now_millis())
    }

    pub fn with_timestamp(message: Message, timestamp: i64) -> Self {
        Self { message, timestamp }
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<Message> for P2PMessage {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}

/// Builds an envelope for `message` stamped with the current time.
pub fn create_message(message: Message) -> P2PMessage {
    P2PMessage::new(message)
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct JoinPayload<P> {
    player: P,
}

#[derive(Serialize, Deserialize)]
struct RoomPayload<R> {
    room: R,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RollRequestPayload<I> {
    player_id: I,
    dice_type: DiceType,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequestPayload<I, C> {
    player_id: I,
    content: C,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    payload: Option<serde_json::Value>,
    timestamp: i64,
}

fn payload<T: DeserializeOwned>(
    kind: MessageType,
    payload: Option<serde_json::Value>,
) -> Result<T, String> {
    let value = payload.ok_or_else(|| format!("{kind} requires a payload"))?;
    serde_json::from_value(value).map_err(|e| format!("invalid {kind} payload: {e}"))
}

impl RawEnvelope {
    fn into_message(self) -> Result<P2PMessage, String> {
        let kind = self.kind;
        let message = match kind {
            MessageType::Join => {
                let p: JoinPayload<Player> = payload(kind, self.payload)?;
                Message::Join { player: p.player }
            }
            MessageType::InitSync => {
                let p: RoomPayload<Room> = payload(kind, self.payload)?;
                Message::InitSync { room: p.room }
            }
            MessageType::StateUpdate => {
                let p: RoomPayload<Room> = payload(kind, self.payload)?;
                Message::StateUpdate { room: p.room }
            }
            MessageType::RollRequest => {
                let p: RollRequestPayload<PlayerId> = payload(kind, self.payload)?;
                Message::RollRequest {
                    player_id: p.player_id,
                    dice_type: p.dice_type,
                }
            }
            MessageType::MessageRequest => {
                let p: MessageRequestPayload<PlayerId, String> = payload(kind, self.payload)?;
                Message::MessageRequest {
                    player_id: p.player_id,
                    content: p.content,
                }
            }
            // Any payload on a liveness ping is ignored.
            MessageType::Ping => Message::Ping,
            MessageType::Pong => Message::Pong,
        };
        Ok(P2PMessage::with_timestamp(message, self.timestamp))
    }
}

impl Serialize for P2PMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.message_type())?;
        match &self.message {
            Message::Join { player } => {
                map.serialize_entry("payload", &JoinPayload { player })?;
            }
            Message::InitSync { room } | Message::StateUpdate { room } => {
                map.serialize_entry("payload", &RoomPayload { room })?;
            }
            Message::RollRequest {
                player_id,
                dice_type,
            } => {
                map.serialize_entry(
                    "payload",
                    &RollRequestPayload {
                        player_id,
                        dice_type: *dice_type,
                    },
                )?;
            }
            Message::MessageRequest { player_id, content } => {
                map.serialize_entry("payload", &MessageRequestPayload { player_id, content })?;
            }
            Message::Ping | Message::Pong => {}
        }
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for P2PMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawEnvelope::deserialize(deserializer)?
            .into_message()
            .map_err(de::Error::custom)
    }
}
