//! Wire protocol for Roll The Will.
//!
//! This crate defines what peers say to each other:
//!
//! - **Types** ([`Room`], [`Player`], [`RollResult`], [`ChatMessage`],
//!   [`DiceType`], [`RoomCode`]): the room snapshot replicated from host to
//!   guests.
//! - **Messages** ([`P2PMessage`], [`Message`]): the `{ type, payload,
//!   timestamp }` envelope, with one typed payload per message type.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, envelopes out.
//! - **Naming** ([`naming`]): room codes and player ids to rendezvous
//!   endpoint names and back.
//!
//! ```text
//! Transport (bytes) → Protocol (P2PMessage) → Peer (room state)
//! ```

mod codec;
mod error;
mod message;
pub mod naming;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{create_message, Message, MessageType, P2PMessage};
pub use types::{
    now_millis, ChatMessage, DiceType, Player, PlayerId, RollResult, Room, RoomCode, RoomStatus,
};
