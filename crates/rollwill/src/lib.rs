//! # Roll The Will
//!
//! Serverless dice rooms. One player hosts a room and is the authority
//! for its state; others join by room code over peer-to-peer data
//! channels and see every change as a fresh snapshot.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rollwill::prelude::*;
//!
//! # async fn run() -> Result<(), RollWillError> {
//! rollwill::init_tracing();
//! let client = RollWill::builder().build();
//!
//! let session = client.join_room(Player::new("Bo"), "ABC123").await?;
//! let mut snapshots = session.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     if let Some(room) = snapshots.borrow_and_update().as_ref() {
//!         println!("{} players, {} rolls", room.players.len(), room.rolls.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod session;
mod telemetry;

pub use client::{RollWill, RollWillBuilder, DEFAULT_RELAY_URL};
pub use error::RollWillError;
pub use session::RoomSession;
pub use telemetry::init_tracing;

pub use rollwill_peer as peer;
pub use rollwill_protocol as protocol;
pub use rollwill_room as room;
pub use rollwill_transport as transport;

/// Common imports for applications.
pub mod prelude {
    pub use crate::{RollWill, RollWillBuilder, RollWillError, RoomSession};
    pub use rollwill_peer::{ConnectionStatus, LinkLoss, PeerConfig, PeerEvent};
    pub use rollwill_protocol::{
        ChatMessage, DiceType, Player, PlayerId, RollResult, Room, RoomCode, RoomStatus,
    };
    pub use rollwill_room::{RoomConfig, RoomError, RoomRules, StandardRules};
    pub use rollwill_transport::{MemoryNetwork, Signaling, WebSocketSignaling};
}
