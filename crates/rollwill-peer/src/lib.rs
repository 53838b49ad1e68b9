//! Peer connection lifecycle and room synchronization for Roll The Will.
//!
//! A room has one host and any number of guests, connected in a star of
//! data channels. The host applies every change to the room and sends
//! the new snapshot to all guests; guests only ask.
//!
//! # Key types
//!
//! - [`RoomPeer`]: one participant, created with [`create_peer`] (host)
//!   or [`join_peer`] (guest)
//! - [`PeerPool`]: registers an endpoint and keeps it open
//! - [`PlayerPool`]: opens a guest's channel to its host
//! - [`RoomConnection`] / [`PlayerConnection`]: host-side and guest-side
//!   channel handlers
//! - [`ConnectionStatus`] / [`ChannelState`]: endpoint and channel state
//!   machines
//! - [`PeerConfig`]: timeouts and heartbeat
//! - [`PeerEvent`]: joins, leaves and host loss

mod config;
mod connector;
mod error;
mod host;
mod link;
mod peer;
mod player_connection;
mod pool;
mod room_connection;
mod state;

pub use config::PeerConfig;
pub use connector::PlayerPool;
pub use error::PeerError;
pub use link::LinkLoss;
pub use peer::{create_peer, join_peer, PeerEvent, RoomPeer};
pub use player_connection::PlayerConnection;
pub use pool::{OpenEndpoint, PeerPool};
pub use room_connection::RoomConnection;
pub use state::{ChannelState, ConnectionStatus};
