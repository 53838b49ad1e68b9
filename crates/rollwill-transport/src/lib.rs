//! Transport abstraction layer for Roll The Will.
//!
//! A peer registers an [`Endpoint`] under a rendezvous name through a
//! [`Signaling`] backend, then opens or accepts [`DataChannel`]s to other
//! endpoints. Everything the network does arrives as a typed event:
//! [`EndpointEvent`] for the endpoint itself and [`ChannelEvent`] for each
//! channel. Higher layers never see callbacks, only event queues.
//!
//! # Backends
//!
//! - [`MemoryNetwork`]: in-process broker with fault injection, used by
//!   tests and single-process demos.
//! - `websocket` (default feature): [`RelayServer`] and
//!   [`WebSocketSignaling`]. Endpoints register with a WebSocket relay,
//!   which forwards channel traffic between them.

mod channel;
mod endpoint;
mod error;
mod memory;
#[cfg(feature = "websocket")]
mod relay;
#[cfg(feature = "websocket")]
mod websocket;

pub use channel::{ChannelEvent, ChannelSender, DataChannel};
pub use endpoint::{Endpoint, EndpointEvent, EndpointHandle, Signaling};
pub use error::TransportError;
pub use memory::MemoryNetwork;
#[cfg(feature = "websocket")]
pub use relay::RelayServer;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketSignaling;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for locally allocated channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a new `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, process-unique channel ID.
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// ICE connection state reported by a data channel.
///
/// Only `Closed`, `Disconnected` and `Failed` are terminal; the others are
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceState {
    /// Returns `true` if this state ends the channel's logical session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for IceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Checking => "checking",
            Self::Connected => "connected",
            Self::Completed => "completed",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
