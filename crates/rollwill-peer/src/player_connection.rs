//! Guest-side channel handler: the one channel to the host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rollwill_protocol::{JsonCodec, Message, Player, RoomStatus};
use rollwill_transport::{ChannelId, ChannelSender};
use tokio::sync::broadcast;

use crate::host::Snapshot;
use crate::link::{self, ChannelLink, LinkEvent};
use crate::{PeerError, PeerEvent};

/// A guest's send half of its channel to the host.
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    player: Player,
    host: ChannelSender,
}

impl PlayerConnection {
    pub(crate) fn new(player: Player, host: ChannelSender) -> Self {
        Self { player, host }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn channel(&self) -> ChannelId {
        self.host.id()
    }

    pub fn is_open(&self) -> bool {
        self.host.is_open()
    }

    /// Announces the local player to the host.
    pub fn join(&self) -> Result<(), PeerError> {
        self.send(Message::Join {
            player: self.player.clone(),
        })
    }

    /// Sends `message` to the host.
    ///
    /// # Errors
    /// [`PeerError::NoHost`] if the channel is no longer open.
    pub fn send(&self, message: Message) -> Result<(), PeerError> {
        if !self.host.is_open() {
            return Err(PeerError::NoHost);
        }
        if link::send_message(&self.host, &JsonCodec, message) {
            Ok(())
        } else {
            Err(PeerError::NoHost)
        }
    }

    pub(crate) fn close(&self) {
        self.host.close();
    }
}

/// Reader task for the host channel. Replaces the replica on every
/// snapshot and reports host loss once.
pub(crate) async fn read_host(
    mut link: ChannelLink,
    snapshot: Snapshot,
    events: broadcast::Sender<PeerEvent>,
    destroyed: Arc<AtomicBool>,
) {
    loop {
        match link.next().await {
            LinkEvent::Message(Message::InitSync { room } | Message::StateUpdate { room }) => {
                let changed = snapshot.send_if_modified(|current| {
                    if current.as_deref() == Some(&room) {
                        return false;
                    }
                    *current = Some(Arc::new(room));
                    true
                });
                if changed {
                    tracing::debug!(channel = %link.id(), "replica updated");
                }
            }
            LinkEvent::Message(other) => {
                tracing::warn!(kind = %other.message_type(), "request-only message from the host, dropping");
            }
            LinkEvent::Lost(reason) => {
                if destroyed.load(Ordering::Acquire) {
                    return;
                }
                snapshot.send_if_modified(|current| match current {
                    Some(room) if room.status != RoomStatus::Closed => {
                        let mut closed = (**room).clone();
                        closed.status = RoomStatus::Closed;
                        *room = Arc::new(closed);
                        true
                    }
                    _ => false,
                });
                tracing::info!(channel = %link.id(), %reason, "host disconnected");
                let _ = events.send(PeerEvent::HostDisconnected(reason));
                return;
            }
        }
    }
}
