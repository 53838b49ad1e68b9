//! Host-side channel handler: one [`RoomConnection`] per connected guest.

use rollwill_protocol::naming::player_id_from_endpoint;
use rollwill_protocol::{JsonCodec, Message, MessageType, PlayerId, RoomCode};
use rollwill_transport::{ChannelId, ChannelSender, DataChannel};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::connector::await_open;
use crate::host::HostCommand;
use crate::link::{self, ChannelLink, LinkEvent};
use crate::PeerConfig;

/// The host's send half of one guest channel.
#[derive(Debug, Clone)]
pub struct RoomConnection {
    player_id: PlayerId,
    sender: ChannelSender,
}

impl RoomConnection {
    pub(crate) fn new(player_id: PlayerId, sender: ChannelSender) -> Self {
        Self { player_id, sender }
    }

    /// The guest this channel belongs to.
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn channel(&self) -> ChannelId {
        self.sender.id()
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_open()
    }

    /// Sends `message` to the guest. Does nothing if the channel is not
    /// open.
    pub fn send(&self, message: Message) {
        link::send_message(&self.sender, &JsonCodec, message);
    }

    pub(crate) fn send_bytes(&self, kind: MessageType, bytes: Vec<u8>) {
        link::send_bytes(&self.sender, kind, bytes);
    }

    pub fn close(&self) {
        self.sender.close();
    }
}

/// Accepts guest channels for `room_code` until `incoming` ends.
///
/// A channel's player comes from the remote endpoint name. Names outside
/// the room's guest namespace, and guest names carrying the host's own
/// id, are closed without reaching the host task.
pub(crate) async fn accept_loop(
    room_code: RoomCode,
    host_id: PlayerId,
    mut incoming: mpsc::UnboundedReceiver<DataChannel>,
    config: PeerConfig,
    host: mpsc::Sender<HostCommand>,
) {
    let mut readers = JoinSet::new();
    loop {
        tokio::select! {
            channel = incoming.recv() => {
                let Some(channel) = channel else { break };
                let Some(player_id) = player_id_from_endpoint(&room_code, channel.peer()) else {
                    tracing::warn!(room_code = %room_code, peer = channel.peer(), "channel from a foreign endpoint, closing");
                    channel.close();
                    continue;
                };
                if player_id == host_id {
                    tracing::warn!(room_code = %room_code, peer = channel.peer(), "channel claims the host's id, closing");
                    channel.close();
                    continue;
                }
                readers.spawn(serve_guest(player_id, channel, config.clone(), host.clone()));
            }
            Some(_) = readers.join_next(), if !readers.is_empty() => {}
        }
    }
    readers.shutdown().await;
}

/// Reader task for one guest channel: waits for open, registers the
/// connection with the host task and forwards every request and the
/// final loss to it.
async fn serve_guest(
    player_id: PlayerId,
    mut channel: DataChannel,
    config: PeerConfig,
    host: mpsc::Sender<HostCommand>,
) {
    match tokio::time::timeout(config.handshake_timeout, await_open(&mut channel)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(player_id = %player_id, error = %e, "guest channel failed before open");
            channel.close();
            return;
        }
        Err(_) => {
            tracing::debug!(player_id = %player_id, "guest channel never opened");
            channel.close();
            return;
        }
    }

    let mut link = ChannelLink::new(channel, &config);
    let channel_id = link.id();
    let connection = RoomConnection::new(player_id.clone(), link.sender());
    if host.send(HostCommand::Connected(connection)).await.is_err() {
        connection_closed(&link);
        return;
    }
    tracing::debug!(player_id = %player_id, channel = %channel_id, "guest channel open");

    loop {
        let command = match link.next().await {
            LinkEvent::Message(message) => HostCommand::Request {
                channel: channel_id,
                player_id: player_id.clone(),
                message,
            },
            LinkEvent::Lost(reason) => {
                let _ = host
                    .send(HostCommand::Lost {
                        channel: channel_id,
                        player_id,
                        reason,
                    })
                    .await;
                return;
            }
        };
        if host.send(command).await.is_err() {
            connection_closed(&link);
            return;
        }
    }
}

fn connection_closed(link: &ChannelLink) {
    tracing::debug!(channel = %link.id(), "host task gone, closing guest channel");
    link.sender().close();
}
