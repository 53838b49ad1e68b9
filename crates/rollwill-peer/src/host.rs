//! Host writer task: the single owner of the canonical room.
//!
//! Every change to a hosted room goes through one task. Guest requests,
//! channel losses and the host's own actions all arrive on the same
//! bounded queue and are applied one at a time (mutate, publish the
//! snapshot, send), so updates are serialized in arrival order and none
//! is lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rollwill_protocol::{
    ChatMessage, Codec, DiceType, JsonCodec, Message, MessageType, P2PMessage, PlayerId,
    RollResult, Room, RoomCode,
};
use rollwill_room::{mutation, RoomError, RoomRules};
use rollwill_transport::ChannelId;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::link::LinkLoss;
use crate::{PeerError, PeerEvent, RoomConnection};

const COMMAND_CAPACITY: usize = 64;

/// Replica published to subscribers: `None` once the room is gone.
pub(crate) type Snapshot = Arc<watch::Sender<Option<Arc<Room>>>>;

/// Everything the host writer task can be asked to do.
///
/// Commands come from two directions. Guest reader tasks (see
/// `accept_loop`) send
/// `Connected`, `Request` and `Lost`. The local [`HostHandle`] sends the
/// host's own actions, most of them carrying a `oneshot` reply so the
/// caller learns whether its mutation was accepted.
///
/// ## Ordering
///
/// All commands share one bounded queue and are processed strictly in
/// arrival order, each to completion: run the rules, publish the new
/// snapshot, then send `INIT_SYNC` or `STATE_UPDATE`. Two guests rolling
/// at the same moment therefore land in the history in the order the
/// host received them, and neither update overwrites the other.
///
/// ## Channel identity
///
/// `Request` and `Lost` carry the [`ChannelId`] they came from. Only the
/// channel currently tracked for that player is obeyed, so a replaced
/// channel that errors late cannot remove a player who already
/// reconnected.
pub(crate) enum HostCommand {
    /// A guest channel opened.
    Connected(RoomConnection),

    /// A decoded message from a guest channel.
    Request {
        channel: ChannelId,
        player_id: PlayerId,
        message: Message,
    },

    /// A guest channel closed, errored, hit a terminal ICE state or went
    /// silent.
    Lost {
        channel: ChannelId,
        player_id: PlayerId,
        reason: LinkLoss,
    },

    Roll {
        dice: DiceType,
        reply: oneshot::Sender<Result<RollResult, RoomError>>,
    },

    CheatRoll {
        dice: DiceType,
        value: i64,
        reply: oneshot::Sender<Result<RollResult, RoomError>>,
    },

    Chat {
        content: String,
        reply: oneshot::Sender<Result<ChatMessage, RoomError>>,
    },

    /// Close the room and tell every guest.
    Close { reply: oneshot::Sender<()> },

    /// Send a message as-is to every guest.
    Broadcast { message: Message },

    Shutdown,
}

/// Handle to a running host task.
#[derive(Clone)]
pub(crate) struct HostHandle {
    commands: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    pub(crate) fn sender(&self) -> mpsc::Sender<HostCommand> {
        self.commands.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> Result<T, PeerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| PeerError::Unavailable)?;
        reply_rx.await.map_err(|_| PeerError::Unavailable)
    }

    pub(crate) async fn roll(&self, dice: DiceType) -> Result<RollResult, PeerError> {
        Ok(self.request(|reply| HostCommand::Roll { dice, reply }).await??)
    }

    pub(crate) async fn cheat_roll(&self, dice: DiceType, value: i64) -> Result<RollResult, PeerError> {
        Ok(self
            .request(|reply| HostCommand::CheatRoll { dice, value, reply })
            .await??)
    }

    pub(crate) async fn chat(&self, content: String) -> Result<ChatMessage, PeerError> {
        Ok(self.request(|reply| HostCommand::Chat { content, reply }).await??)
    }

    pub(crate) async fn close(&self) -> Result<(), PeerError> {
        self.request(|reply| HostCommand::Close { reply }).await
    }

    pub(crate) async fn broadcast(&self, message: Message) -> Result<(), PeerError> {
        self.commands
            .send(HostCommand::Broadcast { message })
            .await
            .map_err(|_| PeerError::Unavailable)
    }

    /// Asks the task to stop without waiting. Used from `Drop`.
    pub(crate) fn shutdown_now(&self) {
        let _ = self.commands.try_send(HostCommand::Shutdown);
    }
}

/// Shared state handed to the host task by its owner.
pub(crate) struct HostContext {
    pub(crate) host_id: PlayerId,
    pub(crate) room_code: RoomCode,
    pub(crate) rules: Arc<dyn RoomRules>,
    pub(crate) snapshot: Snapshot,
    pub(crate) events: broadcast::Sender<PeerEvent>,
    pub(crate) destroyed: Arc<AtomicBool>,
}

struct HostTask {
    room: Arc<Room>,
    ctx: HostContext,
    connections: HashMap<PlayerId, RoomConnection>,
    codec: JsonCodec,
    commands: mpsc::Receiver<HostCommand>,
}

/// Seeds the canonical room, publishes it and starts the writer task.
pub(crate) fn spawn_host(room: Room, ctx: HostContext) -> (HostHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let room = Arc::new(room);
    ctx.snapshot.send_replace(Some(Arc::clone(&room)));
    let task = HostTask {
        room,
        ctx,
        connections: HashMap::new(),
        codec: JsonCodec,
        commands: rx,
    };
    let join = tokio::spawn(task.run());
    (HostHandle { commands: tx }, join)
}

impl HostTask {
    async fn run(mut self) {
        tracing::info!(room_code = %self.ctx.room_code, host = %self.ctx.host_id, "hosting room");

        while let Some(command) = self.commands.recv().await {
            match command {
                HostCommand::Connected(connection) => self.handle_connected(connection),
                HostCommand::Request {
                    channel,
                    player_id,
                    message,
                } => self.handle_request(channel, player_id, message),
                HostCommand::Lost {
                    channel,
                    player_id,
                    reason,
                } => self.handle_lost(channel, player_id, reason),
                HostCommand::Roll { dice, reply } => {
                    let result = self
                        .ctx
                        .rules
                        .on_roll_request(&self.room, &self.ctx.host_id, dice)
                        .map(|(room, roll)| {
                            self.commit_and_broadcast(room);
                            roll
                        });
                    let _ = reply.send(result);
                }
                HostCommand::CheatRoll { dice, value, reply } => {
                    let result = self
                        .ctx
                        .rules
                        .on_cheat_roll(&self.room, &self.ctx.host_id, dice, value)
                        .map(|(room, roll)| {
                            self.commit_and_broadcast(room);
                            roll
                        });
                    let _ = reply.send(result);
                }
                HostCommand::Chat { content, reply } => {
                    let result = self
                        .ctx
                        .rules
                        .on_message_request(&self.room, &self.ctx.host_id, &content)
                        .map(|(room, message)| {
                            self.commit_and_broadcast(room);
                            message
                        });
                    let _ = reply.send(result);
                }
                HostCommand::Close { reply } => {
                    let closed = mutation::close(&self.room);
                    self.commit_and_broadcast(closed);
                    tracing::info!(room_code = %self.ctx.room_code, "room closed");
                    let _ = reply.send(());
                }
                HostCommand::Broadcast { message } => self.broadcast(message, None),
                HostCommand::Shutdown => break,
            }
        }

        for connection in self.connections.values() {
            connection.close();
        }
        tracing::info!(room_code = %self.ctx.room_code, "host task stopped");
    }

    fn destroyed(&self) -> bool {
        self.ctx.destroyed.load(Ordering::Acquire)
    }

    fn handle_connected(&mut self, connection: RoomConnection) {
        let player_id = connection.player_id().clone();
        tracing::debug!(room_code = %self.ctx.room_code, player_id = %player_id, channel = %connection.channel(), "tracking guest channel");
        if let Some(old) = self.connections.insert(player_id.clone(), connection) {
            tracing::info!(player_id = %player_id, channel = %old.channel(), "replacing previous channel");
            old.close();
        }
    }

    /// Only the channel currently tracked for `player_id` may speak for it.
    fn is_current(&self, channel: ChannelId, player_id: &PlayerId) -> bool {
        self.connections
            .get(player_id)
            .is_some_and(|c| c.channel() == channel)
    }

    fn handle_request(&mut self, channel: ChannelId, player_id: PlayerId, message: Message) {
        if self.destroyed() || !self.is_current(channel, &player_id) {
            return;
        }
        if let Some(claimed) = message.sender() {
            if *claimed != player_id {
                tracing::warn!(
                    player_id = %player_id,
                    claimed = %claimed,
                    kind = %message.message_type(),
                    "request speaks for another player, dropping"
                );
                return;
            }
        }

        match message {
            Message::Join { player } => match self.ctx.rules.on_join(&self.room, &player) {
                Ok(room) => {
                    self.commit(room);
                    if let Some(connection) = self.connections.get(&player_id) {
                        connection.send(Message::InitSync {
                            room: (*self.room).clone(),
                        });
                    }
                    self.broadcast_state(Some(&player_id));
                    let joined = self.room.player(&player_id).cloned().unwrap_or(player);
                    tracing::info!(room_code = %self.ctx.room_code, player_id = %player_id, name = %joined.name, "player joined");
                    let _ = self.ctx.events.send(PeerEvent::PlayerJoined(joined));
                }
                Err(e) => {
                    // The guest still gets the room so it can see why.
                    self.rejected(&player_id, MessageType::Join, &e);
                    if let Some(connection) = self.connections.get(&player_id) {
                        connection.send(Message::InitSync {
                            room: (*self.room).clone(),
                        });
                    }
                }
            },
            Message::RollRequest {
                player_id: requester,
                dice_type,
            } => match self.ctx.rules.on_roll_request(&self.room, &requester, dice_type) {
                Ok((room, roll)) => {
                    tracing::debug!(player_id = %requester, dice = %dice_type, result = roll.result, "rolled");
                    self.commit_and_broadcast(room);
                }
                Err(e) => self.rejected(&requester, MessageType::RollRequest, &e),
            },
            Message::MessageRequest {
                player_id: requester,
                content,
            } => match self.ctx.rules.on_message_request(&self.room, &requester, &content) {
                Ok((room, _)) => self.commit_and_broadcast(room),
                Err(e) => self.rejected(&requester, MessageType::MessageRequest, &e),
            },
            other @ (Message::InitSync { .. } | Message::StateUpdate { .. }) => {
                tracing::warn!(player_id = %player_id, kind = %other.message_type(), "host-only message from a guest, dropping");
            }
            Message::Ping | Message::Pong => {}
        }
    }

    fn rejected(&self, player_id: &PlayerId, kind: MessageType, error: &RoomError) {
        tracing::debug!(room_code = %self.ctx.room_code, player_id = %player_id, %kind, error = %error, "request rejected");
    }

    fn handle_lost(&mut self, channel: ChannelId, player_id: PlayerId, reason: LinkLoss) {
        if self.destroyed() || !self.is_current(channel, &player_id) {
            return;
        }
        self.connections.remove(&player_id);
        if !self.room.is_active(&player_id) {
            tracing::debug!(room_code = %self.ctx.room_code, player_id = %player_id, %reason, "channel lost before join");
            return;
        }
        let room = self.ctx.rules.on_leave(&self.room, &player_id);
        self.commit_and_broadcast(room);
        tracing::info!(room_code = %self.ctx.room_code, player_id = %player_id, %reason, "player left");
        let _ = self
            .ctx
            .events
            .send(PeerEvent::PlayerLeft { player_id, reason });
    }

    fn commit(&mut self, room: Room) {
        self.room = Arc::new(room);
        self.ctx.snapshot.send_replace(Some(Arc::clone(&self.room)));
    }

    fn commit_and_broadcast(&mut self, room: Room) {
        self.commit(room);
        self.broadcast_state(None);
    }

    fn broadcast_state(&self, except: Option<&PlayerId>) {
        self.broadcast(
            Message::StateUpdate {
                room: (*self.room).clone(),
            },
            except,
        );
    }

    /// Encodes once and sends to every tracked channel. Per-channel
    /// failures are logged and skipped.
    fn broadcast(&self, message: Message, except: Option<&PlayerId>) {
        let kind = message.message_type();
        let bytes = match self.codec.encode(&P2PMessage::new(message)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "failed to encode broadcast");
                return;
            }
        };
        for (player_id, connection) in &self.connections {
            if Some(player_id) != except {
                connection.send_bytes(kind, bytes.clone());
            }
        }
    }
}
