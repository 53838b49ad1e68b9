//! Room peer coordinator.
//!
//! A [`RoomPeer`] is one participant's end of a room: the host, which
//! owns the canonical room and serves every guest, or a guest holding a
//! replica fed by its host. Both publish snapshots on a `watch` channel
//! and lifecycle changes as [`PeerEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rollwill_protocol::naming::{guest_endpoint_id, guest_endpoint_name, host_endpoint_name};
use rollwill_protocol::{ChatMessage, DiceType, Message, Player, PlayerId, RollResult, Room, RoomCode};
use rollwill_room::{mutation, RoomRules};
use rollwill_transport::{EndpointHandle, Signaling};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::host::{spawn_host, HostContext, HostHandle, Snapshot};
use crate::link::{ChannelLink, LinkLoss};
use crate::player_connection::read_host;
use crate::room_connection::accept_loop;
use crate::{ConnectionStatus, PeerConfig, PeerError, PeerPool, PlayerConnection, PlayerPool};

const EVENT_CAPACITY: usize = 64;

/// A lifecycle change worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Host only: a guest joined (or re-joined).
    PlayerJoined(Player),
    /// Host only: a guest's channel was lost.
    PlayerLeft { player_id: PlayerId, reason: LinkLoss },
    /// Guest only: the channel to the host was lost. There is no
    /// automatic rejoin.
    HostDisconnected(LinkLoss),
}

enum Role {
    Host { handle: HostHandle },
    Guest { connection: PlayerConnection },
}

/// One participant's connection to a room.
///
/// A `RoomPeer` is either a host (built by [`create_peer`]) or a guest
/// (built by [`join_peer`]). The role decides which operations work:
///
/// | operation | host | guest |
/// |---|---|---|
/// | [`send_to_host`](Self::send_to_host) | `NoHost` | sends to the host |
/// | [`broadcast`](Self::broadcast), `host_*`, [`close_room`](Self::close_room) | applied by the writer task | `NotHosting` |
/// | [`room`](Self::room), [`subscribe`](Self::subscribe) | canonical room | replica from the last sync |
///
/// ## Snapshots
///
/// The room is published as `Arc<Room>` on a `watch` channel. A host
/// publishes after every accepted mutation; a guest publishes whenever
/// `INIT_SYNC` or `STATE_UPDATE` brings a room that differs from its
/// replica. A guest's snapshot is `None` until the first sync, and every
/// snapshot is `None` after [`disconnect`](Self::disconnect).
///
/// ## Events
///
/// Joins, leaves and host loss are sent as [`PeerEvent`]s on a
/// `broadcast` channel. Events stop as soon as `disconnect` starts, so
/// tearing down a host does not report its own guests as leaving.
///
/// Dropping a `RoomPeer` disconnects it.
pub struct RoomPeer {
    id: String,
    room_code: RoomCode,
    local: Player,
    role: Role,
    endpoint: EndpointHandle,
    status: watch::Receiver<ConnectionStatus>,
    snapshot: Snapshot,
    events: broadcast::Sender<PeerEvent>,
    destroyed: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Hosts a new room under `room_code`.
///
/// Registers the host endpoint, seeds the room with `host` as host and
/// master, and starts accepting guests.
///
/// # Errors
/// Any setup failure from [`PeerPool::open_with`], or
/// [`PeerError::Room`] if the host's name is invalid.
pub async fn create_peer(
    signaling: Arc<dyn Signaling>,
    config: PeerConfig,
    room_code: RoomCode,
    host: Player,
    rules: Arc<dyn RoomRules>,
) -> Result<RoomPeer, PeerError> {
    let config = config.validated();
    let pool = PeerPool::new(signaling, config.clone());
    let name = host_endpoint_name(&room_code);

    let (endpoint, room) = pool
        .open_with(&name, |_| {
            let host_name = mutation::validate_name(rules.config(), &host.name)?;
            let host = Player::with_id(host.id.clone(), host_name);
            Ok(mutation::open_room(room_code.clone(), host))
        })
        .await?;
    let local = room.host.clone();

    let snapshot: Snapshot = Arc::new(watch::channel(None).0);
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let destroyed = Arc::new(AtomicBool::new(false));

    let (handle, host_task) = spawn_host(
        room,
        HostContext {
            host_id: local.id.clone(),
            room_code: room_code.clone(),
            rules,
            snapshot: Arc::clone(&snapshot),
            events: events.clone(),
            destroyed: Arc::clone(&destroyed),
        },
    );
    let acceptor = tokio::spawn(accept_loop(
        room_code.clone(),
        local.id.clone(),
        endpoint.incoming,
        config,
        handle.sender(),
    ));

    Ok(RoomPeer {
        id: room_code.to_string(),
        room_code,
        local,
        role: Role::Host { handle },
        endpoint: endpoint.handle,
        status: endpoint.status,
        snapshot,
        events,
        destroyed,
        tasks: vec![host_task, acceptor, endpoint.supervisor],
    })
}

/// Joins the room hosted under `room_code` as `player`.
///
/// Returns once the channel to the host is open and `JOIN` is sent. The
/// replica arrives with the host's `INIT_SYNC`; watch
/// [`RoomPeer::subscribe`] for it.
///
/// # Errors
/// Any setup failure from [`PeerPool::open`] or [`PlayerPool::connect`].
/// The guest endpoint is destroyed on failure.
pub async fn join_peer(
    signaling: Arc<dyn Signaling>,
    config: PeerConfig,
    player: Player,
    room_code: RoomCode,
) -> Result<RoomPeer, PeerError> {
    let config = config.validated();
    let pool = PeerPool::new(signaling, config.clone());
    let endpoint = pool
        .open(&guest_endpoint_name(&room_code, &player.id))
        .await?;

    let target = host_endpoint_name(&room_code);
    let channel = match PlayerPool::new(config.clone())
        .connect(&endpoint.handle, &target)
        .await
    {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(room_code = %room_code, error = %e, "could not reach host");
            endpoint.shutdown();
            return Err(e);
        }
    };

    let link = ChannelLink::new(channel, &config);
    let connection = PlayerConnection::new(player.clone(), link.sender());
    if let Err(e) = connection.join() {
        endpoint.shutdown();
        return Err(e);
    }
    tracing::info!(room_code = %room_code, player_id = %player.id, "joined room");

    let snapshot: Snapshot = Arc::new(watch::channel(None).0);
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let destroyed = Arc::new(AtomicBool::new(false));
    let reader = tokio::spawn(read_host(
        link,
        Arc::clone(&snapshot),
        events.clone(),
        Arc::clone(&destroyed),
    ));

    // Guest endpoints never accept channels.
    let mut incoming = endpoint.incoming;
    let refuser = tokio::spawn(async move {
        while let Some(channel) = incoming.recv().await {
            tracing::debug!(peer = channel.peer(), "guest endpoint refusing channel");
            channel.close();
        }
    });

    Ok(RoomPeer {
        id: guest_endpoint_id(&room_code, &player.id),
        room_code,
        local: player,
        role: Role::Guest { connection },
        endpoint: endpoint.handle,
        status: endpoint.status,
        snapshot,
        events,
        destroyed,
        tasks: vec![reader, refuser, endpoint.supervisor],
    })
}

impl RoomPeer {
    /// The endpoint id without namespace: the room code for a host,
    /// `<roomCode>-<playerId>` for a guest.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// The local player.
    pub fn player(&self) -> &Player {
        &self.local
    }

    pub fn is_host(&self) -> bool {
        matches!(self.role, Role::Host { .. })
    }

    pub fn is_connected(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire)
    }

    /// Current endpoint status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The latest room snapshot, if any.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.snapshot.borrow().clone()
    }

    /// Receives every new snapshot. `None` means there is no room (not
    /// synced yet, or disconnected).
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Room>>> {
        self.snapshot.subscribe()
    }

    /// Receives lifecycle events from now on.
    pub fn events(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    /// Sends `message` to the host.
    ///
    /// # Errors
    /// [`PeerError::NoHost`] on a host, after disconnecting, or once the
    /// host channel is gone.
    pub fn send_to_host(&self, message: Message) -> Result<(), PeerError> {
        match &self.role {
            Role::Guest { connection } if self.is_connected() => connection.send(message),
            _ => Err(PeerError::NoHost),
        }
    }

    /// Sends `message` to every guest.
    ///
    /// # Errors
    /// [`PeerError::NotHosting`] on a guest, [`PeerError::Unavailable`]
    /// after disconnecting.
    pub async fn broadcast(&self, message: Message) -> Result<(), PeerError> {
        self.host()?.broadcast(message).await
    }

    /// Rolls for the host through the writer task.
    pub async fn host_roll(&self, dice: DiceType) -> Result<RollResult, PeerError> {
        self.host()?.roll(dice).await
    }

    /// Records a master-chosen value for the host.
    pub async fn host_cheat_roll(&self, dice: DiceType, value: i64) -> Result<RollResult, PeerError> {
        self.host()?.cheat_roll(dice, value).await
    }

    /// Posts a chat message as the host.
    pub async fn host_chat(&self, content: impl Into<String>) -> Result<ChatMessage, PeerError> {
        self.host()?.chat(content.into()).await
    }

    /// Closes the room for everyone. The endpoint stays up until
    /// [`disconnect`](Self::disconnect).
    pub async fn close_room(&self) -> Result<(), PeerError> {
        self.host()?.close().await
    }

    fn host(&self) -> Result<&HostHandle, PeerError> {
        match &self.role {
            Role::Host { handle } => Ok(handle),
            Role::Guest { .. } => Err(PeerError::NotHosting),
        }
    }

    /// Tears the peer down: stops the tasks, destroys the endpoint and
    /// clears the snapshot. Loss events caused by the teardown itself
    /// are suppressed. Calling it twice is a no-op.
    pub fn disconnect(&mut self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        match &self.role {
            Role::Host { handle } => handle.shutdown_now(),
            Role::Guest { connection } => connection.close(),
        }
        self.endpoint.destroy();
        self.snapshot.send_replace(None);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!(endpoint = self.endpoint.name(), "peer disconnected");
    }
}

impl Drop for RoomPeer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for RoomPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomPeer")
            .field("id", &self.id)
            .field("host", &self.is_host())
            .field("player", &self.local.id)
            .finish_non_exhaustive()
    }
}
