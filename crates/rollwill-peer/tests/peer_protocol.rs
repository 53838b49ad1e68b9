//! End-to-end tests for host and guest peers over the in-process network.
//!
//! Real `RoomPeer`s talk through a `MemoryNetwork`; the network's fault
//! injection stands in for ICE failures, closes and signaling drops. A
//! few tests drive a raw transport endpoint as a guest to control exactly
//! what reaches the host.

use std::sync::Arc;
use std::time::Duration;

use rollwill_peer::{
    create_peer, join_peer, ConnectionStatus, LinkLoss, PeerConfig, PeerError, PeerEvent,
    PlayerPool, RoomPeer,
};
use rollwill_protocol::naming::{guest_endpoint_name, host_endpoint_name};
use rollwill_protocol::{
    Codec, DiceType, JsonCodec, Message, P2PMessage, Player, PlayerId, Room, RoomCode, RoomStatus,
};
use rollwill_room::{RoomError, StandardRules};
use rollwill_transport::{
    ChannelEvent, DataChannel, Endpoint, EndpointEvent, IceState, MemoryNetwork, Signaling,
    TransportError,
};
use tokio::sync::{broadcast, watch};

const CODE: &str = "ABC123";

fn code() -> RoomCode {
    RoomCode::parse(CODE).unwrap()
}

fn config() -> PeerConfig {
    PeerConfig::default().without_heartbeat()
}

async fn host_on(network: &MemoryNetwork, config: PeerConfig) -> Result<RoomPeer, PeerError> {
    create_peer(
        Arc::new(network.clone()),
        config,
        code(),
        Player::with_id("host", "Al"),
        Arc::new(StandardRules::default()),
    )
    .await
}

async fn guest_on(network: &MemoryNetwork, id: &str, name: &str) -> Result<RoomPeer, PeerError> {
    join_peer(
        Arc::new(network.clone()),
        config(),
        Player::with_id(id, name),
        code(),
    )
    .await
}

/// Helper: waits until the snapshot satisfies `pred` and returns it.
async fn wait_room(
    rx: &mut watch::Receiver<Option<Arc<Room>>>,
    pred: impl FnMut(&Room) -> bool,
) -> Arc<Room> {
    let mut pred = pred;
    let guard = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|room| room.as_deref().is_some_and(&mut pred)),
    )
    .await
    .expect("snapshot should arrive")
    .expect("snapshot sender should be alive");
    let room: Option<Arc<Room>> = (*guard).clone();
    room.unwrap()
}

async fn next_peer_event(events: &mut broadcast::Receiver<PeerEvent>) -> PeerEvent {
    tokio::time::timeout(Duration::from_secs(30), events.recv())
        .await
        .expect("peer event should arrive")
        .expect("event stream should be open")
}

/// Helper: a host with one joined guest `p2`, both synced.
async fn joined_pair(network: &MemoryNetwork) -> (RoomPeer, RoomPeer) {
    let host = host_on(network, config()).await.unwrap();
    let guest = guest_on(network, "p2", "Bo").await.unwrap();
    wait_room(&mut guest.subscribe(), |room| room.players.len() == 2).await;
    (host, guest)
}

/// A transport endpoint acting as a guest, so tests choose every frame.
struct RawGuest {
    _endpoint: Endpoint,
    channel: DataChannel,
}

impl RawGuest {
    async fn connect(network: &MemoryNetwork, id: &str) -> Self {
        let name = guest_endpoint_name(&code(), &PlayerId::new(id));
        Self::connect_as(network, &name).await
    }

    async fn connect_as(network: &MemoryNetwork, name: &str) -> Self {
        let mut endpoint = network.register(name);
        assert!(matches!(endpoint.recv().await, Some(EndpointEvent::Open)));
        let mut channel = endpoint.handle().connect(&host_endpoint_name(&code()));
        assert_eq!(channel.recv().await, Some(ChannelEvent::Open));
        Self {
            _endpoint: endpoint,
            channel,
        }
    }

    fn send(&self, message: Message) {
        let bytes = JsonCodec.encode(&P2PMessage::new(message)).unwrap();
        self.channel.send(bytes).unwrap();
    }

    /// Next application message, skipping liveness pings.
    async fn recv(&mut self) -> Option<Message> {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.channel.recv())
                .await
                .expect("channel event should arrive")?;
            match event {
                ChannelEvent::Data(bytes) => {
                    let envelope: P2PMessage = JsonCodec.decode(&bytes).unwrap();
                    match envelope.into_message() {
                        Message::Ping | Message::Pong => {}
                        message => return Some(message),
                    }
                }
                ChannelEvent::Close => return None,
                _ => {}
            }
        }
    }
}

#[tokio::test]
async fn test_guest_join_receives_init_sync() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut host_events = host.events();

    let guest = guest_on(&network, "p2", "Bo").await.unwrap();
    let replica = wait_room(&mut guest.subscribe(), |room| room.players.len() == 2).await;

    assert_eq!(replica.id, code());
    assert_eq!(replica.host.id, PlayerId::new("host"));
    assert_eq!(replica.master.id, PlayerId::new("host"));
    assert!(replica.is_active(&PlayerId::new("p2")));

    let canonical = host.room().unwrap();
    assert_eq!(*canonical, *replica);
    assert_eq!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerJoined(Player::with_id("p2", "Bo"))
    );
    assert_eq!(host.id(), "ABC123");
    assert_eq!(guest.id(), "ABC123-p2");
    assert!(host.is_host());
    assert!(!guest.is_host());
}

#[tokio::test]
async fn test_join_broadcasts_state_to_other_guests() {
    let network = MemoryNetwork::new();
    let (_host, first) = joined_pair(&network).await;

    let second = guest_on(&network, "p3", "Cy").await.unwrap();
    wait_room(&mut second.subscribe(), |room| room.players.len() == 3).await;
    let seen_by_first = wait_room(&mut first.subscribe(), |room| room.players.len() == 3).await;
    assert_eq!(seen_by_first.active_players.len(), 3);
}

#[tokio::test]
async fn test_guest_roll_request_applied_by_host() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;

    guest
        .send_to_host(Message::RollRequest {
            player_id: PlayerId::new("p2"),
            dice_type: DiceType::D20,
        })
        .unwrap();
    assert!(guest.room().unwrap().rolls.is_empty());

    let replica = wait_room(&mut guest.subscribe(), |room| room.rolls.len() == 1).await;
    let roll = &replica.rolls[0];
    assert_eq!(roll.player_id, PlayerId::new("p2"));
    assert_eq!(roll.player_name, "Bo");
    assert_eq!(roll.dice_type, DiceType::D20);
    assert!((1..=20).contains(&roll.result));
    assert!(!roll.is_cheat());
    assert_eq!(*host.room().unwrap(), *replica);
}

#[tokio::test]
async fn test_guest_chat_request_applied_by_host() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;

    guest
        .send_to_host(Message::MessageRequest {
            player_id: PlayerId::new("p2"),
            content: "  hello  ".into(),
        })
        .unwrap();

    let replica = wait_room(&mut guest.subscribe(), |room| room.messages.len() == 1).await;
    assert_eq!(replica.messages[0].content, "hello");
    assert_eq!(replica.messages[0].player_name, "Bo");
    assert_eq!(host.room().unwrap().messages.len(), 1);
}

#[tokio::test]
async fn test_host_actions_reach_guests() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let mut replica = guest.subscribe();

    let roll = host.host_roll(DiceType::D6).await.unwrap();
    assert!((1..=6).contains(&roll.result));
    let cheat = host.host_cheat_roll(DiceType::D6, 99).await.unwrap();
    assert_eq!(cheat.result, 6);
    assert!(cheat.is_cheat());
    host.host_chat("welcome").await.unwrap();

    let room = wait_room(&mut replica, |room| room.rolls.len() == 2 && room.messages.len() == 1).await;
    assert_eq!(room.rolls[0].id, cheat.id);
    assert_eq!(room.rolls[1].id, roll.id);
    assert_eq!(room.messages[0].content, "welcome");
}

#[tokio::test]
async fn test_host_rejects_invalid_local_actions() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();

    let err = host.host_chat("   ").await.unwrap_err();
    assert!(matches!(err, PeerError::Room(RoomError::EmptyMessage)));
    assert!(host.room().unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_close_room_marks_replica_closed() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;

    host.close_room().await.unwrap();
    wait_room(&mut guest.subscribe(), |room| room.status == RoomStatus::Closed).await;

    let err = host.host_roll(DiceType::D4).await.unwrap_err();
    assert!(matches!(err, PeerError::Room(RoomError::RoomClosed)));
}

#[tokio::test]
async fn test_ice_failure_removes_active_player() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let mut host_events = host.events();
    let mut guest_events = guest.events();

    let host_name = host_endpoint_name(&code());
    let guest_name = guest_endpoint_name(&code(), &PlayerId::new("p2"));
    assert!(network.set_ice_state(&host_name, &guest_name, IceState::Failed));

    assert_eq!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerLeft {
            player_id: PlayerId::new("p2"),
            reason: LinkLoss::Ice(IceState::Failed),
        }
    );
    let room = host.room().unwrap();
    assert!(!room.is_active(&PlayerId::new("p2")));
    assert!(room.player(&PlayerId::new("p2")).is_some());

    // The host closes its end, so the guest loses its host too.
    assert!(matches!(
        next_peer_event(&mut guest_events).await,
        PeerEvent::HostDisconnected(_)
    ));
}

#[tokio::test]
async fn test_left_player_can_rejoin_without_duplicate() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    drop(guest);
    wait_room(&mut host.subscribe(), |room| room.active_players.len() == 1).await;

    let again = guest_on(&network, "p2", "Bo").await.unwrap();
    let replica = wait_room(&mut again.subscribe(), |room| room.active_players.len() == 2).await;
    assert_eq!(replica.players.len(), 2);
}

#[tokio::test]
async fn test_host_loss_closes_replica() {
    let network = MemoryNetwork::new();
    let (mut host, guest) = joined_pair(&network).await;
    let mut guest_events = guest.events();

    host.disconnect();

    assert_eq!(
        next_peer_event(&mut guest_events).await,
        PeerEvent::HostDisconnected(LinkLoss::Closed)
    );
    let replica = wait_room(&mut guest.subscribe(), |room| room.status == RoomStatus::Closed).await;
    assert_eq!(replica.players.len(), 2);
    assert!(matches!(
        guest.send_to_host(Message::Ping),
        Err(PeerError::NoHost)
    ));
    assert_eq!(host.room(), None);
}

#[tokio::test]
async fn test_duplicate_state_update_leaves_replica_unchanged() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let replica = guest.subscribe();

    let room = host.room().unwrap();
    for _ in 0..2 {
        host.broadcast(Message::StateUpdate {
            room: (*room).clone(),
        })
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!replica.has_changed().unwrap());
    assert_eq!(*guest.room().unwrap(), *room);
}

#[tokio::test]
async fn test_role_checks() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;

    assert!(matches!(
        host.send_to_host(Message::Ping),
        Err(PeerError::NoHost)
    ));
    assert!(matches!(
        guest.broadcast(Message::Ping).await,
        Err(PeerError::NotHosting)
    ));
    assert!(matches!(
        guest.host_roll(DiceType::D6).await,
        Err(PeerError::NotHosting)
    ));
}

#[tokio::test]
async fn test_disconnect_suppresses_leave_events() {
    let network = MemoryNetwork::new();
    let (mut host, _guest) = joined_pair(&network).await;
    let mut host_events = host.events();

    host.disconnect();
    host.disconnect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        host_events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert_eq!(host.room(), None);
    assert!(!host.is_connected());
}

#[tokio::test]
async fn test_disconnect_releases_room_code() {
    let network = MemoryNetwork::new();
    let mut host = host_on(&network, config()).await.unwrap();
    host.disconnect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!network.is_registered(&host_endpoint_name(&code())));
    host_on(&network, config()).await.unwrap();
}

#[tokio::test]
async fn test_room_code_taken() {
    let network = MemoryNetwork::new();
    let _first = host_on(&network, config()).await.unwrap();

    let err = host_on(&network, config()).await.unwrap_err();
    assert!(matches!(
        err,
        PeerError::Transport(TransportError::Signaling(_))
    ));
    assert!(err.is_setup_failure());
}

#[tokio::test]
async fn test_invalid_host_name_rejected() {
    let network = MemoryNetwork::new();
    let err = create_peer(
        Arc::new(network.clone()),
        config(),
        code(),
        Player::with_id("host", "   "),
        Arc::new(StandardRules::default()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PeerError::Room(RoomError::InvalidName(_))));
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout() {
    let network = MemoryNetwork::new();
    network.stall_open(true);

    let err = host_on(&network, config()).await.unwrap_err();
    assert!(matches!(err, PeerError::OpenTimeout { .. }));
    assert!(err.remediation().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_join_without_host_times_out() {
    let network = MemoryNetwork::new();

    let err = guest_on(&network, "p2", "Bo").await.unwrap_err();
    match err {
        PeerError::HandshakeTimeout { target, timeout } => {
            assert_eq!(target, "roll-the-will-ABC123");
            assert_eq!(timeout, Duration::from_secs(10));
        }
        other => panic!("expected handshake timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signaling_drop_reconnects() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let mut status = host.status_watch();
    assert_eq!(host.status(), ConnectionStatus::Connected);

    let host_name = host_endpoint_name(&code());
    assert!(network.drop_signaling(&host_name));
    tokio::time::timeout(
        Duration::from_secs(1),
        status.wait_for(|s| *s == ConnectionStatus::Connected && network.is_registered(&host_name)),
    )
    .await
    .unwrap()
    .unwrap();

    // Data channels survive a signaling drop.
    guest
        .send_to_host(Message::MessageRequest {
            player_id: PlayerId::new("p2"),
            content: "still here".into(),
        })
        .unwrap();
    wait_room(&mut host.subscribe(), |room| room.messages.len() == 1).await;
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let network = MemoryNetwork::new();
    let _host = host_on(&network, config()).await.unwrap();
    let mut raw = RawGuest::connect(&network, "p9").await;

    raw.channel.send(b"{not json".to_vec()).unwrap();
    raw.channel
        .send(br#"{"type":"DANCE","timestamp":1}"#.to_vec())
        .unwrap();
    raw.send(Message::Join {
        player: Player::with_id("p9", "Di"),
    });

    match raw.recv().await {
        Some(Message::InitSync { room }) => assert_eq!(room.players.len(), 2),
        other => panic!("expected INIT_SYNC, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_for_another_player_is_dropped() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut raw = RawGuest::connect(&network, "p9").await;
    raw.send(Message::Join {
        player: Player::with_id("p9", "Di"),
    });
    assert!(matches!(raw.recv().await, Some(Message::InitSync { .. })));

    raw.send(Message::RollRequest {
        player_id: PlayerId::new("host"),
        dice_type: DiceType::D100,
    });
    raw.send(Message::MessageRequest {
        player_id: PlayerId::new("p9"),
        content: "hi".into(),
    });

    match raw.recv().await {
        Some(Message::StateUpdate { room }) => {
            assert!(room.rolls.is_empty());
            assert_eq!(room.messages.len(), 1);
        }
        other => panic!("expected STATE_UPDATE, got {other:?}"),
    }
    assert!(host.room().unwrap().rolls.is_empty());
}

#[tokio::test]
async fn test_foreign_endpoint_is_refused() {
    let network = MemoryNetwork::new();
    let _host = host_on(&network, config()).await.unwrap();

    let mut raw = RawGuest::connect_as(&network, "somebody-else").await;
    assert_eq!(raw.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_silent_guest_times_out() {
    let network = MemoryNetwork::new();
    let host_config = PeerConfig {
        heartbeat_interval: Duration::from_secs(1),
        heartbeat_timeout: Duration::from_secs(3),
        ..PeerConfig::default()
    };
    let host = host_on(&network, host_config).await.unwrap();
    let mut host_events = host.events();

    let raw = RawGuest::connect(&network, "p9").await;
    raw.send(Message::Join {
        player: Player::with_id("p9", "Di"),
    });
    assert!(matches!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerJoined(_)
    ));

    // The raw guest never answers PING.
    assert_eq!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerLeft {
            player_id: PlayerId::new("p9"),
            reason: LinkLoss::Timeout,
        }
    );
    assert!(!host.room().unwrap().is_active(&PlayerId::new("p9")));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_keeps_live_peers_connected() {
    let network = MemoryNetwork::new();
    let heartbeat = PeerConfig {
        heartbeat_interval: Duration::from_secs(1),
        heartbeat_timeout: Duration::from_secs(3),
        ..PeerConfig::default()
    };
    let host = host_on(&network, heartbeat.clone()).await.unwrap();
    let guest = join_peer(
        Arc::new(network.clone()),
        heartbeat,
        Player::with_id("p2", "Bo"),
        code(),
    )
    .await
    .unwrap();
    wait_room(&mut guest.subscribe(), |room| room.players.len() == 2).await;

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(host.room().unwrap().is_active(&PlayerId::new("p2")));
    assert_eq!(guest.room().unwrap().status, RoomStatus::Open);
}

#[tokio::test]
async fn test_join_with_invalid_name_is_rejected() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut host_events = host.events();

    let mut long = RawGuest::connect(&network, "p9").await;
    long.send(Message::Join {
        player: Player::with_id("p9", "x".repeat(500)),
    });
    match long.recv().await {
        Some(Message::InitSync { room }) => assert_eq!(room.players.len(), 1),
        other => panic!("expected INIT_SYNC, got {other:?}"),
    }

    let mut blank = RawGuest::connect(&network, "p8").await;
    blank.send(Message::Join {
        player: Player::with_id("p8", "   "),
    });
    match blank.recv().await {
        Some(Message::InitSync { room }) => assert!(room.player(&PlayerId::new("p8")).is_none()),
        other => panic!("expected INIT_SYNC, got {other:?}"),
    }

    let mut padded = RawGuest::connect(&network, "p7").await;
    padded.send(Message::Join {
        player: Player::with_id("p7", "  Di  "),
    });
    assert!(matches!(padded.recv().await, Some(Message::InitSync { .. })));
    assert_eq!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerJoined(Player::with_id("p7", "Di"))
    );

    let room = host.room().unwrap();
    assert_eq!(room.players.len(), 2);
    assert_eq!(room.player(&PlayerId::new("p7")).unwrap().name, "Di");
}

#[tokio::test]
async fn test_endpoint_with_host_id_is_refused() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut host_events = host.events();

    let mut impostor = RawGuest::connect(&network, "host").await;
    assert_eq!(impostor.recv().await, None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(host.room().unwrap().is_active(&PlayerId::new("host")));
    assert!(matches!(
        host_events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_channel_error_removes_active_player() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let mut host_events = host.events();
    let mut guest_events = guest.events();

    let host_name = host_endpoint_name(&code());
    let guest_name = guest_endpoint_name(&code(), &PlayerId::new("p2"));
    assert!(network.fail_link(&host_name, &guest_name, "sctp abort"));

    assert_eq!(
        next_peer_event(&mut host_events).await,
        PeerEvent::PlayerLeft {
            player_id: PlayerId::new("p2"),
            reason: LinkLoss::Error("sctp abort".into()),
        }
    );
    let room = host.room().unwrap();
    assert!(!room.is_active(&PlayerId::new("p2")));
    assert!(room.player(&PlayerId::new("p2")).is_some());
    assert!(matches!(
        next_peer_event(&mut guest_events).await,
        PeerEvent::HostDisconnected(_)
    ));
}

#[tokio::test]
async fn test_guest_ice_failure_fires_host_disconnect() {
    let network = MemoryNetwork::new();
    let (host, guest) = joined_pair(&network).await;
    let mut guest_events = guest.events();

    let host_name = host_endpoint_name(&code());
    let guest_name = guest_endpoint_name(&code(), &PlayerId::new("p2"));
    assert!(network.set_ice_state(&guest_name, &host_name, IceState::Disconnected));

    assert_eq!(
        next_peer_event(&mut guest_events).await,
        PeerEvent::HostDisconnected(LinkLoss::Ice(IceState::Disconnected))
    );
    let replica = wait_room(&mut guest.subscribe(), |room| room.status == RoomStatus::Closed).await;
    assert_eq!(replica.players.len(), 2);
    // The guest closed its end, which the host sees as a leave.
    wait_room(&mut host.subscribe(), |room| room.active_players.len() == 1).await;
    assert!(matches!(
        guest.send_to_host(Message::Ping),
        Err(PeerError::NoHost)
    ));
}

#[tokio::test]
async fn test_lost_channel_before_join_is_silent() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut host_events = host.events();
    let replica = host.subscribe();

    let raw = RawGuest::connect(&network, "p9").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    raw.channel.close();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!replica.has_changed().unwrap());
    assert!(matches!(
        host_events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_connect_error_before_open() {
    let network = MemoryNetwork::new();
    network.stall_open(true);
    let endpoint = network.register(&guest_endpoint_name(&code(), &PlayerId::new("p2")));

    let err = PlayerPool::new(config())
        .connect(&endpoint.handle(), &host_endpoint_name(&code()))
        .await
        .unwrap_err();
    match err {
        PeerError::Channel(message) => assert!(message.contains("not registered")),
        other => panic!("expected channel error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_closed_before_open() {
    let network = MemoryNetwork::new();
    let mut endpoint = network.register(&guest_endpoint_name(&code(), &PlayerId::new("p2")));
    assert!(matches!(endpoint.recv().await, Some(EndpointEvent::Open)));
    let handle = endpoint.handle();
    let destroyer = handle.clone();

    // Nobody hosts the room, so the channel is still pending when the
    // endpoint goes away.
    let pool = PlayerPool::new(config());
    let host_name = host_endpoint_name(&code());
    let (result, ()) = tokio::join!(pool.connect(&handle, &host_name), async move {
        destroyer.destroy();
    });

    assert!(matches!(result, Err(PeerError::ClosedByHost)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_is_retried() {
    let network = MemoryNetwork::new();
    let host = host_on(&network, config()).await.unwrap();
    let mut status = host.status_watch();
    let host_name = host_endpoint_name(&code());

    network.stall_open(true);
    assert!(network.drop_signaling(&host_name));
    assert!(network.fail_endpoint(&host_name, "relay unreachable"));
    status
        .wait_for(|s| *s == ConnectionStatus::Error)
        .await
        .unwrap();

    // The first reconnect went nowhere; only the retry can bring it back.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.status(), ConnectionStatus::Error);
    assert!(!network.is_registered(&host_name));

    network.stall_open(false);
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(network.is_registered(&host_name));
}
