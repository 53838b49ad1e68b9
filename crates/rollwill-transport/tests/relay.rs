//! Integration tests for the WebSocket relay.
//!
//! These tests bind a real relay on an OS-assigned port and register
//! endpoints through `WebSocketSignaling`, so frames actually cross the
//! loopback interface.

#[cfg(feature = "websocket")]
mod relay {
    use std::time::Duration;

    use rollwill_transport::{
        ChannelEvent, DataChannel, Endpoint, EndpointEvent, RelayServer, Signaling,
        WebSocketSignaling,
    };

    async fn start_relay() -> WebSocketSignaling {
        let relay = RelayServer::bind("127.0.0.1:0").await.expect("should bind");
        let addr = relay.local_addr().expect("should have an address");
        tokio::spawn(relay.run());
        WebSocketSignaling::new(format!("ws://{addr}"))
    }

    async fn next_event(endpoint: &mut Endpoint) -> EndpointEvent {
        tokio::time::timeout(Duration::from_secs(5), endpoint.recv())
            .await
            .expect("endpoint event should arrive")
            .expect("endpoint driver should be running")
    }

    async fn next_channel_event(channel: &mut DataChannel) -> Option<ChannelEvent> {
        tokio::time::timeout(Duration::from_secs(5), channel.recv())
            .await
            .expect("channel event should arrive")
    }

    async fn open(signaling: &WebSocketSignaling, name: &str) -> Endpoint {
        let mut endpoint = signaling.register(name);
        match next_event(&mut endpoint).await {
            EndpointEvent::Open => endpoint,
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_forwards_channel_data() {
        let signaling = start_relay().await;
        let mut host = open(&signaling, "roll-the-will-ABC123").await;
        let guest = open(&signaling, "roll-the-will-ABC123-p2").await;

        let mut outbound = guest.handle().connect("roll-the-will-ABC123");
        let mut inbound = match next_event(&mut host).await {
            EndpointEvent::Connection(channel) => channel,
            other => panic!("expected connection, got {other:?}"),
        };
        assert_eq!(inbound.peer(), "roll-the-will-ABC123-p2");
        assert_eq!(next_channel_event(&mut inbound).await, Some(ChannelEvent::Open));
        assert_eq!(next_channel_event(&mut outbound).await, Some(ChannelEvent::Open));

        outbound.send(b"{\"type\":\"PING\"}".to_vec()).unwrap();
        assert_eq!(
            next_channel_event(&mut inbound).await,
            Some(ChannelEvent::Data(b"{\"type\":\"PING\"}".to_vec()))
        );

        inbound.send(vec![1, 2, 3]).unwrap();
        assert_eq!(
            next_channel_event(&mut outbound).await,
            Some(ChannelEvent::Data(vec![1, 2, 3]))
        );

        inbound.close();
        assert_eq!(next_channel_event(&mut outbound).await, Some(ChannelEvent::Close));
    }

    #[tokio::test]
    async fn test_relay_rejects_taken_name() {
        let signaling = start_relay().await;
        let _first = open(&signaling, "roll-the-will-TAKEN1").await;

        let mut second = signaling.register("roll-the-will-TAKEN1");
        assert!(matches!(next_event(&mut second).await, EndpointEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_relay_destroy_closes_remote_channel() {
        let signaling = start_relay().await;
        let mut host = open(&signaling, "host").await;
        let guest = open(&signaling, "guest").await;

        let mut outbound = guest.handle().connect("host");
        let _inbound = match next_event(&mut host).await {
            EndpointEvent::Connection(channel) => channel,
            other => panic!("expected connection, got {other:?}"),
        };
        assert_eq!(next_channel_event(&mut outbound).await, Some(ChannelEvent::Open));

        host.handle().destroy();
        assert!(matches!(next_event(&mut host).await, EndpointEvent::Closed));
        assert_eq!(next_channel_event(&mut outbound).await, Some(ChannelEvent::Close));
    }

    #[tokio::test]
    async fn test_relay_unreachable_reports_error() {
        // Bind then drop to get a port with nothing listening.
        let relay = RelayServer::bind("127.0.0.1:0").await.unwrap();
        let addr = relay.local_addr().unwrap();
        drop(relay);

        let signaling = WebSocketSignaling::new(format!("ws://{addr}"));
        let mut endpoint = signaling.register("host");
        assert!(matches!(next_event(&mut endpoint).await, EndpointEvent::Error(_)));
    }
}
