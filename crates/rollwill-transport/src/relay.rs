//! WebSocket rendezvous relay.
//!
//! Each endpoint holds one WebSocket to the relay. The relay maps names to
//! sockets and forwards channel traffic between them; it never looks inside
//! the data it forwards.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::TransportError;

/// Bit set on channel ids the relay allocates for the accepting side, so
/// they never collide with ids the client picked for its own connects.
pub(crate) const RELAY_CHANNEL_BIT: u64 = 1 << 63;

/// Frames a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ClientFrame {
    Register { name: String },
    Connect { channel: u64, target: String },
    Data { channel: u64, data: Vec<u8> },
    Close { channel: u64 },
}

/// Frames the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum RelayFrame {
    Open { name: String },
    Error { message: String },
    Incoming { channel: u64, from: String },
    ChannelOpen { channel: u64 },
    Data { channel: u64, data: Vec<u8> },
    ChannelClosed { channel: u64 },
}

type ClientId = u64;

struct Client {
    name: Option<String>,
    outbound: mpsc::UnboundedSender<RelayFrame>,
}

#[derive(Default)]
struct RelayState {
    names: HashMap<String, ClientId>,
    clients: HashMap<ClientId, Client>,
    routes: HashMap<(ClientId, u64), (ClientId, u64)>,
    next_client: ClientId,
    next_channel: u64,
}

impl RelayState {
    fn add_client(&mut self, outbound: mpsc::UnboundedSender<RelayFrame>) -> ClientId {
        self.next_client += 1;
        let id = self.next_client;
        self.clients.insert(id, Client { name: None, outbound });
        id
    }

    fn send_to(&self, client: ClientId, frame: RelayFrame) {
        if let Some(c) = self.clients.get(&client) {
            let _ = c.outbound.send(frame);
        }
    }

    fn handle(&mut self, client: ClientId, frame: ClientFrame) {
        match frame {
            ClientFrame::Register { name } => self.register(client, name),
            ClientFrame::Connect { channel, target } => self.connect(client, channel, target),
            ClientFrame::Data { channel, data } => {
                if let Some(&(peer, peer_channel)) = self.routes.get(&(client, channel)) {
                    self.send_to(
                        peer,
                        RelayFrame::Data {
                            channel: peer_channel,
                            data,
                        },
                    );
                }
            }
            ClientFrame::Close { channel } => {
                if let Some((peer, peer_channel)) = self.routes.remove(&(client, channel)) {
                    self.routes.remove(&(peer, peer_channel));
                    self.send_to(
                        peer,
                        RelayFrame::ChannelClosed {
                            channel: peer_channel,
                        },
                    );
                }
            }
        }
    }

    fn register(&mut self, client: ClientId, name: String) {
        let holder = self.names.get(&name).copied();
        if holder.is_some_and(|holder| holder != client) {
            tracing::debug!(endpoint = %name, "relay name already taken");
            self.send_to(
                client,
                RelayFrame::Error {
                    message: format!("name {name} is already taken"),
                },
            );
            return;
        }
        let Some(entry) = self.clients.get_mut(&client) else {
            return;
        };
        if let Some(old) = entry.name.replace(name.clone()) {
            if old != name {
                self.names.remove(&old);
            }
        }
        self.names.insert(name.clone(), client);
        tracing::info!(endpoint = %name, "relay endpoint registered");
        self.send_to(client, RelayFrame::Open { name });
    }

    fn connect(&mut self, client: ClientId, channel: u64, target: String) {
        let from = match self.clients.get(&client).and_then(|c| c.name.clone()) {
            Some(from) => from,
            None => {
                self.send_to(client, RelayFrame::ChannelClosed { channel });
                return;
            }
        };
        let Some(&peer) = self.names.get(&target) else {
            tracing::debug!(%from, %target, "relay connect to unknown name left pending");
            return;
        };

        self.next_channel += 1;
        let peer_channel = self.next_channel | RELAY_CHANNEL_BIT;
        self.routes.insert((client, channel), (peer, peer_channel));
        self.routes.insert((peer, peer_channel), (client, channel));

        self.send_to(
            peer,
            RelayFrame::Incoming {
                channel: peer_channel,
                from,
            },
        );
        self.send_to(client, RelayFrame::ChannelOpen { channel });
    }

    fn remove_client(&mut self, client: ClientId) {
        if let Some(entry) = self.clients.remove(&client) {
            if let Some(name) = entry.name {
                if self.names.get(&name) == Some(&client) {
                    self.names.remove(&name);
                }
                tracing::info!(endpoint = %name, "relay endpoint left");
            }
        }

        let owned: Vec<(ClientId, u64)> = self
            .routes
            .keys()
            .filter(|(owner, _)| *owner == client)
            .copied()
            .collect();
        for key in owned {
            if let Some((peer, peer_channel)) = self.routes.remove(&key) {
                self.routes.remove(&(peer, peer_channel));
                self.send_to(
                    peer,
                    RelayFrame::ChannelClosed {
                        channel: peer_channel,
                    },
                );
            }
        }
    }
}

/// A WebSocket relay that lets [`WebSocketSignaling`](crate::WebSocketSignaling)
/// endpoints find each other and exchange channel traffic.
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<Mutex<RelayState>>,
}

impl RelayServer {
    /// Binds the relay to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "relay listening");
        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(RelayState::default())),
        })
    }

    /// Returns the address the relay is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::BindFailed)
    }

    /// Accepts clients until the task is dropped. Accept failures are
    /// logged and do not stop the loop.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(serve_client(state, stream, addr));
                }
                Err(e) => {
                    tracing::error!(error = %e, "relay accept failed");
                }
            }
        }
    }
}

async fn serve_client(state: Arc<Mutex<RelayState>>, stream: TcpStream, addr: SocketAddr) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(%addr, error = %e, "relay handshake failed");
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<RelayFrame>();
    let client = state.lock().add_client(outbound_tx);
    tracing::debug!(%addr, client, "relay client connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode relay frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        let parsed = match message {
            Ok(Message::Text(text)) => serde_json::from_str::<ClientFrame>(text.as_str()),
            Ok(Message::Binary(bytes)) => serde_json::from_slice::<ClientFrame>(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(client, error = %e, "relay client read failed");
                break;
            }
        };
        match parsed {
            Ok(frame) => state.lock().handle(client, frame),
            Err(e) => tracing::warn!(client, error = %e, "malformed relay frame dropped"),
        }
    }

    state.lock().remove_client(client);
    writer.abort();
    tracing::debug!(%addr, client, "relay client disconnected");
}
