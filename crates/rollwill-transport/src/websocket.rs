//! [`Signaling`] backend that registers endpoints with a [`RelayServer`].
//!
//! [`RelayServer`]: crate::RelayServer

use std::collections::HashMap;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::channel::{ChannelEvent, DataChannel};
use crate::endpoint::{Endpoint, EndpointCommand, EndpointEvent, Signaling};
use crate::relay::{ClientFrame, RelayFrame};
use crate::ChannelId;

/// Registers endpoints with a WebSocket relay at `url`.
///
/// Every endpoint opens its own socket. If the socket drops, the endpoint
/// closes its channels, reports [`EndpointEvent::Disconnected`] and waits
/// for [`reconnect`](crate::EndpointHandle::reconnect), which dials the
/// relay again and re-registers the same name.
#[derive(Debug, Clone)]
pub struct WebSocketSignaling {
    url: String,
}

impl WebSocketSignaling {
    /// Creates a backend for the relay at `url` (e.g. `ws://127.0.0.1:9000`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the relay URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Signaling for WebSocketSignaling {
    fn register(&self, name: &str) -> Endpoint {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            url: self.url.clone(),
            name: name.to_owned(),
            commands_tx: commands_tx.clone(),
            events: events_tx,
            channels: HashMap::new(),
        };
        tokio::spawn(driver.run(commands_rx));
        Endpoint::new(name, commands_tx, events_rx)
    }
}

enum SessionEnd {
    /// The endpoint was destroyed or every handle dropped.
    Destroyed,
    /// The relay socket dropped after it was up.
    Lost,
    /// The relay could not be reached.
    Failed,
}

struct Driver {
    url: String,
    name: String,
    commands_tx: mpsc::UnboundedSender<EndpointCommand>,
    events: mpsc::UnboundedSender<EndpointEvent>,
    channels: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EndpointCommand>) {
        loop {
            match self.session(&mut commands).await {
                SessionEnd::Destroyed => break,
                SessionEnd::Lost => {
                    self.close_all();
                    tracing::info!(endpoint = %self.name, "relay connection lost");
                    let _ = self.events.send(EndpointEvent::Disconnected);
                }
                SessionEnd::Failed => self.close_all(),
            }
            if !self.wait_for_reconnect(&mut commands).await {
                break;
            }
        }
        self.close_all();
        let _ = self.events.send(EndpointEvent::Closed);
        tracing::debug!(endpoint = %self.name, "endpoint destroyed");
    }

    fn close_all(&mut self) {
        for (_, events) in self.channels.drain() {
            let _ = events.send(ChannelEvent::Close);
        }
    }

    /// Waits offline. Returns `true` on reconnect, `false` on destroy.
    async fn wait_for_reconnect(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<EndpointCommand>,
    ) -> bool {
        loop {
            match commands.recv().await {
                None | Some(EndpointCommand::Destroy) => return false,
                Some(EndpointCommand::Reconnect) => return true,
                Some(EndpointCommand::Connect { events, .. }) => {
                    let _ = events.send(ChannelEvent::Error("signaling offline".into()));
                    let _ = events.send(ChannelEvent::Close);
                }
                Some(_) => {}
            }
        }
    }

    async fn session(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<EndpointCommand>,
    ) -> SessionEnd {
        let ws = match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::warn!(endpoint = %self.name, url = %self.url, error = %e, "relay unreachable");
                let _ = self
                    .events
                    .send(EndpointEvent::Error(format!("relay unreachable: {e}")));
                return SessionEnd::Failed;
            }
        };
        let (mut sink, mut stream) = ws.split();

        let register = ClientFrame::Register {
            name: self.name.clone(),
        };
        if !send_frame(&mut sink, &register).await {
            return SessionEnd::Lost;
        }

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        let _ = sink.close().await;
                        return SessionEnd::Destroyed;
                    };
                    let frame = match command {
                        EndpointCommand::Destroy => {
                            let _ = sink.close().await;
                            return SessionEnd::Destroyed;
                        }
                        EndpointCommand::Reconnect => None,
                        EndpointCommand::Connect { target, channel, events } => {
                            self.channels.insert(channel.into_inner(), events);
                            Some(ClientFrame::Connect { channel: channel.into_inner(), target })
                        }
                        EndpointCommand::Send { channel, data } => self
                            .channels
                            .contains_key(&channel.into_inner())
                            .then(|| ClientFrame::Data { channel: channel.into_inner(), data }),
                        EndpointCommand::CloseChannel { channel } => {
                            self.channels.remove(&channel.into_inner()).map(|events| {
                                let _ = events.send(ChannelEvent::Close);
                                ClientFrame::Close { channel: channel.into_inner() }
                            })
                        }
                    };
                    if let Some(frame) = frame {
                        if !send_frame(&mut sink, &frame).await {
                            return SessionEnd::Lost;
                        }
                    }
                }
                message = stream.next() => {
                    let parsed = match message {
                        Some(Ok(Message::Text(text))) => serde_json::from_str::<RelayFrame>(text.as_str()),
                        Some(Ok(Message::Binary(bytes))) => serde_json::from_slice::<RelayFrame>(&bytes),
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            tracing::debug!(endpoint = %self.name, error = %e, "relay read failed");
                            return SessionEnd::Lost;
                        }
                    };
                    match parsed {
                        Ok(frame) => self.on_frame(frame),
                        Err(e) => tracing::warn!(endpoint = %self.name, error = %e, "malformed relay frame dropped"),
                    }
                }
            }
        }
    }

    fn on_frame(&mut self, frame: RelayFrame) {
        match frame {
            RelayFrame::Open { .. } => {
                let _ = self.events.send(EndpointEvent::Open);
            }
            RelayFrame::Error { message } => {
                let _ = self.events.send(EndpointEvent::Error(message));
            }
            RelayFrame::Incoming { channel, from } => {
                let (data_channel, events) =
                    DataChannel::new(ChannelId::new(channel), from, self.commands_tx.clone());
                let _ = events.send(ChannelEvent::Open);
                self.channels.insert(channel, events);
                let _ = self.events.send(EndpointEvent::Connection(data_channel));
            }
            RelayFrame::ChannelOpen { channel } => {
                if let Some(events) = self.channels.get(&channel) {
                    let _ = events.send(ChannelEvent::Open);
                }
            }
            RelayFrame::Data { channel, data } => {
                if let Some(events) = self.channels.get(&channel) {
                    let _ = events.send(ChannelEvent::Data(data));
                }
            }
            RelayFrame::ChannelClosed { channel } => {
                if let Some(events) = self.channels.remove(&channel) {
                    let _ = events.send(ChannelEvent::Close);
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame) -> bool
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode relay frame");
            return true;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}
