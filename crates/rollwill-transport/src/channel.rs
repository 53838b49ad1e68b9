//! Data channels: a reliable, ordered message pipe between two endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::endpoint::EndpointCommand;
use crate::{ChannelId, IceState, TransportError};

/// Something that happened on a data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel finished its handshake and can carry data.
    Open,
    /// One message from the remote side.
    Data(Vec<u8>),
    /// The underlying ICE connection changed state.
    IceStateChanged(IceState),
    /// The channel failed.
    Error(String),
    /// The channel was closed by either side.
    Close,
}

/// Cloneable write half of a [`DataChannel`].
///
/// Writes are queued to the owning endpoint's driver; they never block.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    id: ChannelId,
    commands: mpsc::UnboundedSender<EndpointCommand>,
    open: Arc<AtomicBool>,
}

impl ChannelSender {
    /// Returns the channel this sender writes to.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns `true` if the channel's reader has seen it open and not yet
    /// seen it close.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queues one message for the remote side.
    ///
    /// # Errors
    /// [`TransportError::ChannelNotOpen`] if the channel is not open, or
    /// [`TransportError::ConnectionClosed`] if the endpoint driver is gone.
    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelNotOpen(self.id));
        }
        self.commands
            .send(EndpointCommand::Send {
                channel: self.id,
                data,
            })
            .map_err(|_| {
                TransportError::ConnectionClosed(format!(
                    "endpoint driver for {} stopped",
                    self.id
                ))
            })
    }

    /// Closes the channel. Both sides receive [`ChannelEvent::Close`].
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self
            .commands
            .send(EndpointCommand::CloseChannel { channel: self.id });
    }
}

/// One data channel to a remote endpoint.
///
/// The owner reads events with [`recv`](Self::recv) and writes through
/// [`sender`](Self::sender) clones.
#[derive(Debug)]
pub struct DataChannel {
    peer: String,
    sender: ChannelSender,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl DataChannel {
    /// Builds a channel whose writes go to `commands`. Returns the channel
    /// and the sender the driver uses to deliver its events.
    pub(crate) fn new(
        id: ChannelId,
        peer: impl Into<String>,
        commands: mpsc::UnboundedSender<EndpointCommand>,
    ) -> (Self, mpsc::UnboundedSender<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Self {
            peer: peer.into(),
            sender: ChannelSender {
                id,
                commands,
                open: Arc::new(AtomicBool::new(false)),
            },
            events: events_rx,
        };
        (channel, events_tx)
    }

    /// Returns the channel's ID.
    pub fn id(&self) -> ChannelId {
        self.sender.id
    }

    /// Returns the rendezvous name of the remote endpoint.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Returns a write handle for this channel.
    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Returns `true` if the channel is open (see [`ChannelSender::is_open`]).
    pub fn is_open(&self) -> bool {
        self.sender.is_open()
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the driver has dropped the channel; callers
    /// should treat that as a close.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        let event = self.events.recv().await;
        let open = &self.sender.open;
        match &event {
            Some(ChannelEvent::Open) => open.store(true, Ordering::Release),
            Some(ChannelEvent::Close | ChannelEvent::Error(_)) | None => {
                open.store(false, Ordering::Release)
            }
            Some(ChannelEvent::IceStateChanged(state)) if state.is_terminal() => {
                open.store(false, Ordering::Release)
            }
            Some(_) => {}
        }
        event
    }

    /// Queues one message (see [`ChannelSender::send`]).
    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.sender.send(data)
    }

    /// Closes the channel (see [`ChannelSender::close`]).
    pub fn close(&self) {
        self.sender.close();
    }
}
