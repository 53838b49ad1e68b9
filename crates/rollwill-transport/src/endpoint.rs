//! Rendezvous endpoints and the [`Signaling`] seam that creates them.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, DataChannel};
use crate::ChannelId;

/// Something that happened to an endpoint as a whole.
#[derive(Debug)]
pub enum EndpointEvent {
    /// The endpoint is registered under its name and reachable.
    Open,
    /// A remote endpoint opened a channel to this one.
    Connection(DataChannel),
    /// The signaling link dropped. Whether open data channels survive
    /// depends on the backend. Call [`EndpointHandle::reconnect`] to
    /// register the name again.
    Disconnected,
    /// The signaling side reported an error (for example, name taken).
    Error(String),
    /// The endpoint was destroyed. No further events follow.
    Closed,
}

/// Requests from handles to an endpoint's driver task.
#[derive(Debug)]
pub(crate) enum EndpointCommand {
    Connect {
        target: String,
        channel: ChannelId,
        events: mpsc::UnboundedSender<ChannelEvent>,
    },
    Send {
        channel: ChannelId,
        data: Vec<u8>,
    },
    CloseChannel {
        channel: ChannelId,
    },
    Reconnect,
    Destroy,
}

/// Cloneable control handle for an endpoint.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<EndpointCommand>,
}

impl EndpointHandle {
    /// Returns the rendezvous name the endpoint registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a reliable data channel to the endpoint registered as
    /// `target`.
    ///
    /// The channel is returned immediately; its first event is
    /// [`ChannelEvent::Open`] once the remote side accepts. Connecting to
    /// a name nobody holds stays pending forever, so callers apply their
    /// own handshake timeout.
    pub fn connect(&self, target: &str) -> DataChannel {
        let id = ChannelId::next();
        let (channel, events) = DataChannel::new(id, target, self.commands.clone());
        let command = EndpointCommand::Connect {
            target: target.to_owned(),
            channel: id,
            events: events.clone(),
        };
        if self.commands.send(command).is_err() {
            let _ = events.send(ChannelEvent::Error(format!(
                "endpoint {} is gone",
                self.name
            )));
            let _ = events.send(ChannelEvent::Close);
        }
        channel
    }

    /// Asks the driver to register the name again after
    /// [`EndpointEvent::Disconnected`].
    pub fn reconnect(&self) {
        let _ = self.commands.send(EndpointCommand::Reconnect);
    }

    /// Destroys the endpoint: all channels close, the name is released and
    /// [`EndpointEvent::Closed`] is delivered.
    pub fn destroy(&self) {
        let _ = self.commands.send(EndpointCommand::Destroy);
    }

    /// Returns `true` while the driver task is still running.
    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// A registered endpoint: its control handle plus its event queue.
#[derive(Debug)]
pub struct Endpoint {
    handle: EndpointHandle,
    events: mpsc::UnboundedReceiver<EndpointEvent>,
}

impl Endpoint {
    pub(crate) fn new(
        name: &str,
        commands: mpsc::UnboundedSender<EndpointCommand>,
        events: mpsc::UnboundedReceiver<EndpointEvent>,
    ) -> Self {
        Self {
            handle: EndpointHandle {
                name: Arc::from(name),
                commands,
            },
            events,
        }
    }

    /// Returns the endpoint's rendezvous name.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Returns a control handle.
    pub fn handle(&self) -> EndpointHandle {
        self.handle.clone()
    }

    /// Waits for the next endpoint event.
    ///
    /// Returns `None` once the driver has stopped.
    pub async fn recv(&mut self) -> Option<EndpointEvent> {
        self.events.recv().await
    }

    /// Splits the endpoint into its handle and event queue.
    pub fn into_parts(self) -> (EndpointHandle, mpsc::UnboundedReceiver<EndpointEvent>) {
        (self.handle, self.events)
    }
}

/// Creates endpoints registered under rendezvous names.
///
/// Implementations spawn a driver task per endpoint, so `register` must be
/// called from within a tokio runtime. Registration is asynchronous: the
/// endpoint reports [`EndpointEvent::Open`] or [`EndpointEvent::Error`]
/// on its event queue.
pub trait Signaling: Send + Sync + 'static {
    /// Starts registering an endpoint under `name`.
    fn register(&self, name: &str) -> Endpoint;
}

impl<S: Signaling + ?Sized> Signaling for Arc<S> {
    fn register(&self, name: &str) -> Endpoint {
        (**self).register(name)
    }
}
