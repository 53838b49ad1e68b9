//! Transport endpoint manager ("peer pool").
//!
//! Owns one endpoint: registers it under a rendezvous name, enforces the
//! open timeout, hands inbound channels to the caller and keeps the
//! signaling link alive afterwards.

use std::sync::Arc;
use std::time::Duration;

use rollwill_transport::{
    DataChannel, EndpointEvent, EndpointHandle, Signaling, TransportError,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{ConnectionStatus, PeerConfig, PeerError};

/// An endpoint that reached "open".
#[derive(Debug)]
pub struct OpenEndpoint {
    /// Control handle for the endpoint.
    pub handle: EndpointHandle,
    /// Channels other endpoints opened to this one.
    pub incoming: mpsc::UnboundedReceiver<DataChannel>,
    /// Endpoint status, updated by the supervisor task.
    pub status: watch::Receiver<ConnectionStatus>,
    /// Task watching the endpoint after open (reconnects, errors).
    pub supervisor: JoinHandle<()>,
}

impl OpenEndpoint {
    /// Destroys the endpoint and stops its supervisor.
    pub fn shutdown(&self) {
        self.handle.destroy();
        self.supervisor.abort();
    }
}

/// Opens endpoints through a [`Signaling`] backend.
#[derive(Clone)]
pub struct PeerPool {
    signaling: Arc<dyn Signaling>,
    config: PeerConfig,
}

impl PeerPool {
    pub fn new(signaling: Arc<dyn Signaling>, config: PeerConfig) -> Self {
        Self { signaling, config }
    }

    /// Registers an endpoint under `name` and waits for it to open.
    ///
    /// Inbound channels that arrive while waiting are kept for the caller.
    /// A signaling drop while waiting triggers a reconnect and keeps
    /// waiting.
    ///
    /// # Errors
    /// - [`PeerError::OpenTimeout`] if the endpoint is not open within
    ///   [`PeerConfig::open_timeout`]. The endpoint is destroyed.
    /// - [`PeerError::Transport`] if the backend reports an error (for
    ///   example, the name is taken). The endpoint is destroyed.
    pub async fn open(&self, name: &str) -> Result<OpenEndpoint, PeerError> {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Created);
        let (handle, mut events) = self.signaling.register(name).into_parts();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        status_tx.send_replace(ConnectionStatus::Connecting);
        tracing::debug!(endpoint = name, "opening endpoint");

        let wait = async {
            loop {
                match events.recv().await {
                    Some(EndpointEvent::Open) => return Ok(()),
                    Some(EndpointEvent::Connection(channel)) => {
                        let _ = incoming_tx.send(channel);
                    }
                    Some(EndpointEvent::Disconnected) => {
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                        handle.reconnect();
                    }
                    Some(EndpointEvent::Error(message)) => {
                        return Err(PeerError::Transport(TransportError::Signaling(message)));
                    }
                    Some(EndpointEvent::Closed) | None => {
                        return Err(PeerError::Transport(TransportError::Shutdown));
                    }
                }
            }
        };

        let opened = tokio::time::timeout(self.config.open_timeout, wait).await;
        match opened {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(endpoint = name, error = %e, "endpoint failed to open");
                status_tx.send_replace(ConnectionStatus::Error);
                handle.destroy();
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(endpoint = name, timeout = ?self.config.open_timeout, "endpoint open timed out");
                status_tx.send_replace(ConnectionStatus::Error);
                handle.destroy();
                return Err(PeerError::OpenTimeout {
                    name: name.to_owned(),
                    timeout: self.config.open_timeout,
                });
            }
        }

        status_tx.send_replace(ConnectionStatus::Connected);
        tracing::info!(endpoint = name, "endpoint open");

        let backoff = Backoff {
            first: self.config.reconnect_backoff,
            max: self.config.reconnect_backoff_max,
        };
        let supervisor = tokio::spawn(supervise(
            handle.clone(),
            events,
            incoming_tx,
            status_tx,
            backoff,
        ));
        Ok(OpenEndpoint {
            handle,
            incoming: incoming_rx,
            status: status_rx,
            supervisor,
        })
    }

    /// Like [`open`](Self::open), then runs `on_open`. If `on_open` fails
    /// the endpoint is destroyed and its error returned, so a
    /// half-initialized room never stays reachable.
    pub async fn open_with<T, F>(&self, name: &str, on_open: F) -> Result<(OpenEndpoint, T), PeerError>
    where
        F: FnOnce(&OpenEndpoint) -> Result<T, PeerError>,
    {
        let endpoint = self.open(name).await?;
        match on_open(&endpoint) {
            Ok(value) => Ok((endpoint, value)),
            Err(e) => {
                tracing::warn!(endpoint = name, error = %e, "open callback failed, destroying endpoint");
                endpoint.shutdown();
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Backoff {
    first: Duration,
    max: Duration,
}

/// Watches an open endpoint until it is destroyed.
///
/// A signaling drop asks for a reconnect right away. If the backend then
/// reports an error while the endpoint is offline (an unreachable relay,
/// say), the reconnect is retried after a delay that doubles up to
/// `backoff.max` and resets once the endpoint is open again. An error
/// while online only updates the status.
async fn supervise(
    handle: EndpointHandle,
    mut events: mpsc::UnboundedReceiver<EndpointEvent>,
    incoming: mpsc::UnboundedSender<DataChannel>,
    status: watch::Sender<ConnectionStatus>,
    backoff: Backoff,
) {
    let mut online = true;
    let mut delay = backoff.first;
    let mut retry_armed = false;
    let retry = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(retry);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    EndpointEvent::Open => {
                        online = true;
                        retry_armed = false;
                        delay = backoff.first;
                        status.send_replace(ConnectionStatus::Connected);
                        tracing::info!(endpoint = handle.name(), "signaling restored");
                    }
                    EndpointEvent::Connection(channel) => {
                        if let Err(rejected) = incoming.send(channel) {
                            tracing::debug!(endpoint = handle.name(), peer = rejected.0.peer(), "no acceptor, closing channel");
                            rejected.0.close();
                        }
                    }
                    EndpointEvent::Disconnected => {
                        online = false;
                        status.send_replace(ConnectionStatus::Disconnected);
                        tracing::warn!(endpoint = handle.name(), "signaling lost, reconnecting");
                        handle.reconnect();
                    }
                    EndpointEvent::Error(message) => {
                        status.send_replace(ConnectionStatus::Error);
                        tracing::warn!(endpoint = handle.name(), error = %message, "endpoint error");
                        if !online && !retry_armed {
                            tracing::debug!(endpoint = handle.name(), ?delay, "retrying reconnect");
                            retry.as_mut().reset(tokio::time::Instant::now() + delay);
                            retry_armed = true;
                        }
                    }
                    EndpointEvent::Closed => {
                        status.send_replace(ConnectionStatus::Disconnected);
                        break;
                    }
                }
            }
            () = &mut retry, if retry_armed => {
                retry_armed = false;
                delay = (delay * 2).min(backoff.max);
                handle.reconnect();
            }
        }
    }
}
