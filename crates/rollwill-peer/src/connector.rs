//! Outbound connector ("player pool"): a guest's channel to its host.

use rollwill_transport::{ChannelEvent, DataChannel, EndpointHandle};

use crate::{ChannelState, PeerConfig, PeerError};

/// Opens channels from a local endpoint to a host.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    config: PeerConfig,
}

impl PlayerPool {
    pub fn new(config: PeerConfig) -> Self {
        Self { config }
    }

    /// Opens a reliable channel from `endpoint` to `target` and waits for
    /// it to open.
    ///
    /// # Errors
    /// - [`PeerError::HandshakeTimeout`] if the channel is not open within
    ///   [`PeerConfig::handshake_timeout`]. The channel is closed.
    /// - [`PeerError::Channel`] if the channel errors first.
    /// - [`PeerError::ClosedByHost`] if it closes first.
    pub async fn connect(
        &self,
        endpoint: &EndpointHandle,
        target: &str,
    ) -> Result<DataChannel, PeerError> {
        let mut channel = endpoint.connect(target);
        tracing::debug!(endpoint = endpoint.name(), target, channel = %channel.id(), "connecting");

        match tokio::time::timeout(self.config.handshake_timeout, await_open(&mut channel)).await {
            Ok(Ok(())) => Ok(channel),
            Ok(Err(e)) => {
                channel.close();
                Err(e)
            }
            Err(_) => {
                tracing::warn!(target, timeout = ?self.config.handshake_timeout, "handshake timed out");
                channel.close();
                Err(PeerError::HandshakeTimeout {
                    target: target.to_owned(),
                    timeout: self.config.handshake_timeout,
                })
            }
        }
    }
}

/// Drives a fresh channel until it opens or ends.
pub(crate) async fn await_open(channel: &mut DataChannel) -> Result<(), PeerError> {
    let mut state = ChannelState::Connecting;
    loop {
        let event = channel.recv().await.unwrap_or(ChannelEvent::Close);
        if let ChannelEvent::Error(message) = &event {
            return Err(PeerError::Channel(message.clone()));
        }
        state = state.apply(&event);
        match state {
            ChannelState::Open => return Ok(()),
            ChannelState::Closed | ChannelState::Failed => return Err(PeerError::ClosedByHost),
            ChannelState::Idle | ChannelState::Connecting => {}
        }
    }
}
