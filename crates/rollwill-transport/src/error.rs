use crate::ChannelId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The signaling side rejected or lost the endpoint (for example, the
    /// requested name is already taken).
    #[error("signaling error: {0}")]
    Signaling(String),

    /// Data was sent on a channel that is not open.
    #[error("channel {0} is not open")]
    ChannelNotOpen(ChannelId),

    /// The endpoint driver behind a channel or endpoint is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Binding the relay listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting relay connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
