//! One open channel with decoding, liveness and loss detection.
//!
//! Host and guest handlers both read their channels through a
//! [`ChannelLink`]. The link hides the raw [`ChannelEvent`] stream and
//! exposes just two outcomes: the next decoded application message, or a
//! single [`LinkLoss`] saying why the channel is finished.
//!
//! ## Liveness
//!
//! When the heartbeat is enabled the link sends `PING` every
//! [`PeerConfig::heartbeat_interval`]. Any inbound frame, `PONG` or not,
//! refreshes `last_seen`. A link that hears nothing for
//! [`PeerConfig::heartbeat_timeout`] reports [`LinkLoss::Timeout`] and
//! closes its channel, so the remote side sees a close as well.
//!
//! ## What is swallowed
//!
//! `PING` is answered inside the link and `PONG` only refreshes
//! liveness; neither reaches the caller. Frames that fail to decode are
//! logged at `warn` and skipped without ending the channel.

use std::fmt;
use std::time::Duration;

use rollwill_protocol::{Codec, JsonCodec, Message, MessageType, P2PMessage};
use rollwill_transport::{ChannelEvent, ChannelId, ChannelSender, DataChannel, IceState};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::{ChannelState, PeerConfig};

/// Why a channel stopped counting as connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLoss {
    /// Either side closed the channel.
    Closed,
    /// The channel reported an error.
    Error(String),
    /// The ICE connection reached a terminal state.
    Ice(IceState),
    /// Nothing arrived within the heartbeat timeout.
    Timeout,
}

impl fmt::Display for LinkLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("channel closed"),
            Self::Error(message) => write!(f, "channel error: {message}"),
            Self::Ice(state) => write!(f, "ice {state}"),
            Self::Timeout => f.write_str("heartbeat timeout"),
        }
    }
}

pub(crate) enum LinkEvent {
    Message(Message),
    Lost(LinkLoss),
}

struct Heartbeat {
    ticker: Interval,
    timeout: Duration,
    last_seen: Instant,
}

enum Step {
    Event(Option<ChannelEvent>),
    Tick,
}

/// An open data channel plus the per-channel protocol chores: envelope
/// decoding, `PING`/`PONG`, and folding transport events into a single
/// loss notification.
///
/// ## Ownership
///
/// The link owns the receive half ([`DataChannel`]) and is driven by
/// exactly one reader task. Writers get cheap [`ChannelSender`] clones
/// through [`sender`](Self::sender); the host keeps one per guest inside
/// a [`RoomConnection`](crate::RoomConnection).
///
/// ## Loss
///
/// Close, error, a terminal ICE state (`closed`, `disconnected`,
/// `failed`) and heartbeat silence all end the link. Whichever comes
/// first is reported once through [`LinkEvent::Lost`]; the channel state
/// machine is terminal after that and later transport events are
/// ignored.
pub(crate) struct ChannelLink {
    channel: DataChannel,
    state: ChannelState,
    heartbeat: Option<Heartbeat>,
    codec: JsonCodec,
}

impl ChannelLink {
    /// Wraps a channel that has already delivered its `Open` event.
    pub(crate) fn new(channel: DataChannel, config: &PeerConfig) -> Self {
        let heartbeat = config.heartbeat().map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Heartbeat {
                ticker,
                timeout: config.heartbeat_timeout,
                last_seen: Instant::now(),
            }
        });
        Self {
            channel,
            state: ChannelState::Open,
            heartbeat,
            codec: JsonCodec,
        }
    }

    pub(crate) fn id(&self) -> ChannelId {
        self.channel.id()
    }

    pub(crate) fn sender(&self) -> ChannelSender {
        self.channel.sender()
    }

    /// Waits for the next application message or for the channel to be
    /// lost. `PING` is answered here; `PONG` and malformed frames never
    /// reach the caller.
    pub(crate) async fn next(&mut self) -> LinkEvent {
        loop {
            if self.state.is_terminal() {
                return LinkEvent::Lost(LinkLoss::Closed);
            }

            let step = match self.heartbeat.as_mut() {
                Some(heartbeat) => tokio::select! {
                    event = self.channel.recv() => Step::Event(event),
                    _ = heartbeat.ticker.tick() => Step::Tick,
                },
                None => Step::Event(self.channel.recv().await),
            };

            match step {
                Step::Tick => {
                    let expired = self
                        .heartbeat
                        .as_ref()
                        .is_some_and(|hb| hb.last_seen.elapsed() >= hb.timeout);
                    if expired {
                        tracing::info!(peer = self.channel.peer(), channel = %self.id(), "heartbeat timed out");
                        return self.lose(LinkLoss::Timeout);
                    }
                    send_message(&self.channel.sender(), &self.codec, Message::Ping);
                }
                Step::Event(event) => {
                    let event = event.unwrap_or(ChannelEvent::Close);
                    self.state = self.state.apply(&event);
                    match event {
                        ChannelEvent::Data(bytes) => {
                            if let Some(hb) = self.heartbeat.as_mut() {
                                hb.last_seen = Instant::now();
                            }
                            if let Some(message) = self.decode(&bytes) {
                                return LinkEvent::Message(message);
                            }
                        }
                        ChannelEvent::Close => return LinkEvent::Lost(LinkLoss::Closed),
                        ChannelEvent::Error(message) => return self.lose(LinkLoss::Error(message)),
                        ChannelEvent::IceStateChanged(ice) if ice.is_terminal() => {
                            return self.lose(LinkLoss::Ice(ice));
                        }
                        ChannelEvent::IceStateChanged(ice) => {
                            tracing::debug!(peer = self.channel.peer(), %ice, "ice state changed");
                        }
                        ChannelEvent::Open => {}
                    }
                }
            }
        }
    }

    /// Decodes one frame. Liveness pings are handled in place.
    fn decode(&self, bytes: &[u8]) -> Option<Message> {
        let envelope = match self.codec.decode::<P2PMessage>(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(peer = self.channel.peer(), error = %e, "malformed frame dropped");
                return None;
            }
        };
        tracing::debug!(peer = self.channel.peer(), kind = %envelope.message_type(), "frame received");
        match envelope.message {
            Message::Ping => {
                send_message(&self.channel.sender(), &self.codec, Message::Pong);
                None
            }
            Message::Pong => None,
            message => Some(message),
        }
    }

    /// Marks the link failed and closes the channel so the remote side
    /// sees the loss too.
    fn lose(&mut self, loss: LinkLoss) -> LinkEvent {
        self.state = ChannelState::Failed;
        self.channel.close();
        LinkEvent::Lost(loss)
    }
}

/// Encodes and sends one message, stamped now. Returns `false` if it
/// could not be sent; the failure is logged, never raised.
pub(crate) fn send_message(sender: &ChannelSender, codec: &JsonCodec, message: Message) -> bool {
    let kind = message.message_type();
    match codec.encode(&P2PMessage::new(message)) {
        Ok(bytes) => send_bytes(sender, kind, bytes),
        Err(e) => {
            tracing::warn!(error = %e, %kind, "failed to encode message");
            false
        }
    }
}

pub(crate) fn send_bytes(sender: &ChannelSender, kind: MessageType, bytes: Vec<u8>) -> bool {
    match sender.send(bytes) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(channel = %sender.id(), %kind, error = %e, "send skipped");
            false
        }
    }
}
