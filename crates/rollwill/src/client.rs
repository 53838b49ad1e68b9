//! `RollWill` builder and room entry points.

use std::sync::Arc;

use rollwill_peer::{create_peer, join_peer, PeerConfig};
use rollwill_protocol::{Player, RoomCode};
use rollwill_room::{mutation, RoomConfig, RoomRules, StandardRules};
use rollwill_transport::{Signaling, WebSocketSignaling};

use crate::{RollWillError, RoomSession};

/// Relay used when no signaling backend is configured. Matches the
/// `rollwill-relay` default bind address.
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:9000";

/// Builder for a [`RollWill`] client.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use rollwill::prelude::*;
///
/// # async fn run() -> Result<(), RollWillError> {
/// let client = RollWill::builder()
///     .signaling(Arc::new(WebSocketSignaling::new("ws://127.0.0.1:9000")))
///     .build();
/// let session = client.create_room(Player::new("Al")).await?;
/// println!("room code: {}", session.room_code());
/// # Ok(())
/// # }
/// ```
pub struct RollWillBuilder {
    signaling: Option<Arc<dyn Signaling>>,
    peer_config: PeerConfig,
    room_config: RoomConfig,
    rules: Option<Arc<dyn RoomRules>>,
}

impl RollWillBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            signaling: None,
            peer_config: PeerConfig::default(),
            room_config: RoomConfig::default(),
            rules: None,
        }
    }

    /// Sets the rendezvous backend. Defaults to a WebSocket relay at
    /// [`DEFAULT_RELAY_URL`].
    pub fn signaling(mut self, signaling: Arc<dyn Signaling>) -> Self {
        self.signaling = Some(signaling);
        self
    }

    /// Sets timeouts and heartbeat.
    pub fn peer_config(mut self, config: PeerConfig) -> Self {
        self.peer_config = config;
        self
    }

    /// Sets history caps and input limits for hosted rooms and local
    /// input checks.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Replaces the standard room rules for hosted rooms. The rules'
    /// config then takes precedence over [`room_config`](Self::room_config).
    pub fn rules(mut self, rules: Arc<dyn RoomRules>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn build(self) -> RollWill {
        let signaling = self
            .signaling
            .unwrap_or_else(|| Arc::new(WebSocketSignaling::new(DEFAULT_RELAY_URL)));
        let rules = self
            .rules
            .unwrap_or_else(|| Arc::new(StandardRules::new(self.room_config)));
        RollWill {
            signaling,
            peer_config: self.peer_config.validated(),
            rules,
        }
    }
}

impl Default for RollWillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point: hosts and joins rooms.
#[derive(Clone)]
pub struct RollWill {
    signaling: Arc<dyn Signaling>,
    peer_config: PeerConfig,
    rules: Arc<dyn RoomRules>,
}

impl RollWill {
    pub fn builder() -> RollWillBuilder {
        RollWillBuilder::new()
    }

    /// Hosts a room under a freshly generated code.
    pub async fn create_room(&self, player: Player) -> Result<RoomSession, RollWillError> {
        self.host(player, RoomCode::generate()).await
    }

    /// Hosts a room under `code`.
    ///
    /// # Errors
    /// - [`RollWillError::Protocol`] for a malformed code.
    /// - [`RollWillError::Room`] for an invalid player name.
    /// - [`RollWillError::Peer`] if setup fails, for example because the
    ///   code is already in use.
    pub async fn create_room_with_code(
        &self,
        player: Player,
        code: &str,
    ) -> Result<RoomSession, RollWillError> {
        self.host(player, RoomCode::parse(code)?).await
    }

    /// Joins the room hosted under `code`.
    ///
    /// The session starts without a snapshot; it arrives with the host's
    /// first sync.
    pub async fn join_room(&self, player: Player, code: &str) -> Result<RoomSession, RollWillError> {
        let code = RoomCode::parse(code)?;
        let player = self.checked(player)?;
        tracing::debug!(room_code = %code, player_id = %player.id, "joining room");
        let peer = join_peer(
            Arc::clone(&self.signaling),
            self.peer_config.clone(),
            player,
            code,
        )
        .await?;
        Ok(RoomSession::new(peer, Arc::clone(&self.rules)))
    }

    async fn host(&self, player: Player, code: RoomCode) -> Result<RoomSession, RollWillError> {
        let player = self.checked(player)?;
        tracing::debug!(room_code = %code, player_id = %player.id, "creating room");
        let peer = create_peer(
            Arc::clone(&self.signaling),
            self.peer_config.clone(),
            code,
            player,
            Arc::clone(&self.rules),
        )
        .await?;
        Ok(RoomSession::new(peer, Arc::clone(&self.rules)))
    }

    /// Trims the name and checks it against the limits.
    fn checked(&self, player: Player) -> Result<Player, RollWillError> {
        let name = mutation::validate_name(self.rules.config(), &player.name)?;
        Ok(Player::with_id(player.id, name))
    }
}
