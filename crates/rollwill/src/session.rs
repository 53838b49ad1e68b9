//! `RoomSession`: the UI-facing handle to one room.

use std::sync::Arc;

use rollwill_peer::{ConnectionStatus, PeerError, PeerEvent, RoomPeer};
use rollwill_protocol::{DiceType, Message, Player, Room, RoomCode};
use rollwill_room::{mutation, RoomError, RoomRules};
use tokio::sync::{broadcast, watch};

use crate::RollWillError;

/// A joined or hosted room.
///
/// Actions are checked against the latest snapshot before anything is
/// sent, so obvious mistakes (closed room, wrong player, empty chat)
/// fail right away. The host still has the final word: a guest's request
/// that the host rejects is dropped and the snapshot does not change.
///
/// Dropping the session leaves the room without closing it; call
/// [`leave`](Self::leave) for an orderly exit.
pub struct RoomSession {
    peer: RoomPeer,
    rules: Arc<dyn RoomRules>,
}

impl RoomSession {
    pub(crate) fn new(peer: RoomPeer, rules: Arc<dyn RoomRules>) -> Self {
        Self { peer, rules }
    }

    /// The current snapshot, or [`RoomError::NoRoom`] before the first
    /// sync and after leaving.
    fn open_room(&self) -> Result<Arc<Room>, RoomError> {
        let room = self.peer.room().ok_or(RoomError::NoRoom)?;
        if !room.is_open() {
            return Err(RoomError::RoomClosed);
        }
        Ok(room)
    }

    /// Rolls `dice` for the local player.
    ///
    /// On a guest this only sends the request; the result shows up in the
    /// next snapshot.
    pub async fn roll(&self, dice: DiceType) -> Result<(), RollWillError> {
        self.open_room()?;
        if self.peer.is_host() {
            self.peer.host_roll(dice).await?;
        } else {
            self.peer.send_to_host(Message::RollRequest {
                player_id: self.peer.player().id.clone(),
                dice_type: dice,
            })?;
        }
        Ok(())
    }

    /// Records `value` (clamped to the dice's faces) as a roll. Master
    /// only.
    pub async fn cheat_roll(&self, dice: DiceType, value: i64) -> Result<(), RollWillError> {
        let room = self.open_room()?;
        let me = &self.peer.player().id;
        if !room.is_master(me) {
            return Err(RoomError::NotMaster(me.clone()).into());
        }
        // There is no wire message for a chosen value, so only a hosting
        // master can record one.
        if !self.peer.is_host() {
            return Err(PeerError::NotHosting.into());
        }
        self.peer.host_cheat_roll(dice, value).await?;
        Ok(())
    }

    /// Posts a chat message. Surrounding whitespace is trimmed.
    pub async fn send_chat(&self, text: &str) -> Result<(), RollWillError> {
        self.open_room()?;
        let content = mutation::validate_message(self.rules.config(), text)?;
        if self.peer.is_host() {
            self.peer.host_chat(content).await?;
        } else {
            self.peer.send_to_host(Message::MessageRequest {
                player_id: self.peer.player().id.clone(),
                content,
            })?;
        }
        Ok(())
    }

    /// Leaves the room. A host closes it for everyone first.
    pub async fn leave(mut self) {
        if self.peer.is_host() && self.peer.room().is_some_and(|room| room.is_open()) {
            if let Err(e) = self.peer.close_room().await {
                tracing::debug!(error = %e, "closing room on leave failed");
            }
        }
        self.peer.disconnect();
        tracing::info!(room_code = %self.peer.room_code(), player_id = %self.peer.player().id, "left room");
    }

    /// The latest snapshot, if any.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.peer.room()
    }

    /// Receives every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Room>>> {
        self.peer.subscribe()
    }

    /// Receives joins, leaves and host loss from now on.
    pub fn events(&self) -> broadcast::Receiver<PeerEvent> {
        self.peer.events()
    }

    pub fn room_code(&self) -> &RoomCode {
        self.peer.room_code()
    }

    pub fn player(&self) -> &Player {
        self.peer.player()
    }

    pub fn is_host(&self) -> bool {
        self.peer.is_host()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.peer.status()
    }

    /// The underlying peer, for lower-level access.
    pub fn peer(&self) -> &RoomPeer {
        &self.peer
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
