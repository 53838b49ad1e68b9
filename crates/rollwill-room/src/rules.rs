//! The `RoomRules` trait: how a host turns requests into new snapshots.

use rollwill_protocol::{ChatMessage, DiceType, Player, PlayerId, RollResult, Room};

use crate::{mutation, RoomConfig, RoomError};

/// Host-side room rules.
///
/// The host's writer task calls these for every mutation, one at a time.
/// Each method receives the current snapshot and returns its replacement;
/// an `Err` leaves the room unchanged. The defaults apply the standard
/// mutations with [`config`](Self::config) limits, so implementors only
/// override what they want to change.
pub trait RoomRules: Send + Sync + 'static {
    /// Limits applied by the default methods.
    fn config(&self) -> &RoomConfig;

    /// A guest sent `JOIN`. The default rejects names that
    /// [`mutation::validate_name`] rejects and records the trimmed name.
    fn on_join(&self, room: &Room, player: &Player) -> Result<Room, RoomError> {
        mutation::join(room, self.config(), player)
    }

    /// A guest's channel was lost.
    fn on_leave(&self, room: &Room, player_id: &PlayerId) -> Room {
        mutation::leave(room, player_id)
    }

    /// A player asked for a roll.
    fn on_roll_request(
        &self,
        room: &Room,
        player_id: &PlayerId,
        dice: DiceType,
    ) -> Result<(Room, RollResult), RoomError> {
        mutation::roll(room, self.config(), player_id, dice, &mut rand::rng())
    }

    /// The master chose a roll value.
    fn on_cheat_roll(
        &self,
        room: &Room,
        player_id: &PlayerId,
        dice: DiceType,
        value: i64,
    ) -> Result<(Room, RollResult), RoomError> {
        mutation::cheat_roll(room, self.config(), player_id, dice, value)
    }

    /// A player sent a chat message.
    fn on_message_request(
        &self,
        room: &Room,
        player_id: &PlayerId,
        content: &str,
    ) -> Result<(Room, ChatMessage), RoomError> {
        mutation::post_message(room, self.config(), player_id, content)
    }
}

/// The default rules: standard mutations under a [`RoomConfig`].
#[derive(Debug, Clone, Default)]
pub struct StandardRules {
    config: RoomConfig,
}

impl StandardRules {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }
}

impl RoomRules for StandardRules {
    fn config(&self) -> &RoomConfig {
        &self.config
    }
}
