//! Room limits.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Caps and input limits the host enforces on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Rolls kept in the history, newest first.
    pub max_rolls: usize,
    /// Chat messages kept, oldest dropped first.
    pub max_messages: usize,
    /// Longest accepted player name, in characters.
    pub max_name_len: usize,
    /// Longest accepted chat message, in characters.
    pub max_message_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_rolls: 50,
            max_messages: 100,
            max_name_len: 20,
            max_message_len: 500,
        }
    }
}

impl RoomConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Every limit is at least 1; a zero cap would drop each entry as soon
    /// as it is added.
    pub fn validated(mut self) -> Self {
        for (field, value) in [
            ("max_rolls", &mut self.max_rolls),
            ("max_messages", &mut self.max_messages),
            ("max_name_len", &mut self.max_name_len),
            ("max_message_len", &mut self.max_message_len),
        ] {
            if *value == 0 {
                warn!(field, "room limit of 0 raised to 1");
                *value = 1;
            }
        }
        self
    }
}
