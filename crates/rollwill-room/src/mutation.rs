//! Pure room mutations.
//!
//! Each function takes the current snapshot and returns a new one; the
//! input is never modified. Only the host calls these, from its writer
//! task.

use rand::Rng;
use rollwill_protocol::{
    now_millis, ChatMessage, DiceType, Player, PlayerId, RollResult, Room, RoomCode, RoomStatus,
};

use crate::{RoomConfig, RoomError};

/// Creates a room owned (and mastered) by `host`.
pub fn open_room(code: RoomCode, host: Player) -> Room {
    Room::new(code, host)
}

fn ensure_open(room: &Room) -> Result<(), RoomError> {
    if room.is_open() {
        Ok(())
    } else {
        Err(RoomError::RoomClosed)
    }
}

fn member<'a>(room: &'a Room, player_id: &PlayerId) -> Result<&'a Player, RoomError> {
    room.player(player_id)
        .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))
}

/// Adds `player` to the room under their trimmed name.
///
/// The name is checked with [`validate_name`] first. A player who
/// joined before is not added to `players` again, only re-marked active.
/// The recorded player keeps their first name.
pub fn join(room: &Room, config: &RoomConfig, player: &Player) -> Result<Room, RoomError> {
    ensure_open(room)?;
    let player = Player::with_id(player.id.clone(), validate_name(config, &player.name)?);
    let mut next = room.clone();
    if next.player(&player.id).is_none() {
        next.players.push(player.clone());
    }
    if !next.is_active(&player.id) {
        let known = next.player(&player.id).cloned().unwrap_or_else(|| player.clone());
        next.active_players.push(known);
    }
    Ok(next)
}

/// Marks a player inactive. They stay in `players`.
pub fn leave(room: &Room, player_id: &PlayerId) -> Room {
    let mut next = room.clone();
    next.active_players.retain(|p| p.id != *player_id);
    next
}

fn record_roll(room: &Room, config: &RoomConfig, roll: RollResult) -> Room {
    let mut next = room.clone();
    next.rolls.insert(0, roll);
    next.rolls.truncate(config.max_rolls);
    next
}

/// Rolls `dice` for a player with a uniformly sampled result.
pub fn roll<R: Rng + ?Sized>(
    room: &Room,
    config: &RoomConfig,
    player_id: &PlayerId,
    dice: DiceType,
    rng: &mut R,
) -> Result<(Room, RollResult), RoomError> {
    ensure_open(room)?;
    let player = member(room, player_id)?;
    let roll = RollResult {
        id: uuid::Uuid::new_v4().to_string(),
        player_id: player.id.clone(),
        player_name: player.name.clone(),
        dice_type: dice,
        result: rng.random_range(1..=dice.max_value()),
        timestamp: now_millis(),
        is_cheat: None,
    };
    Ok((record_roll(room, config, roll.clone()), roll))
}

/// Records a value chosen by the master, clamped to the dice's faces.
pub fn cheat_roll(
    room: &Room,
    config: &RoomConfig,
    player_id: &PlayerId,
    dice: DiceType,
    value: i64,
) -> Result<(Room, RollResult), RoomError> {
    ensure_open(room)?;
    let player = member(room, player_id)?;
    if !room.is_master(player_id) {
        return Err(RoomError::NotMaster(player_id.clone()));
    }
    let result = value.clamp(1, i64::from(dice.max_value())) as u32;
    let roll = RollResult {
        id: uuid::Uuid::new_v4().to_string(),
        player_id: player.id.clone(),
        player_name: player.name.clone(),
        dice_type: dice,
        result,
        timestamp: now_millis(),
        is_cheat: Some(true),
    };
    Ok((record_roll(room, config, roll.clone()), roll))
}

/// Appends a chat message, dropping the oldest beyond the cap.
pub fn post_message(
    room: &Room,
    config: &RoomConfig,
    player_id: &PlayerId,
    content: &str,
) -> Result<(Room, ChatMessage), RoomError> {
    ensure_open(room)?;
    let content = validate_message(config, content)?;
    let player = member(room, player_id)?;
    let message = ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        player_id: player.id.clone(),
        player_name: player.name.clone(),
        content,
        timestamp: now_millis(),
    };

    let mut next = room.clone();
    next.messages.push(message.clone());
    let excess = next.messages.len().saturating_sub(config.max_messages);
    next.messages.drain(..excess);
    Ok((next, message))
}

/// Closes the room. Closing twice is a no-op.
pub fn close(room: &Room) -> Room {
    let mut next = room.clone();
    next.status = RoomStatus::Closed;
    next
}

/// Trims a player name and checks it against the limits.
pub fn validate_name(config: &RoomConfig, name: &str) -> Result<String, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::InvalidName("name is empty".into()));
    }
    let len = name.chars().count();
    if len > config.max_name_len {
        return Err(RoomError::InvalidName(format!(
            "name is {len} characters, limit is {}",
            config.max_name_len
        )));
    }
    Ok(name.to_owned())
}

/// Trims a chat message and checks it against the limits.
pub fn validate_message(config: &RoomConfig, content: &str) -> Result<String, RoomError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(RoomError::EmptyMessage);
    }
    let len = content.chars().count();
    if len > config.max_message_len {
        return Err(RoomError::MessageTooLong {
            len,
            max: config.max_message_len,
        });
    }
    Ok(content.to_owned())
}
