//! Rendezvous naming: room codes and player ids to endpoint names and back.
//!
//! The mapping only derives names. It says nothing about whether an
//! endpoint is actually registered under one.

use crate::types::{PlayerId, RoomCode};

/// Prefix shared by every endpoint this application registers.
pub const APP_NAMESPACE: &str = "roll-the-will";

/// Prefixes `id` with the application namespace.
pub fn endpoint_name(id: &str) -> String {
    format!("{APP_NAMESPACE}-{id}")
}

/// Strips the application namespace from an endpoint name.
pub fn local_id(endpoint: &str) -> Option<&str> {
    endpoint.strip_prefix(APP_NAMESPACE)?.strip_prefix('-')
}

/// Endpoint name a room's host registers: `roll-the-will-<roomCode>`.
pub fn host_endpoint_name(room_code: &RoomCode) -> String {
    endpoint_name(room_code.as_str())
}

/// Local part of a guest's endpoint name: `<roomCode>-<playerId>`.
pub fn guest_endpoint_id(room_code: &RoomCode, player_id: &PlayerId) -> String {
    format!("{room_code}-{player_id}")
}

/// Endpoint name a guest registers: `roll-the-will-<roomCode>-<playerId>`.
pub fn guest_endpoint_name(room_code: &RoomCode, player_id: &PlayerId) -> String {
    endpoint_name(&guest_endpoint_id(room_code, player_id))
}

/// Recovers the player id from a guest endpoint name of `room_code`.
///
/// Returns `None` for names outside the namespace, names of another room,
/// and the host's own name.
pub fn player_id_from_endpoint(room_code: &RoomCode, endpoint: &str) -> Option<PlayerId> {
    let player = local_id(endpoint)?
        .strip_prefix(room_code.as_str())?
        .strip_prefix('-')?;
    (!player.is_empty()).then(|| PlayerId::new(player))
}
