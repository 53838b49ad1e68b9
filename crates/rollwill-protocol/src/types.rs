//! The room data model shared by hosts and guests.
//!
//! Every type here travels on the wire inside a snapshot, so field names
//! are serialized in camelCase to match the JSON the browser peers speak.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Self-asserted player identifier. Peers never re-validate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random (UUID v4) identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A participant. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    /// Creates a player with a random id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::random(),
            name: name.into(),
        }
    }

    /// Creates a player with a known id (e.g. restored from local storage).
    pub fn with_id(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dice
// ---------------------------------------------------------------------------

/// The dice a player can roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiceType {
    D2,
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DiceType {
    /// Every dice type, smallest first.
    pub const ALL: [DiceType; 8] = [
        Self::D2,
        Self::D4,
        Self::D6,
        Self::D8,
        Self::D10,
        Self::D12,
        Self::D20,
        Self::D100,
    ];

    /// Highest face value. Rolls land in `1..=max_value()`.
    pub fn max_value(self) -> u32 {
        match self {
            Self::D2 => 2,
            Self::D4 => 4,
            Self::D6 => 6,
            Self::D8 => 8,
            Self::D10 => 10,
            Self::D12 => 12,
            Self::D20 => 20,
            Self::D100 => 100,
        }
    }

    /// Human-readable name for dice pickers.
    pub fn label(self) -> &'static str {
        match self {
            Self::D2 => "D2 - Coin",
            Self::D4 => "D4 - Tetrahedron",
            Self::D6 => "D6 - Cube",
            Self::D8 => "D8 - Octahedron",
            Self::D10 => "D10 - Pentagonal",
            Self::D12 => "D12 - Dodecahedron",
            Self::D20 => "D20 - Icosahedron",
            Self::D100 => "D100 - Zocchihedron",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::D2 => "d2",
            Self::D4 => "d4",
            Self::D6 => "d6",
            Self::D8 => "d8",
            Self::D10 => "d10",
            Self::D12 => "d12",
            Self::D20 => "d20",
            Self::D100 => "d100",
        }
    }
}

impl fmt::Display for DiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiceType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dice| dice.as_str() == wanted)
            .ok_or_else(|| ProtocolError::InvalidDice(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Room code
// ---------------------------------------------------------------------------

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Human-entered room code: six ASCII alphanumerics, upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in a code.
    pub const LEN: usize = 6;

    /// Parses user input. Surrounding whitespace is ignored and letters are
    /// upper-cased.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidRoomCode`] if the input is not six ASCII
    /// alphanumerics.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim();
        if code.len() != Self::LEN || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ProtocolError::InvalidRoomCode(input.to_owned()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Draws a random code from `A-Z0-9`.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draws a random code from the given generator.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..Self::LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Whether a room still accepts mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Open,
    Closed,
}

/// One dice roll, as recorded in the room history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub id: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub dice_type: DiceType,
    pub result: u32,
    /// Unix time in milliseconds.
    pub timestamp: i64,
    /// Set only for a value the master picked by hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cheat: Option<bool>,
}

impl RollResult {
    /// Returns `true` if the master chose this value.
    pub fn is_cheat(&self) -> bool {
        self.is_cheat == Some(true)
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub player_id: PlayerId,
    pub player_name: String,
    pub content: String,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

/// A complete room snapshot.
///
/// `players` only grows; `active_players` is the currently connected
/// subset. `rolls` is newest first, `messages` oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomCode,
    #[serde(default)]
    pub status: RoomStatus,
    pub host: Player,
    pub master: Player,
    pub players: Vec<Player>,
    pub active_players: Vec<Player>,
    pub rolls: Vec<RollResult>,
    pub messages: Vec<ChatMessage>,
}

impl Room {
    /// A fresh open room where `host` is also the master and the only
    /// (active) player.
    pub fn new(id: RoomCode, host: Player) -> Self {
        Self {
            id,
            status: RoomStatus::Open,
            master: host.clone(),
            players: vec![host.clone()],
            active_players: vec![host.clone()],
            host,
            rolls: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RoomStatus::Open
    }

    pub fn is_host(&self, id: &PlayerId) -> bool {
        self.host.id == *id
    }

    pub fn is_master(&self, id: &PlayerId) -> bool {
        self.master.id == *id
    }

    /// Looks a player up among everyone who ever joined.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *id)
    }

    pub fn is_active(&self, id: &PlayerId) -> bool {
        self.active_players.iter().any(|p| p.id == *id)
    }
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
