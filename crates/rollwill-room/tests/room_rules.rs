//! Invariant tests for the host room rules.
//!
//! These drive long random sequences of mutations through `StandardRules`
//! and check the snapshot invariants after every step.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rollwill_protocol::{DiceType, Player, PlayerId, Room, RoomCode};
use rollwill_room::{mutation, RoomConfig, RoomError, RoomRules, StandardRules};

fn new_room() -> Room {
    mutation::open_room(RoomCode::parse("ABC123").unwrap(), Player::with_id("host", "Al"))
}

fn assert_invariants(room: &Room, config: &RoomConfig) {
    assert!(room.players.contains(&room.host), "host must stay in players");
    for active in &room.active_players {
        assert!(
            room.players.iter().any(|p| p.id == active.id),
            "active player {} missing from players",
            active.id
        );
    }
    assert!(room.rolls.len() <= config.max_rolls);
    assert!(room.messages.len() <= config.max_messages);
}

#[test]
fn test_random_join_leave_sequences_keep_subset_invariant() {
    let rules = StandardRules::default();
    let mut rng = StdRng::seed_from_u64(7);
    let mut room = new_room();
    let mut seen = 1;

    for _ in 0..500 {
        let id = format!("p{}", rng.random_range(0..12));
        if rng.random_bool(0.6) {
            room = rules.on_join(&room, &Player::with_id(id.as_str(), "x")).unwrap();
        } else {
            room = rules.on_leave(&room, &PlayerId::new(id));
        }
        assert_invariants(&room, rules.config());
        assert!(room.players.len() >= seen, "players must only grow");
        seen = room.players.len();
    }
}

#[test]
fn test_roll_results_stay_in_range() {
    let rules = StandardRules::default();
    let mut room = new_room();
    for dice in DiceType::ALL {
        for _ in 0..200 {
            let (next, roll) = rules.on_roll_request(&room, &room.host.id.clone(), dice).unwrap();
            assert!((1..=dice.max_value()).contains(&roll.result));
            assert_eq!(roll.dice_type, dice);
            room = next;
        }
    }
    assert_eq!(room.rolls.len(), 50);
}

#[test]
fn test_cheat_results_equal_clamped_value() {
    let rules = StandardRules::default();
    let room = new_room();
    let host = room.host.id.clone();
    for dice in DiceType::ALL {
        for value in [-10, 0, 1, 5, 20, 100, 1000] {
            let (_, roll) = rules.on_cheat_roll(&room, &host, dice, value).unwrap();
            let expected = value.clamp(1, i64::from(dice.max_value())) as u32;
            assert_eq!(roll.result, expected);
            assert!(roll.is_cheat());
        }
    }
}

#[test]
fn test_caps_hold_after_many_mutations() {
    let config = RoomConfig::default();
    let rules = StandardRules::new(config.clone());
    let mut room = new_room();
    let host = room.host.id.clone();

    for i in 0..250 {
        room = rules.on_roll_request(&room, &host, DiceType::D6).unwrap().0;
        room = rules
            .on_message_request(&room, &host, &format!("message {i}"))
            .unwrap()
            .0;
        assert_invariants(&room, &config);
    }
    assert_eq!(room.rolls.len(), 50);
    assert_eq!(room.messages.len(), 100);
    assert_eq!(room.messages.last().unwrap().content, "message 249");
    assert_eq!(room.messages.first().unwrap().content, "message 150");
}

#[test]
fn test_guest_cannot_cheat() {
    let rules = StandardRules::default();
    let bo = Player::with_id("p2", "Bo");
    let room = rules.on_join(&new_room(), &bo).unwrap();
    assert_eq!(
        rules.on_cheat_roll(&room, &bo.id, DiceType::D20, 20).unwrap_err(),
        RoomError::NotMaster(bo.id.clone())
    );
}

struct LoudRules {
    config: RoomConfig,
}

impl RoomRules for LoudRules {
    fn config(&self) -> &RoomConfig {
        &self.config
    }

    fn on_message_request(
        &self,
        room: &Room,
        player_id: &PlayerId,
        content: &str,
    ) -> Result<(Room, rollwill_protocol::ChatMessage), RoomError> {
        mutation::post_message(room, &self.config, player_id, &content.to_uppercase())
    }
}

#[test]
fn test_custom_rules_override_one_hook() {
    let rules = LoudRules {
        config: RoomConfig::default(),
    };
    let room = new_room();
    let host = room.host.id.clone();
    let (room, message) = rules.on_message_request(&room, &host, "hello").unwrap();
    assert_eq!(message.content, "HELLO");

    // Untouched hooks keep the default behaviour.
    let (room, _) = rules.on_roll_request(&room, &host, DiceType::D4).unwrap();
    assert_eq!(room.rolls.len(), 1);
}
