//! Room rules for Roll The Will.
//!
//! The host owns the canonical [`Room`](rollwill_protocol::Room) and
//! changes it only through this crate:
//!
//! - [`mutation`]: pure functions from a snapshot to the next snapshot
//!   (join, leave, roll, cheat roll, chat, close) plus input validation.
//! - [`RoomRules`]: the trait the host's writer task calls, with
//!   [`StandardRules`] as the default implementation.
//! - [`RoomConfig`]: history caps and input limits.

mod config;
mod error;
pub mod mutation;
mod rules;

pub use config::RoomConfig;
pub use error::RoomError;
pub use rules::{RoomRules, StandardRules};
