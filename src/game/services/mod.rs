//! Player-facing operations. Each one opens its own store transaction and
//! returns a [`GameResult`](crate::game::errors::GameResult).

pub mod exercise;
pub mod player;
pub mod quest;
pub mod world;

pub use player::{StatDelta, StatUpdate};
