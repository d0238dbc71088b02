//! Game engine: records, rewards, the exercise timer and the services built on them.

pub mod clock;
pub mod errors;
pub mod generator;
pub mod rewards;
pub mod seed;
pub mod services;
pub mod timer;
pub mod types;
pub mod views;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ErrorKind, GameError, GameResult};
pub use timer::ExerciseTimer;
