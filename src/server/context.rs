use std::sync::Arc;

use crate::config::Config;
use crate::game::clock::{Clock, SystemClock};
use crate::game::errors::GameResult;
use crate::game::generator::{DefaultWorldGenerator, WorldGenerator};
use crate::game::timer::ExerciseTimer;
use crate::server::mentor::{GuideMentor, Mentor};
use crate::storage::{GameStore, GameStoreBuilder};

/// Everything a session needs, shared by all connections.
#[derive(Clone)]
pub struct GameContext {
    pub store: Arc<GameStore>,
    pub timer: Arc<ExerciseTimer>,
    pub clock: Arc<dyn Clock>,
    pub generator: Arc<dyn WorldGenerator>,
    pub mentor: Arc<dyn Mentor>,
    pub config: Arc<Config>,
}

impl GameContext {
    /// Open the store named by the config with the wall clock and the built-in
    /// collaborators.
    pub fn open(config: Arc<Config>) -> GameResult<Self> {
        let store = GameStoreBuilder::new(config.storage.db_path()).open()?;
        Ok(Self::new(Arc::new(store), Arc::new(SystemClock), config))
    }

    pub fn new(store: Arc<GameStore>, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            store,
            timer: Arc::new(ExerciseTimer::new(clock.clone())),
            clock,
            generator: Arc::new(DefaultWorldGenerator),
            mentor: Arc::new(GuideMentor),
            config,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn WorldGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_mentor(mut self, mentor: Arc<dyn Mentor>) -> Self {
        self.mentor = mentor;
        self
    }
}
