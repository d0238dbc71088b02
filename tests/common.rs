//! Test utilities & fixtures shared by the integration tests.

use std::sync::Arc;

use balladeer::config::Config;
use balladeer::game::clock::ManualClock;
use balladeer::game::generator::{LocationBlueprint, WorldBlueprint};
use balladeer::game::services::{exercise, player};
use balladeer::game::types::{ExerciseType, LocationType};
use balladeer::game::views::{ExerciseCompletion, WorldView};
use balladeer::server::GameContext;
use balladeer::storage::{GameStore, GameStoreBuilder};
use tempfile::TempDir;

/// A seeded store in a temp dir plus a manual clock. Keep `_dir` alive for
/// the duration of the test.
#[allow(dead_code)]
pub struct Harness {
    pub _dir: TempDir,
    pub ctx: GameContext,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path().join("game")).open().expect("store");
        let clock = Arc::new(ManualClock::starting_now());
        let ctx = GameContext::new(Arc::new(store), clock.clone(), Arc::new(config));
        Self { _dir: dir, ctx, clock }
    }

    pub fn store(&self) -> &GameStore {
        &self.ctx.store
    }

    pub fn new_player(&self, id: &str) {
        player::get_or_create(self.store(), id, None).expect("player");
    }

    /// Travel to `destination`, let the timer run out and complete.
    pub fn arrive(&self, player_id: &str, destination: u64) -> ExerciseCompletion {
        let started = exercise::start_travel(self.store(), &self.ctx.timer, player_id, destination)
            .expect("start travel");
        self.clock.advance_secs(started.exercise.duration_seconds as i64 + 1);
        exercise::complete_exercise(self.store(), &self.ctx.timer, player_id).expect("complete")
    }
}

/// Index of `name` among the world's locations.
#[allow(dead_code)]
pub fn location_id(world: &WorldView, name: &str) -> u64 {
    world
        .locations
        .iter()
        .find(|l| l.name == name)
        .map(|l| l.id)
        .expect("location in world")
}

/// A small world: village start, rhythm road, tavern, dungeon.
#[allow(dead_code)]
pub fn road_world() -> WorldBlueprint {
    let loc = |name: &str, location_type, focus| LocationBlueprint {
        name: name.to_string(),
        description: format!("{name} description"),
        location_type,
        exercise_focus: Some(focus),
    };
    WorldBlueprint {
        name: "Test Realm".into(),
        theme: "testing".into(),
        story_arc: "A realm built for tests.".into(),
        final_monster: "The Flaky Wyrm".into(),
        rescue_target: "The Lost Build".into(),
        locations: vec![
            loc("Start Village", LocationType::Village, ExerciseType::Melody),
            loc("Drum Road", LocationType::Path, ExerciseType::Rhythm),
            loc("Rest Tavern", LocationType::Tavern, ExerciseType::Harmony),
            loc("Wyrm Den", LocationType::Dungeon, ExerciseType::EarTraining),
        ],
    }
}
