//! Travel by exercise: start a timed exercise toward a destination, poll it,
//! and claim the reward once the timer has run out.

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::errors::{GameError, GameResult};
use crate::game::rewards;
use crate::game::services::player::{apply_stat_delta, StatDelta};
use crate::game::services::world::unlock_next_in_tx;
use crate::game::timer::{Claim, ExerciseSession, ExerciseTimer, SessionRequest, SessionSnapshot};
use crate::game::types::ProgressType;
use crate::game::views::{ExerciseCompletion, ExerciseView, LocationSummary, PlayerSnapshot, TravelStarted};
use crate::storage::GameStore;

/// How far above the player's level an exercise may be.
const DIFFICULTY_SPREAD: u32 = 2;

pub fn start_travel(
    store: &GameStore,
    timer: &ExerciseTimer,
    player_id: &str,
    destination_id: u64,
) -> GameResult<TravelStarted> {
    start_travel_with_rng(store, timer, player_id, destination_id, &mut rand::thread_rng())
}

/// [`start_travel`] with a caller-supplied random source.
pub fn start_travel_with_rng<R: Rng + ?Sized>(
    store: &GameStore,
    timer: &ExerciseTimer,
    player_id: &str,
    destination_id: u64,
    rng: &mut R,
) -> GameResult<TravelStarted> {
    let (destination, exercise) = store.view(|tx| {
        let player = tx.require_player(player_id)?;
        let destination = tx.require_location(destination_id)?;
        let in_own_world = tx
            .world_for_player(player_id)?
            .is_some_and(|w| w.id == destination.world_id);
        if !in_own_world {
            return Err(GameError::LocationNotFound(destination_id));
        }

        let min = player.level.max(1);
        let max = player.level + DIFFICULTY_SPREAD;
        let mut candidates = tx.exercises_matching(destination.exercise_focus, min, max)?;
        if candidates.is_empty() {
            candidates = tx.list_exercises()?;
        }
        let exercise = candidates
            .choose(rng)
            .cloned()
            .ok_or(GameError::NoExercisesAvailable)?;
        Ok((destination, exercise))
    })?;

    let started = timer.start_session(
        player_id,
        SessionRequest {
            exercise_id: exercise.id,
            exercise_name: exercise.name.clone(),
            duration_seconds: exercise.duration_seconds,
            destination_location_id: Some(destination.id),
        },
    );

    info!(
        "[{}] travelling to '{}' via '{}' ({}s)",
        player_id, destination.name, exercise.name, exercise.duration_seconds
    );

    Ok(TravelStarted {
        status: "travel_started",
        exercise: ExerciseView::from(&exercise),
        session: started.session.snapshot(timer.now()),
        destination: LocationSummary::from(&destination),
        abandoned_exercise: started.abandoned.map(|s| s.exercise_name),
    })
}

pub fn check_exercise(timer: &ExerciseTimer, player_id: &str) -> GameResult<SessionSnapshot> {
    timer.check_session(player_id).ok_or(GameError::NoActiveExercise)
}

/// Give up on the running exercise without any reward.
pub fn cancel_exercise(timer: &ExerciseTimer, player_id: &str) -> GameResult<SessionSnapshot> {
    let session = timer.cancel_session(player_id).ok_or(GameError::NoActiveExercise)?;
    Ok(session.snapshot(timer.now()))
}

pub fn complete_exercise(
    store: &GameStore,
    timer: &ExerciseTimer,
    player_id: &str,
) -> GameResult<ExerciseCompletion> {
    let session = match timer.claim_completed(player_id) {
        Claim::Claimed(session) => session,
        Claim::NotReady { remaining_seconds } => {
            warn!("[{}] tried to finish early, {:.0}s left", player_id, remaining_seconds);
            return Err(GameError::ExerciseNotYetComplete { remaining_seconds });
        }
        Claim::Missing => return Err(GameError::NoActiveExercise),
    };

    match award_completion(store, timer, player_id, &session) {
        Ok(completion) => Ok(completion),
        Err(err) => {
            timer.reinstate(session);
            Err(err)
        }
    }
}

fn award_completion(
    store: &GameStore,
    timer: &ExerciseTimer,
    player_id: &str,
    session: &ExerciseSession,
) -> GameResult<ExerciseCompletion> {
    let now = timer.now();
    let completion = store.transaction(player_id, |tx| {
        let exercise = tx.require_exercise(session.exercise_id)?;
        let player = tx.require_player(player_id)?;
        let reward = rewards::calculate_exercise_reward(&exercise, player.level, 1.0);

        let update = apply_stat_delta(
            tx,
            player_id,
            &StatDelta {
                xp: reward.xp_gained,
                gold: reward.gold_gained,
                reputation: 0,
                skill: reward.skill_type.map(|skill| (skill, reward.skill_bonus)),
            },
        )?;
        let mut player = update.player;
        tx.mark_progress_completed(player_id, ProgressType::Exercise, exercise.id, None, now)?;

        let mut unlocked_location = None;
        if let Some(destination) = session.destination_location_id {
            player = tx.set_player_location(player_id, destination)?;
            tx.mark_progress_completed(player_id, ProgressType::Location, destination, None, now)?;
            if let Some(world) = tx.world_for_player(player_id)? {
                unlocked_location = unlock_next_in_tx(tx, &world)?;
            }
        }

        Ok(ExerciseCompletion {
            status: "exercise_completed",
            exercise_name: exercise.name.clone(),
            rewards: reward,
            new_location_id: session.destination_location_id,
            unlocked_location: unlocked_location.as_ref().map(LocationSummary::from),
            level_up: update.leveled_up,
            new_level: update.leveled_up.then_some(player.level),
            player: PlayerSnapshot::from(&player),
        })
    })?;

    info!(
        "[{}] completed '{}': +{} xp, +{} gold{}",
        player_id,
        completion.exercise_name,
        completion.rewards.xp_gained,
        completion.rewards.gold_gained,
        if completion.level_up { ", level up" } else { "" }
    );
    Ok(completion)
}
