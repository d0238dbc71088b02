//! Song segments, tavern performances and the final quest.

use std::collections::BTreeSet;

use chrono::Utc;
use log::{debug, info, warn};

use crate::game::errors::{GameError, GameResult};
use crate::game::rewards;
use crate::game::services::player::{apply_stat_delta, StatDelta};
use crate::game::types::{ProgressType, SegmentRecord, SongRecord, WorldRecord};
use crate::game::views::{
    FinalQuestOutcome, FinalQuestReadiness, Inventory, PerformanceResult, PlayerSnapshot,
    SegmentCollected, SegmentView,
};
use crate::storage::{GameStore, StoreTx};

/// Scores outside `0.0..=1.0` are a caller bug, not something to clamp silently.
pub fn validate_score(score: f64) -> GameResult<f64> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(GameError::InvalidInput(format!(
            "performance score must be between 0 and 1, got {}",
            score
        )))
    }
}

struct SongProgress {
    song: Option<SongRecord>,
    collected: Vec<SegmentRecord>,
    total: usize,
}

/// The song that counts for this player (their world's copy, or the template
/// before a world exists) and which of its segments they hold.
fn song_progress(tx: &StoreTx<'_>, player_id: &str, world: Option<&WorldRecord>) -> GameResult<SongProgress> {
    let song = match world {
        Some(world) => tx.world_song(world)?,
        None => tx.final_song_template()?,
    };
    let Some(song) = song else {
        return Ok(SongProgress {
            song: None,
            collected: Vec::new(),
            total: 0,
        });
    };
    let done: BTreeSet<u64> = tx.completed_references(player_id, ProgressType::Segment)?;
    let collected = tx
        .song_segments(&song)?
        .into_iter()
        .filter(|s| done.contains(&s.id))
        .collect();
    Ok(SongProgress {
        total: song.total_segments(),
        song: Some(song),
        collected,
    })
}

impl SongProgress {
    fn complete(&self) -> bool {
        self.total > 0 && self.collected.len() == self.total
    }
}

pub fn collect_segment(store: &GameStore, player_id: &str, segment_id: u64) -> GameResult<SegmentCollected> {
    let result = store.transaction(player_id, |tx| {
        let segment = tx.require_segment(segment_id)?;
        let player = tx.require_player(player_id)?;
        if segment.location_id.is_none() || segment.location_id != player.current_location_id {
            return Err(GameError::LocationMismatch);
        }
        let row = tx.progress_or_new(player_id, ProgressType::Segment, segment_id)?;
        if row.is_completed() {
            return Err(GameError::AlreadyCollected);
        }
        tx.mark_progress_completed(player_id, ProgressType::Segment, segment_id, None, Utc::now())?;

        let world = tx.world_for_player(player_id)?;
        let progress = song_progress(tx, player_id, world.as_ref())?;
        Ok(SegmentCollected {
            status: "segment_collected",
            segment: SegmentView::from(&segment),
            collected_count: progress.collected.len(),
            total_segments: progress.total,
        })
    });

    match &result {
        Ok(collected) => info!(
            "[{}] collected '{}' ({}/{})",
            player_id, collected.segment.name, collected.collected_count, collected.total_segments
        ),
        Err(err) => warn!("[{}] cannot collect segment {}: {}", player_id, segment_id, err),
    }
    result
}

pub fn get_inventory(store: &GameStore, player_id: &str) -> GameResult<Inventory> {
    store.view(|tx| {
        tx.require_player(player_id)?;
        let world = tx.world_for_player(player_id)?;
        let progress = song_progress(tx, player_id, world.as_ref())?;
        Ok(Inventory {
            song_title: progress.song.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
            can_perform_final: progress.complete(),
            collected_count: progress.collected.len(),
            total_segments: progress.total,
            collected_segments: progress.collected.iter().map(SegmentView::from).collect(),
        })
    })
}

/// Perform at the tavern the player is standing in. Segments are counted for
/// difficulty but not consumed.
pub fn perform_at_tavern(store: &GameStore, player_id: &str, performance_score: f64) -> GameResult<PerformanceResult> {
    let score = validate_score(performance_score)?;
    let result = store.transaction(player_id, |tx| {
        let player = tx.require_player(player_id)?;
        let location_id = player.current_location_id.ok_or(GameError::NoCurrentLocation)?;
        let location = tx.require_location(location_id)?;
        if !location.is_tavern() {
            return Err(GameError::NotAtTavern);
        }

        let world = tx.world_for_player(player_id)?;
        let collected = song_progress(tx, player_id, world.as_ref())?.collected.len();
        let song_difficulty = 1 + (collected / 2) as u32;
        let reward = rewards::calculate_performance_reward(song_difficulty, player.level, score);
        let update = apply_stat_delta(
            tx,
            player_id,
            &StatDelta {
                gold: reward.gold_gained,
                reputation: reward.reputation_gained,
                ..StatDelta::default()
            },
        )?;

        Ok(PerformanceResult {
            status: "performance_complete",
            song_difficulty,
            performance_score: score,
            rewards: reward,
            player: PlayerSnapshot::from(&update.player),
        })
    });

    match &result {
        Ok(done) => info!(
            "[{}] tavern performance: +{} gold, +{} rep",
            player_id, done.rewards.gold_gained, done.rewards.reputation_gained
        ),
        Err(err) => warn!("[{}] cannot perform: {}", player_id, err),
    }
    result
}

fn readiness(tx: &StoreTx<'_>, player_id: &str) -> GameResult<(WorldRecord, SongProgress, FinalQuestReadiness)> {
    let world = tx.require_world_for_player(player_id)?;
    let progress = song_progress(tx, player_id, Some(&world))?;
    let view = FinalQuestReadiness {
        ready: progress.complete(),
        segments_collected: progress.collected.len(),
        segments_required: progress.total,
        final_monster: world.final_monster.clone(),
        rescue_target: world.rescue_target.clone(),
    };
    Ok((world, progress, view))
}

pub fn check_final_quest_ready(store: &GameStore, player_id: &str) -> GameResult<FinalQuestReadiness> {
    let (_, _, view) = store.view(|tx| readiness(tx, player_id))?;
    debug!(
        "[{}] final quest check: {}/{}",
        player_id, view.segments_collected, view.segments_required
    );
    Ok(view)
}

/// Attempt the final performance. A low score is a valid loss, not an error:
/// rewards are reported either way but only applied on victory.
pub fn complete_final_quest(store: &GameStore, player_id: &str, performance_score: f64) -> GameResult<FinalQuestOutcome> {
    let score = validate_score(performance_score)?;
    let outcome = store.transaction(player_id, |tx| {
        let (world, progress, ready) = readiness(tx, player_id)?;
        if !ready.ready {
            return Err(GameError::SegmentsIncomplete {
                collected: ready.segments_collected,
                required: ready.segments_required,
            });
        }
        let player = tx.require_player(player_id)?;
        let reward = rewards::calculate_final_quest_reward(player.level, ready.segments_collected, score);

        let player = if reward.victory {
            apply_stat_delta(
                tx,
                player_id,
                &StatDelta {
                    xp: reward.xp_gained,
                    gold: reward.gold_gained,
                    reputation: reward.reputation_gained,
                    skill: None,
                },
            )?
            .player
        } else {
            player
        };

        if let Some(song) = &progress.song {
            let now = Utc::now();
            let recorded_score = Some((score * 100.0).round() as i64);
            if reward.victory {
                tx.mark_progress_completed(player_id, ProgressType::Song, song.id, recorded_score, now)?;
            } else {
                let mut row = tx.progress_or_new(player_id, ProgressType::Song, song.id)?;
                if !row.is_completed() {
                    row.mark_in_progress(now);
                    row.score = recorded_score;
                    tx.put_progress(&row)?;
                }
            }
        }

        Ok(FinalQuestOutcome {
            status: if reward.victory { "game_complete" } else { "quest_failed" },
            victory: reward.victory,
            rescued: reward.victory.then(|| world.rescue_target.clone()),
            final_monster: world.final_monster,
            performance_score: score,
            rewards: reward,
            player: PlayerSnapshot::from(&player),
        })
    });

    match &outcome {
        Ok(done) => info!(
            "[{}] final quest {}: monster={}, xp+{}, gold+{}",
            player_id,
            if done.victory { "won" } else { "lost" },
            done.final_monster,
            done.rewards.xp_gained,
            done.rewards.gold_gained
        ),
        Err(err) => warn!("[{}] final quest refused: {}", player_id, err),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::game::generator::WorldBlueprint;
    use crate::game::services::{player, world};
    use crate::game::types::{LocationType, ProgressState};
    use crate::game::views::WorldView;
    use crate::storage::GameStoreBuilder;

    fn setup() -> (TempDir, GameStore, WorldView) {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        player::get_or_create(&store, "p1", Some("Ann")).expect("player");
        let world = world::create_world(&store, "p1", &WorldBlueprint::default_world()).expect("world");
        (dir, store, world)
    }

    fn collect_everything(store: &GameStore, world: &WorldView) {
        for location in world.locations.iter().take(4) {
            player::set_location(store, "p1", location.id).expect("move");
            let here = player::get_current_location(store, "p1").expect("location");
            for segment in here.uncollected_segments {
                collect_segment(store, "p1", segment.id).expect("collect");
            }
        }
    }

    #[test]
    fn collecting_twice_is_rejected() {
        let (_dir, store, _world) = setup();
        let here = player::get_current_location(&store, "p1").expect("location");
        let segment = here.uncollected_segments.first().expect("segment at start");

        let first = collect_segment(&store, "p1", segment.id).expect("collect");
        assert_eq!(first.segment.id, segment.id);
        assert_eq!(first.collected_count, 1);
        assert!(matches!(
            collect_segment(&store, "p1", segment.id),
            Err(GameError::AlreadyCollected)
        ));
        let after = player::get_current_location(&store, "p1").expect("location");
        assert!(after.uncollected_segments.is_empty());
    }

    #[test]
    fn collecting_elsewhere_is_rejected() {
        let (_dir, store, world) = setup();
        player::set_location(&store, "p1", world.locations[1].id).expect("move");
        let start_segment = store
            .view(|tx| {
                let location = tx.require_location(world.locations[0].id)?;
                Ok(tx.segments_at_location(&location)?[0].id)
            })
            .expect("segment");
        assert!(matches!(
            collect_segment(&store, "p1", start_segment),
            Err(GameError::LocationMismatch)
        ));
        assert!(matches!(
            collect_segment(&store, "p1", 424_242),
            Err(GameError::SegmentNotFound(424_242))
        ));
    }

    #[test]
    fn tavern_only_performance() {
        let (_dir, store, world) = setup();
        assert!(matches!(
            perform_at_tavern(&store, "p1", 1.0),
            Err(GameError::NotAtTavern)
        ));
        let tavern = world
            .locations
            .iter()
            .find(|l| l.location_type == LocationType::Tavern)
            .expect("tavern");
        player::set_location(&store, "p1", tavern.id).expect("move");
        let result = perform_at_tavern(&store, "p1", 1.0).expect("perform");
        assert_eq!(result.song_difficulty, 1);
        assert_eq!(result.rewards.gold_gained, 20);
        assert_eq!(result.player.gold, 20);
        assert_eq!(result.player.reputation, 5);
        assert!(matches!(
            perform_at_tavern(&store, "p1", 1.5),
            Err(GameError::InvalidInput(_))
        ));
    }

    #[test]
    fn inventory_tracks_collection() {
        let (_dir, store, world) = setup();
        let empty = get_inventory(&store, "p1").expect("inventory");
        assert_eq!(empty.total_segments, 4);
        assert!(!empty.can_perform_final);

        collect_everything(&store, &world);
        let full = get_inventory(&store, "p1").expect("inventory");
        assert_eq!(full.collected_count, 4);
        assert!(full.can_perform_final);
        assert_eq!(full.song_title, "The Hero's Ballad");
    }

    #[test]
    fn final_quest_needs_every_segment() {
        let (_dir, store, _world) = setup();
        let ready = check_final_quest_ready(&store, "p1").expect("check");
        assert!(!ready.ready);
        assert_eq!(ready.final_monster, "The Discord Dragon");
        assert!(matches!(
            complete_final_quest(&store, "p1", 1.0),
            Err(GameError::SegmentsIncomplete { collected: 0, required: 4 })
        ));
    }

    #[test]
    fn low_score_loses_without_applying_rewards() {
        let (_dir, store, world) = setup();
        collect_everything(&store, &world);
        let before = player::get_stats(&store, "p1").expect("stats");

        let lost = complete_final_quest(&store, "p1", 0.4).expect("attempt");
        assert!(!lost.victory);
        assert_eq!(lost.status, "quest_failed");
        assert!(lost.rewards.xp_gained > 0);
        assert_eq!(lost.rescued, None);
        assert_eq!(player::get_stats(&store, "p1").expect("stats").xp, before.xp);

        let won = complete_final_quest(&store, "p1", 1.0).expect("attempt");
        assert!(won.victory);
        assert_eq!(won.rescued.as_deref(), Some("The Royal Composer"));
        assert_eq!(won.player.xp, before.xp + won.rewards.xp_gained);

        let song_id = store
            .view(|tx| Ok(tx.require_world_for_player("p1")?.song_id))
            .expect("world")
            .expect("song");
        let row = store
            .view(|tx| tx.get_progress("p1", ProgressType::Song, song_id))
            .expect("progress")
            .expect("row");
        assert_eq!(row.state, ProgressState::Completed);
        assert_eq!(row.score, Some(100));
    }
}
