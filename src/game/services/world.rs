//! World lookup, creation from a blueprint, and sequential unlocking.

use log::{debug, info};

use crate::game::errors::{GameError, GameResult};
use crate::game::generator::WorldBlueprint;
use crate::game::types::{
    LocationRecord, LocationType, PlayerRecord, SongRecord, WorldRecord, LOCATION_SCHEMA_VERSION,
    WORLD_SCHEMA_VERSION,
};
use crate::game::views::{WorldLookup, WorldView};
use crate::logutil::escape_log;
use crate::storage::{GameStore, StoreTx};

/// Unlock the lowest-ordered locked location of `world`, if any.
pub(crate) fn unlock_next_in_tx(
    tx: &mut StoreTx<'_>,
    world: &WorldRecord,
) -> GameResult<Option<LocationRecord>> {
    let locations = tx.world_locations(world)?;
    let Some(mut next) = locations.into_iter().find(|l| !l.is_unlocked) else {
        return Ok(None);
    };
    next.is_unlocked = true;
    tx.put_location(&next)?;
    Ok(Some(next))
}

pub fn get_or_generate(store: &GameStore, player_id: &str) -> GameResult<WorldLookup> {
    store.view(|tx| match tx.world_for_player(player_id)? {
        Some(world) => {
            let locations = tx.world_locations(&world)?;
            Ok(WorldLookup::Existing(WorldView::new(&world, &locations)))
        }
        None => Ok(WorldLookup::NeedsGeneration {
            needs_generation: true,
        }),
    })
}

pub fn get_world(store: &GameStore, player_id: &str) -> GameResult<WorldView> {
    store.view(|tx| {
        let world = tx.require_world_for_player(player_id)?;
        let locations = tx.world_locations(&world)?;
        Ok(WorldView::new(&world, &locations))
    })
}

/// Copy the final-song template into a song owned by `world_id` and bind its
/// segments round-robin to the non-dungeon locations.
fn instantiate_world_song(
    tx: &mut StoreTx<'_>,
    world_id: u64,
    locations: &[LocationRecord],
) -> GameResult<Option<SongRecord>> {
    let Some(template) = tx.final_song_template()? else {
        return Ok(None);
    };
    let mut segments = tx.song_segments(&template)?;
    let hosts: Vec<&LocationRecord> = locations
        .iter()
        .filter(|l| l.location_type != LocationType::Dungeon)
        .collect();
    for (idx, segment) in segments.iter_mut().enumerate() {
        segment.location_id = hosts.get(idx % hosts.len().max(1)).map(|l| l.id);
    }

    let mut song = template.clone();
    song.world_id = Some(world_id);
    let song = tx.create_song(song, segments)?;
    Ok(Some(song))
}

/// Create the player's world, its locations and song in one transaction and
/// put the player at the first location.
pub fn create_world(store: &GameStore, player_id: &str, blueprint: &WorldBlueprint) -> GameResult<WorldView> {
    if blueprint.locations.is_empty() {
        return Err(GameError::InvalidInput("a world needs at least one location".into()));
    }

    let view = store.transaction(player_id, |tx| {
        let mut player = match tx.get_player(player_id)? {
            Some(player) => player,
            None => PlayerRecord::new(player_id, &PlayerRecord::default_name(player_id)),
        };

        let mut world = tx.create_world_record(WorldRecord {
            id: 0,
            player_id: player_id.to_string(),
            name: blueprint.name.clone(),
            theme: blueprint.theme.clone(),
            story_arc: blueprint.story_arc.clone(),
            final_monster: blueprint.final_monster.clone(),
            rescue_target: blueprint.rescue_target.clone(),
            location_ids: Vec::new(),
            song_id: None,
            created_at: chrono::Utc::now(),
            schema_version: WORLD_SCHEMA_VERSION,
        })?;

        let mut locations = Vec::with_capacity(blueprint.locations.len());
        for (idx, plan) in blueprint.locations.iter().enumerate() {
            let location = tx.create_location(LocationRecord {
                id: 0,
                world_id: world.id,
                name: plan.name.clone(),
                description: plan.description.clone(),
                location_type: plan.location_type,
                exercise_focus: plan.exercise_focus,
                order_index: idx as u32,
                is_unlocked: idx == 0,
                schema_version: LOCATION_SCHEMA_VERSION,
            })?;
            world.location_ids.push(location.id);
            locations.push(location);
        }

        world.song_id = instantiate_world_song(tx, world.id, &locations)?.map(|s| s.id);
        tx.put_world(&world)?;

        player.current_location_id = locations.first().map(|l| l.id);
        tx.put_player(&player)?;

        Ok(WorldView::new(&world, &locations))
    })?;

    info!(
        "[{}] world '{}' created with {} locations",
        player_id,
        escape_log(&view.name),
        view.locations.len()
    );
    Ok(view)
}

/// Returns whether a location was unlocked.
pub fn unlock_next_location(store: &GameStore, player_id: &str) -> GameResult<bool> {
    let unlocked = store.transaction(player_id, |tx| {
        let world = tx.require_world_for_player(player_id)?;
        unlock_next_in_tx(tx, &world)
    })?;
    match &unlocked {
        Some(location) => info!("[{}] unlocked '{}'", player_id, location.name),
        None => debug!("[{}] every location already unlocked", player_id),
    }
    Ok(unlocked.is_some())
}
