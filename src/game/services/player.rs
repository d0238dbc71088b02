//! Player creation, stats and the "where am I" view.

use log::{debug, info};

use crate::game::errors::{GameError, GameResult};
use crate::game::rewards;
use crate::game::types::{PlayerRecord, ProgressType, SkillType};
use crate::game::views::{LocationSummary, LocationView, PlayerSnapshot, SegmentView};
use crate::logutil::escape_log;
use crate::storage::{GameStore, StoreTx};
use crate::validation::validate_display_name;

/// Signed changes applied to a player's stats in one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatDelta {
    pub xp: i64,
    pub gold: i64,
    pub reputation: i64,
    pub skill: Option<(SkillType, i32)>,
}

#[derive(Debug, Clone)]
pub struct StatUpdate {
    pub player: PlayerRecord,
    pub leveled_up: bool,
}

/// Apply `delta` inside an open transaction. Skills stay clamped and the level
/// only ever moves up, following the XP table.
pub(crate) fn apply_stat_delta(
    tx: &mut StoreTx<'_>,
    player_id: &str,
    delta: &StatDelta,
) -> GameResult<StatUpdate> {
    let mut player = tx.require_player(player_id)?;
    let old_xp = player.xp;
    player.xp = player.xp.saturating_add(delta.xp);
    player.gold = player.gold.saturating_add(delta.gold);
    player.reputation = player.reputation.saturating_add(delta.reputation);
    if let Some((skill, amount)) = delta.skill {
        player.skills.apply(skill, amount);
    }

    let (crossed, new_level) = rewards::check_level_up(old_xp, player.xp);
    let leveled_up = crossed && new_level > player.level;
    if leveled_up {
        player.level = new_level;
    }

    tx.put_player(&player)?;
    Ok(StatUpdate { player, leveled_up })
}

/// Return the player, creating one with default stats on first contact.
pub fn get_or_create(store: &GameStore, player_id: &str, name: Option<&str>) -> GameResult<PlayerRecord> {
    if player_id.trim().is_empty() {
        return Err(GameError::InvalidInput("player id must not be empty".into()));
    }
    store.transaction(player_id, |tx| {
        if let Some(existing) = tx.get_player(player_id)? {
            return Ok(existing);
        }
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => {
                validate_display_name(n).map_err(|e| GameError::InvalidInput(e.to_string()))?
            }
            _ => PlayerRecord::default_name(player_id),
        };
        let player = PlayerRecord::new(player_id, &name);
        tx.put_player(&player)?;
        info!("[{}] new player '{}'", player_id, escape_log(&name));
        Ok(player)
    })
}

pub fn get_stats(store: &GameStore, player_id: &str) -> GameResult<PlayerSnapshot> {
    let player = store.view(|tx| tx.require_player(player_id))?;
    Ok(PlayerSnapshot::from(&player))
}

pub fn update_stats(store: &GameStore, player_id: &str, delta: &StatDelta) -> GameResult<StatUpdate> {
    store.transaction(player_id, |tx| apply_stat_delta(tx, player_id, delta))
}

/// Place the player somewhere without any travel checks.
pub fn set_location(store: &GameStore, player_id: &str, location_id: u64) -> GameResult<PlayerRecord> {
    store.transaction(player_id, |tx| tx.set_player_location(player_id, location_id))
}

pub fn get_current_location(store: &GameStore, player_id: &str) -> GameResult<LocationView> {
    store.view(|tx| {
        let player = tx.require_player(player_id)?;
        let location_id = player.current_location_id.ok_or(GameError::NoCurrentLocation)?;
        let location = tx.require_location(location_id)?;

        let collected = tx.completed_references(player_id, ProgressType::Segment)?;
        let uncollected_segments: Vec<SegmentView> = tx
            .segments_at_location(&location)?
            .iter()
            .filter(|s| !collected.contains(&s.id))
            .map(SegmentView::from)
            .collect();

        let siblings = match tx.get_world(location.world_id)? {
            Some(world) => tx.world_locations(&world)?,
            None => Vec::new(),
        };
        let mut available_destinations: Vec<LocationSummary> = siblings
            .iter()
            .filter(|l| l.is_unlocked && l.id != location.id)
            .map(LocationSummary::from)
            .collect();
        if let Some(next) = siblings.iter().find(|l| !l.is_unlocked) {
            if next.id != location.id {
                available_destinations.push(LocationSummary::from(next));
            }
        }

        debug!(
            "[{}] at '{}' with {} destination(s)",
            player_id,
            location.name,
            available_destinations.len()
        );

        Ok(LocationView {
            is_tavern: location.is_tavern(),
            can_travel: !available_destinations.is_empty(),
            location: LocationSummary::from(&location),
            uncollected_segments,
            available_destinations,
        })
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::game::types::{MAX_SKILL, STARTING_SKILL};
    use crate::storage::GameStoreBuilder;

    fn store() -> (TempDir, GameStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).without_seed().open().expect("store");
        (dir, store)
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (_dir, store) = store();
        let first = get_or_create(&store, "player_ann", Some("Ann")).expect("create");
        assert_eq!(first.level, 1);
        assert_eq!(first.skills.rhythm, STARTING_SKILL);
        assert_eq!((first.xp, first.gold, first.reputation), (0, 0, 0));

        let second = get_or_create(&store, "player_ann", Some("Someone Else")).expect("get");
        assert_eq!(second.name, "Ann");
        assert_eq!(second.created_at, first.created_at);

        let unnamed = get_or_create(&store, "player_zed", None).expect("create");
        assert_eq!(unnamed.name, "Bard player_z");
    }

    #[test]
    fn given_names_follow_display_rules() {
        let (_dir, store) = store();
        let spaced = get_or_create(&store, "p1", Some("  Jöran the Bold ")).expect("create");
        assert_eq!(spaced.name, "Jöran the Bold");
        assert!(matches!(
            get_or_create(&store, "p2", Some("bad\u{7}name")),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            get_or_create(&store, "p3", Some("Admin")),
            Err(GameError::InvalidInput(_))
        ));
        assert!(store.view(|tx| tx.get_player("p2")).expect("read").is_none());
    }

    #[test]
    fn update_stats_levels_and_clamps() {
        let (_dir, store) = store();
        get_or_create(&store, "p1", None).expect("create");
        let update = update_stats(
            &store,
            "p1",
            &StatDelta {
                xp: 260,
                gold: 5,
                reputation: 2,
                skill: Some((SkillType::Harmony, 500)),
            },
        )
        .expect("update");
        assert!(update.leveled_up);
        assert_eq!(update.player.level, 3);
        assert_eq!(update.player.skills.harmony, MAX_SKILL);

        let quiet = update_stats(&store, "p1", &StatDelta::default()).expect("update");
        assert!(!quiet.leveled_up);
        assert_eq!(get_stats(&store, "p1").expect("stats").level, 3);
    }

    #[test]
    fn huge_deltas_saturate() {
        let (_dir, store) = store();
        get_or_create(&store, "p1", None).expect("create");
        let big = StatDelta {
            xp: i64::MAX,
            gold: i64::MAX,
            reputation: i64::MIN,
            skill: None,
        };
        update_stats(&store, "p1", &big).expect("first");
        let update = update_stats(&store, "p1", &big).expect("second");
        assert_eq!(update.player.xp, i64::MAX);
        assert_eq!(update.player.gold, i64::MAX);
        assert_eq!(update.player.reputation, i64::MIN);
        assert_eq!(update.player.level, rewards::MAX_LEVEL);
    }

    #[test]
    fn missing_player_errors() {
        let (_dir, store) = store();
        assert!(matches!(
            get_stats(&store, "nobody"),
            Err(GameError::PlayerNotFound(_))
        ));
        assert!(matches!(
            update_stats(&store, "nobody", &StatDelta::default()),
            Err(GameError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn location_requires_a_position() {
        let (_dir, store) = store();
        get_or_create(&store, "p1", None).expect("create");
        assert!(matches!(
            get_current_location(&store, "p1"),
            Err(GameError::NoCurrentLocation)
        ));
        set_location(&store, "p1", 77).expect("set");
        assert!(matches!(
            get_current_location(&store, "p1"),
            Err(GameError::LocationNotFound(77))
        ));
    }
}
