mod common;

use balladeer::game::services::{player, quest, world};
use balladeer::game::types::{LocationType, ProgressState, ProgressType};
use balladeer::storage::GameStoreBuilder;
use common::road_world;
use tempfile::TempDir;

#[test]
fn state_survives_reopening_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("game");

    let (world_id, segment_id, player_before) = {
        let store = GameStoreBuilder::new(&path).open().expect("store");
        player::get_or_create(&store, "p1", Some("Ann")).expect("player");
        let realm = world::create_world(&store, "p1", &road_world()).expect("world");
        let here = player::get_current_location(&store, "p1").expect("location");
        let segment_id = here.uncollected_segments[0].id;
        quest::collect_segment(&store, "p1", segment_id).expect("collect");
        let player = store.view(|tx| tx.require_player("p1")).expect("player");
        (realm.id, segment_id, player)
    };

    let store = GameStoreBuilder::new(&path).open().expect("reopen");
    assert_eq!(store.seed_if_needed().expect("seed"), 0);

    let player_after = store.view(|tx| tx.require_player("p1")).expect("player");
    assert_eq!(player_after, player_before);

    let realm = world::get_world(&store, "p1").expect("world");
    assert_eq!(realm.id, world_id);
    assert_eq!(realm.locations.len(), 4);
    assert_eq!(realm.locations[2].location_type, LocationType::Tavern);
    assert!(realm.locations[0].is_unlocked);
    assert!(!realm.locations[1].is_unlocked);

    let rows = store
        .view(|tx| tx.list_progress("p1", ProgressType::Segment))
        .expect("progress");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reference_id, segment_id);
    assert_eq!(rows[0].state, ProgressState::Completed);
    assert!(rows[0].completed_at.is_some());
}
