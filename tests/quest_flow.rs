mod common;

use balladeer::game::errors::GameError;
use balladeer::game::services::{player, quest, world};
use balladeer::game::types::ProgressType;
use common::{location_id, road_world, Harness};

#[test]
fn tavern_performance_needs_a_tavern() {
    let h = Harness::new();
    h.new_player("p1");
    let realm = world::create_world(h.store(), "p1", &road_world()).expect("world");

    assert!(matches!(
        quest::perform_at_tavern(h.store(), "p1", 1.0),
        Err(GameError::NotAtTavern)
    ));

    h.arrive("p1", location_id(&realm, "Rest Tavern"));
    let gold_before = player::get_stats(h.store(), "p1").expect("stats").gold;
    let show = quest::perform_at_tavern(h.store(), "p1", 1.0).expect("perform");
    assert_eq!(show.song_difficulty, 1);
    assert!(show.rewards.gold_gained > 0);
    assert_eq!(show.player.gold, gold_before + show.rewards.gold_gained);

    assert!(matches!(
        quest::perform_at_tavern(h.store(), "p1", 1.5),
        Err(GameError::InvalidInput(_))
    ));
}

/// Walk the road world collecting every segment.
fn collect_everything(h: &Harness) {
    let realm = world::get_world(h.store(), "p1").expect("world");
    for stop in ["Start Village", "Drum Road", "Rest Tavern"] {
        let here = player::get_current_location(h.store(), "p1").expect("location");
        if here.location.name != stop {
            h.arrive("p1", location_id(&realm, stop));
        }
        let here = player::get_current_location(h.store(), "p1").expect("location");
        for segment in here.uncollected_segments {
            quest::collect_segment(h.store(), "p1", segment.id).expect("collect");
        }
    }
}

#[test]
fn failed_final_quest_changes_nothing_but_progress() {
    let h = Harness::new();
    h.new_player("p1");
    world::create_world(h.store(), "p1", &road_world()).expect("world");

    assert!(matches!(
        quest::complete_final_quest(h.store(), "p1", 1.0),
        Err(GameError::SegmentsIncomplete { collected: 0, required: 4 })
    ));

    collect_everything(&h);
    let inventory = quest::get_inventory(h.store(), "p1").expect("inventory");
    assert_eq!(inventory.collected_count, 4);
    assert!(inventory.can_perform_final);
    assert!(quest::check_final_quest_ready(h.store(), "p1").expect("ready").ready);

    let before = player::get_stats(h.store(), "p1").expect("stats");
    let lost = quest::complete_final_quest(h.store(), "p1", 0.4).expect("attempt");
    assert!(!lost.victory);
    assert_eq!(lost.status, "quest_failed");
    assert!(lost.rewards.xp_gained > 0);
    assert_eq!(lost.rescued, None);
    let after = player::get_stats(h.store(), "p1").expect("stats");
    assert_eq!(after.xp, before.xp);
    assert_eq!(after.gold, before.gold);

    let won = quest::complete_final_quest(h.store(), "p1", 0.9).expect("attempt");
    assert!(won.victory);
    assert_eq!(won.rescued.as_deref(), Some("The Lost Build"));
    let after_win = player::get_stats(h.store(), "p1").expect("stats");
    assert_eq!(after_win.xp, before.xp + won.rewards.xp_gained);

    let song_rows = h
        .store()
        .view(|tx| tx.list_progress("p1", ProgressType::Song))
        .expect("progress");
    assert_eq!(song_rows.len(), 1);
    assert!(song_rows[0].is_completed());
    assert_eq!(song_rows[0].score, Some(90));
}

#[test]
fn segments_are_collected_once_and_only_in_place() {
    let h = Harness::new();
    h.new_player("p1");
    let realm = world::create_world(h.store(), "p1", &road_world()).expect("world");

    let here = player::get_current_location(h.store(), "p1").expect("location");
    let local = here.uncollected_segments[0].id;
    let first = quest::collect_segment(h.store(), "p1", local).expect("collect");
    assert_eq!(first.collected_count, 1);
    assert!(matches!(
        quest::collect_segment(h.store(), "p1", local),
        Err(GameError::AlreadyCollected)
    ));

    // A segment bound to the road cannot be picked up from the village.
    h.arrive("p1", location_id(&realm, "Drum Road"));
    let road_segment = player::get_current_location(h.store(), "p1")
        .expect("location")
        .uncollected_segments[0]
        .id;
    h.arrive("p1", location_id(&realm, "Start Village"));
    assert!(matches!(
        quest::collect_segment(h.store(), "p1", road_segment),
        Err(GameError::LocationMismatch)
    ));
}
