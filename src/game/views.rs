//! Serializable payloads returned by the services and sent to clients.
//!
//! Records are the on-disk shape; these are the wire shape. Each entity gets
//! one conversion here instead of ad hoc maps built in the services.

use serde::Serialize;

use crate::game::rewards::{self, ExerciseReward, FinalQuestReward, PerformanceReward};
use crate::game::timer::SessionSnapshot;
use crate::game::types::{
    ExerciseRecord, ExerciseType, LocationRecord, LocationType, PlayerRecord, SegmentRecord,
    SkillLevels, WorldRecord,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerSnapshot {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub xp: i64,
    /// Total XP at which the next level is reached; absent at the level cap.
    pub xp_for_next_level: Option<i64>,
    pub gold: i64,
    pub reputation: i64,
    pub skills: SkillLevels,
    pub current_location_id: Option<u64>,
}

impl From<&PlayerRecord> for PlayerSnapshot {
    fn from(player: &PlayerRecord) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            level: player.level,
            xp: player.xp,
            xp_for_next_level: rewards::xp_for_next_level(player.level),
            gold: player.gold,
            reputation: player.reputation,
            skills: player.skills,
            current_location_id: player.current_location_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationSummary {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub location_type: LocationType,
    pub exercise_focus: Option<ExerciseType>,
    pub order_index: u32,
    pub is_unlocked: bool,
}

impl From<&LocationRecord> for LocationSummary {
    fn from(location: &LocationRecord) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            description: location.description.clone(),
            location_type: location.location_type,
            exercise_focus: location.exercise_focus,
            order_index: location.order_index,
            is_unlocked: location.is_unlocked,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentView {
    pub id: u64,
    pub song_id: u64,
    pub segment_index: u32,
    pub name: String,
    pub description: String,
    pub unlock_exercise_type: Option<ExerciseType>,
    pub location_id: Option<u64>,
}

impl From<&SegmentRecord> for SegmentView {
    fn from(segment: &SegmentRecord) -> Self {
        Self {
            id: segment.id,
            song_id: segment.song_id,
            segment_index: segment.segment_index,
            name: segment.name.clone(),
            description: segment.description.clone(),
            unlock_exercise_type: segment.unlock_exercise_type,
            location_id: segment.location_id,
        }
    }
}

/// Where the player stands and what they can do from there.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationView {
    pub location: LocationSummary,
    pub uncollected_segments: Vec<SegmentView>,
    pub available_destinations: Vec<LocationSummary>,
    pub can_travel: bool,
    pub is_tavern: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorldView {
    pub id: u64,
    pub name: String,
    pub theme: String,
    pub story_arc: String,
    pub final_monster: String,
    pub rescue_target: String,
    pub locations: Vec<LocationSummary>,
}

impl WorldView {
    pub fn new(world: &WorldRecord, locations: &[LocationRecord]) -> Self {
        Self {
            id: world.id,
            name: world.name.clone(),
            theme: world.theme.clone(),
            story_arc: world.story_arc.clone(),
            final_monster: world.final_monster.clone(),
            rescue_target: world.rescue_target.clone(),
            locations: locations.iter().map(LocationSummary::from).collect(),
        }
    }
}

/// Result of looking up a player's world.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum WorldLookup {
    NeedsGeneration { needs_generation: bool },
    Existing(WorldView),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExerciseView {
    pub id: u64,
    pub name: String,
    pub exercise_type: ExerciseType,
    pub difficulty: u32,
    pub duration_seconds: u64,
    pub instructions: String,
    pub xp_reward: i64,
    pub gold_reward: i64,
}

impl From<&ExerciseRecord> for ExerciseView {
    fn from(exercise: &ExerciseRecord) -> Self {
        Self {
            id: exercise.id,
            name: exercise.name.clone(),
            exercise_type: exercise.exercise_type,
            difficulty: exercise.difficulty,
            duration_seconds: exercise.duration_seconds,
            instructions: exercise.instructions.clone(),
            xp_reward: exercise.xp_reward,
            gold_reward: exercise.gold_reward,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TravelStarted {
    pub status: &'static str,
    pub exercise: ExerciseView,
    pub session: SessionSnapshot,
    pub destination: LocationSummary,
    /// Name of the exercise that was running before, if this one replaced it.
    pub abandoned_exercise: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExerciseCompletion {
    pub status: &'static str,
    pub exercise_name: String,
    pub rewards: ExerciseReward,
    pub new_location_id: Option<u64>,
    pub unlocked_location: Option<LocationSummary>,
    pub level_up: bool,
    pub new_level: Option<u32>,
    pub player: PlayerSnapshot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentCollected {
    pub status: &'static str,
    pub segment: SegmentView,
    pub collected_count: usize,
    pub total_segments: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Inventory {
    pub song_title: String,
    pub collected_segments: Vec<SegmentView>,
    pub collected_count: usize,
    pub total_segments: usize,
    pub can_perform_final: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceResult {
    pub status: &'static str,
    pub song_difficulty: u32,
    pub performance_score: f64,
    pub rewards: PerformanceReward,
    pub player: PlayerSnapshot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinalQuestReadiness {
    pub ready: bool,
    pub segments_collected: usize,
    pub segments_required: usize,
    pub final_monster: String,
    pub rescue_target: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinalQuestOutcome {
    pub status: &'static str,
    pub victory: bool,
    pub final_monster: String,
    /// Only named on victory.
    pub rescued: Option<String>,
    pub performance_score: f64,
    pub rewards: FinalQuestReward,
    pub player: PlayerSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_enum_tags_as_snake_case() {
        let mut player = PlayerRecord::new("player_bo", "Bo");
        player.current_location_id = Some(3);
        let json = serde_json::to_value(PlayerSnapshot::from(&player)).expect("json");
        assert_eq!(json["level"], 1);
        assert_eq!(json["xp_for_next_level"], 100);
        assert_eq!(json["skills"]["melody"], 10);

        let segment = SegmentRecord {
            id: 1,
            song_id: 2,
            segment_index: 0,
            name: "Verse".into(),
            description: String::new(),
            unlock_exercise_type: Some(ExerciseType::EarTraining),
            location_id: None,
            schema_version: 1,
        };
        let json = serde_json::to_value(SegmentView::from(&segment)).expect("json");
        assert_eq!(json["unlock_exercise_type"], "ear_training");
    }

    #[test]
    fn world_lookup_is_untagged() {
        let json = serde_json::to_value(WorldLookup::NeedsGeneration {
            needs_generation: true,
        })
        .expect("json");
        assert_eq!(json, serde_json::json!({ "needs_generation": true }));
    }
}
