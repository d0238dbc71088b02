use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const WORLD_SCHEMA_VERSION: u8 = 1;
pub const LOCATION_SCHEMA_VERSION: u8 = 1;
pub const EXERCISE_SCHEMA_VERSION: u8 = 1;
pub const SONG_SCHEMA_VERSION: u8 = 1;
pub const SEGMENT_SCHEMA_VERSION: u8 = 1;
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;

/// Upper bound for every skill value.
pub const MAX_SKILL: u8 = 100;
/// Skill value a fresh player starts with.
pub const STARTING_SKILL: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Village,
    Tavern,
    Path,
    Dungeon,
}

impl LocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::Village => "village",
            LocationType::Tavern => "tavern",
            LocationType::Path => "path",
            LocationType::Dungeon => "dungeon",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "village" => Some(LocationType::Village),
            "tavern" => Some(LocationType::Tavern),
            "path" => Some(LocationType::Path),
            "dungeon" => Some(LocationType::Dungeon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Rhythm,
    Melody,
    Harmony,
    EarTraining,
    SightReading,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 5] = [
        ExerciseType::Rhythm,
        ExerciseType::Melody,
        ExerciseType::Harmony,
        ExerciseType::EarTraining,
        ExerciseType::SightReading,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::Rhythm => "rhythm",
            ExerciseType::Melody => "melody",
            ExerciseType::Harmony => "harmony",
            ExerciseType::EarTraining => "ear_training",
            ExerciseType::SightReading => "sight_reading",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lowered)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Rhythm,
    Melody,
    Harmony,
}

impl SkillType {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillType::Rhythm => "rhythm",
            SkillType::Melody => "melody",
            SkillType::Harmony => "harmony",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    Exercise,
    Segment,
    Song,
    Location,
}

impl ProgressType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressType::Exercise => "exercise",
            ProgressType::Segment => "segment",
            ProgressType::Song => "song",
            ProgressType::Location => "location",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    InProgress,
    Completed,
}

/// Rhythm/melody/harmony skill levels, each kept within `0..=MAX_SKILL`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillLevels {
    pub rhythm: u8,
    pub melody: u8,
    pub harmony: u8,
}

impl Default for SkillLevels {
    fn default() -> Self {
        Self {
            rhythm: STARTING_SKILL,
            melody: STARTING_SKILL,
            harmony: STARTING_SKILL,
        }
    }
}

impl SkillLevels {
    pub fn get(&self, skill: SkillType) -> u8 {
        match skill {
            SkillType::Rhythm => self.rhythm,
            SkillType::Melody => self.melody,
            SkillType::Harmony => self.harmony,
        }
    }

    /// Apply a signed delta, clamping the result to the valid skill range.
    pub fn apply(&mut self, skill: SkillType, delta: i32) {
        let current = i32::from(self.get(skill));
        let next = (current + delta).clamp(0, i32::from(MAX_SKILL)) as u8;
        match skill {
            SkillType::Rhythm => self.rhythm = next,
            SkillType::Melody => self.melody = next,
            SkillType::Harmony => self.harmony = next,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub xp: i64,
    pub gold: i64,
    pub reputation: i64,
    pub skills: SkillLevels,
    pub current_location_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level: 1,
            xp: 0,
            gold: 0,
            reputation: 0,
            skills: SkillLevels::default(),
            current_location_id: None,
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    /// Name used when a player is created without one.
    pub fn default_name(id: &str) -> String {
        let short: String = id.chars().take(8).collect();
        format!("Bard {}", short)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldRecord {
    pub id: u64,
    pub player_id: String,
    pub name: String,
    pub theme: String,
    pub story_arc: String,
    pub final_monster: String,
    pub rescue_target: String,
    /// Locations in creation order; the world owns them.
    pub location_ids: Vec<u64>,
    /// World-owned copy of the final song, once segments have been distributed.
    pub song_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationRecord {
    pub id: u64,
    pub world_id: u64,
    pub name: String,
    pub description: String,
    pub location_type: LocationType,
    pub exercise_focus: Option<ExerciseType>,
    pub order_index: u32,
    pub is_unlocked: bool,
    pub schema_version: u8,
}

impl LocationRecord {
    pub fn is_tavern(&self) -> bool {
        self.location_type == LocationType::Tavern
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseRecord {
    pub id: u64,
    pub name: String,
    pub exercise_type: ExerciseType,
    /// 1-10 scale.
    pub difficulty: u32,
    pub duration_seconds: u64,
    pub instructions: String,
    pub xp_reward: i64,
    pub gold_reward: i64,
    pub skill_bonus: Option<SkillType>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongRecord {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub difficulty: u32,
    pub is_final_song: bool,
    /// `None` for the shared template, `Some` for a world's own copy.
    pub world_id: Option<u64>,
    pub segment_ids: Vec<u64>,
    pub schema_version: u8,
}

impl SongRecord {
    pub fn total_segments(&self) -> usize {
        self.segment_ids.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentRecord {
    pub id: u64,
    pub song_id: u64,
    pub segment_index: u32,
    pub name: String,
    pub description: String,
    pub unlock_exercise_type: Option<ExerciseType>,
    pub location_id: Option<u64>,
    pub schema_version: u8,
}

/// Generic per-player progress row, unique per `(player_id, progress_type, reference_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    pub player_id: String,
    pub progress_type: ProgressType,
    pub reference_id: u64,
    pub state: ProgressState,
    pub score: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl ProgressRecord {
    pub fn new(player_id: &str, progress_type: ProgressType, reference_id: u64) -> Self {
        Self {
            player_id: player_id.to_string(),
            progress_type,
            reference_id,
            state: ProgressState::NotStarted,
            score: None,
            started_at: None,
            completed_at: None,
            schema_version: PROGRESS_SCHEMA_VERSION,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == ProgressState::Completed
    }

    /// Move to `in_progress` unless the row is already completed.
    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) {
        if self.is_completed() {
            return;
        }
        self.state = ProgressState::InProgress;
        self.started_at.get_or_insert(now);
    }

    /// Completion is terminal; repeated calls keep the first completion time.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        if !self.is_completed() {
            self.state = ProgressState::Completed;
            self.completed_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_clamp_both_ends() {
        let mut skills = SkillLevels::default();
        skills.apply(SkillType::Rhythm, 500);
        assert_eq!(skills.rhythm, MAX_SKILL);
        skills.apply(SkillType::Melody, -50);
        assert_eq!(skills.melody, 0);
        assert_eq!(skills.harmony, STARTING_SKILL);
    }

    #[test]
    fn progress_completion_never_reverts() {
        let mut row = ProgressRecord::new("p1", ProgressType::Segment, 7);
        let first = Utc::now();
        row.mark_completed(first);
        row.mark_in_progress(first + chrono::Duration::seconds(5));
        row.mark_completed(first + chrono::Duration::seconds(10));
        assert!(row.is_completed());
        assert_eq!(row.completed_at, Some(first));
    }

    #[test]
    fn enum_tags_parse_case_insensitively() {
        assert_eq!(ExerciseType::parse("Ear_Training"), Some(ExerciseType::EarTraining));
        assert_eq!(LocationType::parse(" TAVERN "), Some(LocationType::Tavern));
        assert_eq!(ExerciseType::parse("bass"), None);
    }

    #[test]
    fn records_survive_json_with_stable_tags() {
        let mut player = PlayerRecord::new("player_ann", "Ann");
        player.xp = i64::MAX;
        player.gold = -12;
        player.level = 10;
        player.skills.apply(SkillType::Melody, 90);
        player.current_location_id = Some(u64::MAX);
        let json = serde_json::to_value(&player).expect("encode");
        assert_eq!(json["skills"]["melody"], 100);
        let back: PlayerRecord = serde_json::from_value(json).expect("decode");
        assert_eq!(back, player);

        let world = WorldRecord {
            id: 3,
            player_id: "player_ann".into(),
            name: "Echo Isles".into(),
            theme: "islands of sound".into(),
            story_arc: "The tide went silent.".into(),
            final_monster: "The Hush".into(),
            rescue_target: "The Keeper".into(),
            location_ids: vec![4, 5, u64::MAX],
            song_id: Some(6),
            created_at: Utc::now(),
            schema_version: WORLD_SCHEMA_VERSION,
        };
        let back: WorldRecord =
            serde_json::from_str(&serde_json::to_string(&world).expect("encode")).expect("decode");
        assert_eq!(back, world);

        let location = LocationRecord {
            id: u64::MAX,
            world_id: 3,
            name: "Shell Tavern".into(),
            description: "Warm and loud.".into(),
            location_type: LocationType::Tavern,
            exercise_focus: Some(ExerciseType::SightReading),
            order_index: 2,
            is_unlocked: true,
            schema_version: LOCATION_SCHEMA_VERSION,
        };
        let json = serde_json::to_value(&location).expect("encode");
        assert_eq!(json["location_type"], "tavern");
        assert_eq!(json["exercise_focus"], "sight_reading");
        assert_eq!(json["id"], u64::MAX);
        let back: LocationRecord = serde_json::from_value(json).expect("decode");
        assert_eq!(back, location);

        let mut row = ProgressRecord::new("player_ann", ProgressType::Segment, 8);
        row.mark_in_progress(Utc::now());
        row.score = Some(-3);
        let json = serde_json::to_value(&row).expect("encode");
        assert_eq!(json["progress_type"], "segment");
        assert_eq!(json["state"], "in_progress");
        let back: ProgressRecord = serde_json::from_value(json).expect("decode");
        assert_eq!(back, row);

        row.mark_completed(Utc::now());
        let json = serde_json::to_value(&row).expect("encode");
        assert_eq!(json["state"], "completed");
        let back: ProgressRecord = serde_json::from_value(json).expect("decode");
        assert_eq!(back, row);

        for (kind, tag) in [
            (ProgressType::Exercise, "exercise"),
            (ProgressType::Segment, "segment"),
            (ProgressType::Song, "song"),
            (ProgressType::Location, "location"),
        ] {
            assert_eq!(serde_json::to_value(kind).expect("encode"), tag);
            assert_eq!(kind.as_str(), tag);
        }
        assert_eq!(serde_json::to_value(ProgressState::NotStarted).expect("encode"), "not_started");
        assert_eq!(serde_json::to_value(LocationType::Dungeon).expect("encode"), "dungeon");
        assert_eq!(serde_json::to_value(ExerciseType::EarTraining).expect("encode"), "ear_training");
    }

    #[test]
    fn default_name_uses_id_prefix() {
        assert_eq!(PlayerRecord::default_name("player_alexandra"), "Bard player_a");
    }
}
