//! Reward and levelling arithmetic.
//!
//! Everything here is a pure function of its inputs. Quality and performance
//! scores are supplied by the caller and clamped to `0.0..=1.0`.

use serde::{Deserialize, Serialize};

use crate::game::types::{ExerciseRecord, SkillType};

/// Cumulative XP required to reach each level, starting at level 1.
pub const LEVEL_XP_THRESHOLDS: [i64; 10] = [0, 100, 250, 500, 850, 1300, 1850, 2500, 3250, 4100];

pub const MAX_LEVEL: u32 = LEVEL_XP_THRESHOLDS.len() as u32;

const FINAL_BASE_XP: f64 = 500.0;
const FINAL_BASE_GOLD: f64 = 200.0;
const FINAL_BASE_REPUTATION: f64 = 100.0;
const VICTORY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExerciseReward {
    pub xp_gained: i64,
    pub gold_gained: i64,
    pub skill_type: Option<SkillType>,
    pub skill_bonus: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PerformanceReward {
    pub gold_gained: i64,
    pub reputation_gained: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FinalQuestReward {
    pub xp_gained: i64,
    pub gold_gained: i64,
    pub reputation_gained: i64,
    pub segment_multiplier: f64,
    pub victory: bool,
}

fn unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

pub fn calculate_exercise_reward(
    exercise: &ExerciseRecord,
    _player_level: u32,
    completion_quality: f64,
) -> ExerciseReward {
    let quality = unit(completion_quality);
    ExerciseReward {
        xp_gained: (exercise.xp_reward as f64 * quality).round() as i64,
        gold_gained: (exercise.gold_reward as f64 * quality).round() as i64,
        skill_type: exercise.skill_bonus,
        skill_bonus: ((2.0 + exercise.difficulty as f64) * quality).round() as i32,
    }
}

/// Highest level whose threshold is at or below `total_xp`. Never below 1.
pub fn calculate_level(total_xp: i64) -> u32 {
    LEVEL_XP_THRESHOLDS
        .iter()
        .rposition(|threshold| total_xp >= *threshold)
        .map(|idx| idx as u32 + 1)
        .unwrap_or(1)
}

/// Returns `(leveled_up, new_level)`.
pub fn check_level_up(old_xp: i64, new_xp: i64) -> (bool, u32) {
    let new_level = calculate_level(new_xp);
    (new_level > calculate_level(old_xp), new_level)
}

/// Total XP needed to reach the level after `level`, or `None` at the cap.
pub fn xp_for_next_level(level: u32) -> Option<i64> {
    LEVEL_XP_THRESHOLDS.get(level as usize).copied()
}

pub fn calculate_performance_reward(
    song_difficulty: u32,
    _player_level: u32,
    performance_score: f64,
) -> PerformanceReward {
    let score = unit(performance_score);
    let difficulty = song_difficulty as f64;
    PerformanceReward {
        gold_gained: (10.0 * difficulty * 2.0 * score).round() as i64,
        reputation_gained: (5.0 * difficulty * score).round() as i64,
    }
}

pub fn segment_multiplier(segments_collected: usize) -> f64 {
    (0.8 + segments_collected as f64 * 0.175).min(1.5)
}

pub fn calculate_final_quest_reward(
    _player_level: u32,
    segments_collected: usize,
    performance_score: f64,
) -> FinalQuestReward {
    let score = unit(performance_score);
    let multiplier = segment_multiplier(segments_collected);
    let factor = multiplier * score;
    FinalQuestReward {
        xp_gained: (FINAL_BASE_XP * factor).round() as i64,
        gold_gained: (FINAL_BASE_GOLD * factor).round() as i64,
        reputation_gained: (FINAL_BASE_REPUTATION * factor).round() as i64,
        segment_multiplier: multiplier,
        victory: score >= VICTORY_THRESHOLD,
    }
}
