//! Built-in exercise library and the final-song template inserted into a fresh store.
//!
//! Records come back with `id == 0`; the store assigns real ids on insert.

use crate::game::types::{
    ExerciseRecord, ExerciseType, SegmentRecord, SkillType, SongRecord, EXERCISE_SCHEMA_VERSION,
    SEGMENT_SCHEMA_VERSION, SONG_SCHEMA_VERSION,
};

pub const FINAL_SONG_TITLE: &str = "The Hero's Ballad";

#[allow(clippy::too_many_arguments)]
fn exercise(
    name: &str,
    exercise_type: ExerciseType,
    difficulty: u32,
    duration_seconds: u64,
    xp_reward: i64,
    gold_reward: i64,
    skill_bonus: SkillType,
    instructions: &str,
) -> ExerciseRecord {
    ExerciseRecord {
        id: 0,
        name: name.to_string(),
        exercise_type,
        difficulty,
        duration_seconds,
        instructions: instructions.to_string(),
        xp_reward,
        gold_reward,
        skill_bonus: Some(skill_bonus),
        schema_version: EXERCISE_SCHEMA_VERSION,
    }
}

pub fn exercise_library() -> Vec<ExerciseRecord> {
    use ExerciseType::*;
    vec![
        exercise(
            "Steady Beat March",
            Rhythm,
            1,
            30,
            10,
            5,
            SkillType::Rhythm,
            "Tap along to a steady beat. Keep the tempo even as you march in place.",
        ),
        exercise(
            "Clap and Count",
            Rhythm,
            2,
            45,
            15,
            8,
            SkillType::Rhythm,
            "Clap on beats 1 and 3 while counting 1-2-3-4 out loud.",
        ),
        exercise(
            "Syncopation Challenge",
            Rhythm,
            4,
            60,
            25,
            12,
            SkillType::Rhythm,
            "Clap on the off-beats (the 'and' of each count). Feel the groove!",
        ),
        exercise(
            "Polyrhythm Practice",
            Rhythm,
            6,
            90,
            40,
            20,
            SkillType::Rhythm,
            "Tap 3 beats with your right hand while tapping 2 beats with your left.",
        ),
        exercise(
            "Scale Ascent",
            Melody,
            1,
            30,
            10,
            5,
            SkillType::Melody,
            "Sing or hum a major scale going up: Do-Re-Mi-Fa-Sol-La-Ti-Do.",
        ),
        exercise(
            "Interval Jumps",
            Melody,
            3,
            60,
            20,
            10,
            SkillType::Melody,
            "Sing an interval: start on any note, jump up a third, then a fifth.",
        ),
        exercise(
            "Melodic Contour",
            Melody,
            4,
            60,
            25,
            12,
            SkillType::Melody,
            "Listen to a short melody and trace its shape in the air with your finger.",
        ),
        exercise(
            "Improvisation Journey",
            Melody,
            7,
            120,
            50,
            25,
            SkillType::Melody,
            "Make up a melody using only the five notes of the pentatonic scale.",
        ),
        exercise(
            "Chord Recognition",
            Harmony,
            2,
            45,
            15,
            8,
            SkillType::Harmony,
            "Listen to chords and decide whether each is major (bright) or minor (dark).",
        ),
        exercise(
            "Root Note Hunt",
            Harmony,
            3,
            60,
            20,
            10,
            SkillType::Harmony,
            "When you hear a chord, sing or hum its lowest note (the root).",
        ),
        exercise(
            "Chord Progressions",
            Harmony,
            5,
            90,
            35,
            18,
            SkillType::Harmony,
            "Listen to a I-IV-V-I progression and feel where it wants to resolve.",
        ),
        exercise(
            "Voice Leading",
            Harmony,
            8,
            120,
            60,
            30,
            SkillType::Harmony,
            "Sing the top note of each chord as they change, moving as smoothly as you can.",
        ),
        exercise(
            "Note Matching",
            EarTraining,
            1,
            30,
            10,
            5,
            SkillType::Melody,
            "Listen to a note and match it with your voice. Hold it steady.",
        ),
        exercise(
            "Interval Identification",
            EarTraining,
            4,
            60,
            25,
            12,
            SkillType::Melody,
            "Listen to two notes and name the interval between them.",
        ),
        exercise(
            "Melody Memory",
            EarTraining,
            5,
            90,
            35,
            18,
            SkillType::Melody,
            "Listen to a four-note melody, then sing it back from memory.",
        ),
        exercise(
            "Note Names",
            SightReading,
            1,
            30,
            10,
            5,
            SkillType::Melody,
            "Look at notes on the staff and say their letter names out loud.",
        ),
        exercise(
            "Rhythm Reading",
            SightReading,
            3,
            60,
            20,
            10,
            SkillType::Rhythm,
            "Clap the rhythm written on the page, minding quarter and eighth notes.",
        ),
    ]
}

/// The final song and its segments, not yet bound to any world or location.
pub fn final_song_template() -> (SongRecord, Vec<SegmentRecord>) {
    let song = SongRecord {
        id: 0,
        title: FINAL_SONG_TITLE.to_string(),
        description: "A legendary song passed down through generations, said to calm even the fiercest monsters."
            .to_string(),
        difficulty: 3,
        is_final_song: true,
        world_id: None,
        segment_ids: Vec::new(),
        schema_version: SONG_SCHEMA_VERSION,
    };

    let parts = [
        (
            "The Opening Verse",
            "A gentle introduction that speaks of a hero's humble beginnings.",
            ExerciseType::Melody,
        ),
        (
            "The Rising Chorus",
            "The melody builds as the hero faces a first challenge.",
            ExerciseType::Rhythm,
        ),
        (
            "The Bridge of Trials",
            "A complex passage for the hero's darkest hour.",
            ExerciseType::Harmony,
        ),
        (
            "The Final Refrain",
            "A triumphant close that brings every voice together.",
            ExerciseType::EarTraining,
        ),
    ];

    let segments = parts
        .iter()
        .enumerate()
        .map(|(idx, (name, description, unlock))| SegmentRecord {
            id: 0,
            song_id: 0,
            segment_index: idx as u32,
            name: name.to_string(),
            description: description.to_string(),
            unlock_exercise_type: Some(*unlock),
            location_id: None,
            schema_version: SEGMENT_SCHEMA_VERSION,
        })
        .collect();

    (song, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn library_covers_every_exercise_type() {
        let library = exercise_library();
        assert_eq!(library.len(), 17);
        for kind in ExerciseType::ALL {
            assert!(library.iter().any(|e| e.exercise_type == kind), "{:?}", kind);
        }
        assert!(library.iter().all(|e| (1..=10).contains(&e.difficulty)));
    }

    #[test]
    fn template_indices_are_unique() {
        let (song, segments) = final_song_template();
        assert!(song.is_final_song);
        let indices: HashSet<u32> = segments.iter().map(|s| s.segment_index).collect();
        assert_eq!(indices.len(), segments.len());
        assert_eq!(segments.len(), 4);
    }
}
