use crate::game::errors::{GameError, GameResult};
use crate::game::types::{ExerciseRecord, ExerciseType, EXERCISE_SCHEMA_VERSION};
use crate::storage::keys;
use crate::storage::tx::{StoreTx, StoredRecord};

impl StoredRecord for ExerciseRecord {
    const ENTITY: &'static str = "exercise";
    const SCHEMA_VERSION: u8 = EXERCISE_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoreTx<'_> {
    /// Assign an id and store a new exercise.
    pub fn create_exercise(&mut self, mut exercise: ExerciseRecord) -> GameResult<ExerciseRecord> {
        exercise.id = self.next_id()?;
        exercise.schema_version = EXERCISE_SCHEMA_VERSION;
        self.put(keys::exercise(exercise.id), &exercise)?;
        Ok(exercise)
    }

    pub fn get_exercise(&self, exercise_id: u64) -> GameResult<Option<ExerciseRecord>> {
        self.get(&keys::exercise(exercise_id))
    }

    pub fn require_exercise(&self, exercise_id: u64) -> GameResult<ExerciseRecord> {
        self.get_exercise(exercise_id)?
            .ok_or(GameError::ExerciseNotFound(exercise_id))
    }

    pub fn list_exercises(&self) -> GameResult<Vec<ExerciseRecord>> {
        self.scan(keys::EXERCISE_PREFIX)
    }

    /// Exercises of `kind` (any kind when `None`) with difficulty in `min..=max`.
    pub fn exercises_matching(
        &self,
        kind: Option<ExerciseType>,
        min_difficulty: u32,
        max_difficulty: u32,
    ) -> GameResult<Vec<ExerciseRecord>> {
        Ok(self
            .list_exercises()?
            .into_iter()
            .filter(|e| kind.map_or(true, |k| e.exercise_type == k))
            .filter(|e| (min_difficulty..=max_difficulty).contains(&e.difficulty))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::GameStoreBuilder;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn filters_by_type_and_difficulty() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let rhythm = store
            .view(|tx| tx.exercises_matching(Some(ExerciseType::Rhythm), 1, 3))
            .expect("query");
        let names: Vec<_> = rhythm.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Steady Beat March", "Clap and Count"]);

        let hard = store.view(|tx| tx.exercises_matching(None, 8, 10)).expect("query");
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].name, "Voice Leading");
    }
}
