use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::game::errors::GameResult;
use crate::game::types::{ProgressRecord, ProgressType, PROGRESS_SCHEMA_VERSION};
use crate::storage::keys;
use crate::storage::tx::{StoreTx, StoredRecord};

impl StoredRecord for ProgressRecord {
    const ENTITY: &'static str = "progress";
    const SCHEMA_VERSION: u8 = PROGRESS_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoreTx<'_> {
    pub fn get_progress(
        &self,
        player_id: &str,
        kind: ProgressType,
        reference_id: u64,
    ) -> GameResult<Option<ProgressRecord>> {
        self.get(&keys::progress(player_id, kind, reference_id))
    }

    /// The existing row, or a fresh `not_started` one (not yet stored).
    pub fn progress_or_new(
        &self,
        player_id: &str,
        kind: ProgressType,
        reference_id: u64,
    ) -> GameResult<ProgressRecord> {
        Ok(self
            .get_progress(player_id, kind, reference_id)?
            .unwrap_or_else(|| ProgressRecord::new(player_id, kind, reference_id)))
    }

    pub fn put_progress(&mut self, record: &ProgressRecord) -> GameResult<()> {
        let key = keys::progress(&record.player_id, record.progress_type, record.reference_id);
        self.put(key, record)
    }

    /// Create or update the row and move it to `completed`.
    pub fn mark_progress_completed(
        &mut self,
        player_id: &str,
        kind: ProgressType,
        reference_id: u64,
        score: Option<i64>,
        now: DateTime<Utc>,
    ) -> GameResult<ProgressRecord> {
        let mut row = self.progress_or_new(player_id, kind, reference_id)?;
        row.mark_completed(now);
        if score.is_some() {
            row.score = score;
        }
        self.put_progress(&row)?;
        Ok(row)
    }

    pub fn list_progress(&self, player_id: &str, kind: ProgressType) -> GameResult<Vec<ProgressRecord>> {
        self.scan(&keys::progress_prefix(player_id, kind))
    }

    /// Reference ids of every completed row of `kind` for the player.
    pub fn completed_references(&self, player_id: &str, kind: ProgressType) -> GameResult<BTreeSet<u64>> {
        Ok(self
            .list_progress(player_id, kind)?
            .into_iter()
            .filter(ProgressRecord::is_completed)
            .map(|row| row.reference_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::game::types::ProgressState;
    use crate::storage::GameStoreBuilder;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn one_row_per_key_and_completion_sticks() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).without_seed().open().expect("store");
        let now = Utc::now();
        store
            .transaction("p1", |tx| {
                let mut row = tx.progress_or_new("p1", ProgressType::Segment, 5)?;
                row.mark_in_progress(now);
                tx.put_progress(&row)?;
                tx.mark_progress_completed("p1", ProgressType::Segment, 5, None, now)?;
                tx.mark_progress_completed("p1", ProgressType::Segment, 6, Some(3), now)
            })
            .expect("write");

        let rows = store
            .view(|tx| tx.list_progress("p1", ProgressType::Segment))
            .expect("list");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.state == ProgressState::Completed));
        assert_eq!(rows[1].score, Some(3));

        let done = store
            .view(|tx| tx.completed_references("p1", ProgressType::Segment))
            .expect("refs");
        assert_eq!(done.into_iter().collect::<Vec<_>>(), vec![5, 6]);
        let other = store
            .view(|tx| tx.completed_references("p1", ProgressType::Song))
            .expect("refs");
        assert!(other.is_empty());
    }

    #[test]
    fn progress_round_trip_preserves_fields() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).without_seed().open().expect("store");
        let mut row = ProgressRecord::new("p2", ProgressType::Song, 9);
        row.mark_in_progress(Utc::now());
        row.score = Some(40);
        store.transaction("p2", |tx| tx.put_progress(&row)).expect("put");
        let fetched = store
            .view(|tx| tx.get_progress("p2", ProgressType::Song, 9))
            .expect("get");
        assert_eq!(fetched, Some(row));
    }
}
