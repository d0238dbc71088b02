use crate::game::errors::{GameError, GameResult};
use crate::game::types::{PlayerRecord, PLAYER_SCHEMA_VERSION};
use crate::storage::keys;
use crate::storage::tx::{StoreTx, StoredRecord};

impl StoredRecord for PlayerRecord {
    const ENTITY: &'static str = "player";
    const SCHEMA_VERSION: u8 = PLAYER_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoreTx<'_> {
    pub fn get_player(&self, player_id: &str) -> GameResult<Option<PlayerRecord>> {
        self.get(&keys::player(player_id))
    }

    pub fn require_player(&self, player_id: &str) -> GameResult<PlayerRecord> {
        self.get_player(player_id)?
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
    }

    /// Insert or update a player record.
    pub fn put_player(&mut self, player: &PlayerRecord) -> GameResult<()> {
        let mut player = player.clone();
        player.schema_version = PLAYER_SCHEMA_VERSION;
        player.touch();
        self.put(keys::player(&player.id), &player)
    }

    pub fn set_player_location(&mut self, player_id: &str, location_id: u64) -> GameResult<PlayerRecord> {
        let mut player = self.require_player(player_id)?;
        player.current_location_id = Some(location_id);
        self.put_player(&player)?;
        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use crate::game::types::SkillType;
    use crate::storage::GameStoreBuilder;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn player_round_trip_preserves_fields() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).without_seed().open().expect("store");
        let mut player = PlayerRecord::new("player_alice", "Alice");
        player.xp = 260;
        player.level = 3;
        player.gold = -4;
        player.reputation = 17;
        player.skills.apply(SkillType::Harmony, 35);
        player.current_location_id = Some(42);
        store.transaction("player_alice", |tx| tx.put_player(&player)).expect("put");

        let fetched = store
            .view(|tx| tx.require_player("player_alice"))
            .expect("get");
        assert_eq!(fetched.name, "Alice");
        assert_eq!(fetched.xp, 260);
        assert_eq!(fetched.level, 3);
        assert_eq!(fetched.gold, -4);
        assert_eq!(fetched.reputation, 17);
        assert_eq!(fetched.skills, player.skills);
        assert_eq!(fetched.current_location_id, Some(42));
        assert_eq!(fetched.created_at, player.created_at);
    }

    #[test]
    fn missing_player_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).without_seed().open().expect("store");
        let err = store.view(|tx| tx.require_player("ghost")).expect_err("missing");
        assert!(matches!(err, GameError::PlayerNotFound(id) if id == "ghost"));
    }
}
