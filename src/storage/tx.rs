use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::game::errors::{GameError, GameResult};

/// A durable record with a schema version checked on every read.
pub trait StoredRecord: Serialize + DeserializeOwned {
    const ENTITY: &'static str;
    const SCHEMA_VERSION: u8;

    fn schema_version(&self) -> u8;
}

/// Unit of work against the game tree.
///
/// Reads see the tree as it was when the transaction started plus this
/// transaction's own writes. Writes stay in the overlay until
/// [`crate::storage::GameStore::transaction`] commits them as a single batch.
pub struct StoreTx<'a> {
    db: &'a sled::Db,
    tree: &'a sled::Tree,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> StoreTx<'a> {
    pub(crate) fn new(db: &'a sled::Db, tree: &'a sled::Tree) -> Self {
        Self {
            db,
            tree,
            overlay: BTreeMap::new(),
        }
    }

    pub fn next_id(&self) -> GameResult<u64> {
        // generate_id hands out 0 first; keep 0 free so it never looks like an unset id
        let mut id = self.db.generate_id()?;
        if id == 0 {
            id = self.db.generate_id()?;
        }
        Ok(id)
    }

    pub fn get_raw(&self, key: &[u8]) -> GameResult<Option<Vec<u8>>> {
        if let Some(pending) = self.overlay.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    pub fn insert_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    /// All live entries under `prefix`, in key order, with pending writes applied.
    pub fn scan_prefix_raw(&self, prefix: &[u8]) -> GameResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (key, value) = entry?;
            merged.insert(key.to_vec(), value.to_vec());
        }
        let pending = self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, value) in pending {
            match value {
                Some(bytes) => {
                    merged.insert(key.clone(), bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn get<R: StoredRecord>(&self, key: &[u8]) -> GameResult<Option<R>> {
        let Some(bytes) = self.get_raw(key)? else {
            return Ok(None);
        };
        decode(&bytes).map(Some)
    }

    pub fn put<R: StoredRecord>(&mut self, key: Vec<u8>, record: &R) -> GameResult<()> {
        let bytes = bincode::serialize(record)?;
        self.insert_raw(key, bytes);
        Ok(())
    }

    pub fn scan<R: StoredRecord>(&self, prefix: &[u8]) -> GameResult<Vec<R>> {
        self.scan_prefix_raw(prefix)?
            .iter()
            .map(|(_, bytes)| decode(bytes))
            .collect()
    }

    pub(crate) fn into_batch(self) -> (sled::Batch, usize) {
        let mut batch = sled::Batch::default();
        let count = self.overlay.len();
        for (key, value) in self.overlay {
            match value {
                Some(bytes) => batch.insert(key, bytes),
                None => batch.remove(key),
            }
        }
        (batch, count)
    }
}

fn decode<R: StoredRecord>(bytes: &[u8]) -> GameResult<R> {
    let record: R = bincode::deserialize(bytes)?;
    if record.schema_version() != R::SCHEMA_VERSION {
        return Err(GameError::SchemaMismatch {
            entity: R::ENTITY,
            expected: R::SCHEMA_VERSION,
            found: record.schema_version(),
        });
    }
    Ok(record)
}
