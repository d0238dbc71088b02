//! Durable game state on top of sled.
//!
//! Everything lives in a single `game` tree under prefixed keys:
//!
//! ```text
//! player:{player_id}                       PlayerRecord
//! player_world:{player_id}                 world id
//! world:{world_id}                         WorldRecord
//! location:{location_id}                   LocationRecord
//! song:{song_id}                           SongRecord
//! segment:{segment_id}                     SegmentRecord
//! exercise:{exercise_id}                   ExerciseRecord
//! progress:{player_id}:{type}:{reference}  ProgressRecord
//! meta:*                                   seed bookkeeping
//! ```
//!
//! Numeric ids are zero-padded so prefix scans come back in id order.
//! All mutation goes through [`GameStore::transaction`], which commits every
//! write of the closure as one atomic batch or none of them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

use crate::game::errors::GameResult;
use crate::game::seed;

mod exercises;
mod players;
mod progress;
mod tx;
mod worlds;

pub use tx::{StoreTx, StoredRecord};

const TREE_GAME: &str = "game";
const LOCK_STRIPES: usize = 32;
const SEED_PARTITION: &str = "__seed__";

pub(crate) mod keys {
    use crate::game::types::ProgressType;

    pub const SEEDED: &[u8] = b"meta:seeded";
    pub const FINAL_SONG_TEMPLATE: &[u8] = b"meta:final_song_template";
    pub const EXERCISE_PREFIX: &[u8] = b"exercise:";

    pub fn player(id: &str) -> Vec<u8> {
        format!("player:{}", id).into_bytes()
    }

    pub fn player_world(player_id: &str) -> Vec<u8> {
        format!("player_world:{}", player_id).into_bytes()
    }

    pub fn world(id: u64) -> Vec<u8> {
        format!("world:{:020}", id).into_bytes()
    }

    pub fn location(id: u64) -> Vec<u8> {
        format!("location:{:020}", id).into_bytes()
    }

    pub fn song(id: u64) -> Vec<u8> {
        format!("song:{:020}", id).into_bytes()
    }

    pub fn segment(id: u64) -> Vec<u8> {
        format!("segment:{:020}", id).into_bytes()
    }

    pub fn exercise(id: u64) -> Vec<u8> {
        format!("exercise:{:020}", id).into_bytes()
    }

    pub fn progress_prefix(player_id: &str, kind: ProgressType) -> Vec<u8> {
        format!("progress:{}:{}:", player_id, kind.as_str()).into_bytes()
    }

    pub fn progress(player_id: &str, kind: ProgressType, reference_id: u64) -> Vec<u8> {
        format!("progress:{}:{}:{:020}", player_id, kind.as_str(), reference_id).into_bytes()
    }
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GameStoreBuilder {
    path: PathBuf,
    seed: bool,
}

impl GameStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed: true,
        }
    }

    /// Skip inserting the exercise library and song template.
    pub fn without_seed(mut self) -> Self {
        self.seed = false;
        self
    }

    pub fn open(self) -> GameResult<GameStore> {
        GameStore::open_with_options(self.path, self.seed)
    }
}

pub struct GameStore {
    db: sled::Db,
    tree: sled::Tree,
    stripes: Vec<Mutex<()>>,
}

impl GameStore {
    /// Open (or create) the store rooted at `path`, seeding it on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> GameResult<Self> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed: bool) -> GameResult<Self> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let tree = db.open_tree(TREE_GAME)?;
        let store = Self {
            db,
            tree,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        };

        if seed {
            store.seed_if_needed()?;
        }

        Ok(store)
    }

    fn stripe(&self, partition: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        partition.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// Transactions sharing a `partition` (the player id) run one at a time.
    /// When `f` returns `Ok` its writes are applied as a single batch and
    /// flushed; when it returns `Err` nothing it wrote is kept. Do not open a
    /// second transaction from inside `f`.
    pub fn transaction<T, F>(&self, partition: &str, f: F) -> GameResult<T>
    where
        F: FnOnce(&mut StoreTx<'_>) -> GameResult<T>,
    {
        let _guard = self
            .stripe(partition)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut tx = StoreTx::new(&self.db, &self.tree);
        let value = f(&mut tx)?;
        let (batch, writes) = tx.into_batch();
        if writes > 0 {
            self.tree.apply_batch(batch)?;
            self.tree.flush()?;
            debug!("[{}] committed {} write(s)", partition, writes);
        }
        Ok(value)
    }

    /// Read-only access; no lock is taken and nothing is committed.
    pub fn view<T, F>(&self, f: F) -> GameResult<T>
    where
        F: FnOnce(&StoreTx<'_>) -> GameResult<T>,
    {
        let tx = StoreTx::new(&self.db, &self.tree);
        f(&tx)
    }

    /// Insert the exercise library and final-song template once.
    /// Returns the number of records written (0 when already seeded).
    pub fn seed_if_needed(&self) -> GameResult<usize> {
        let inserted = self.transaction(SEED_PARTITION, |tx| {
            if tx.get_raw(keys::SEEDED)?.is_some() {
                return Ok(0);
            }
            let mut inserted = 0usize;
            for exercise in seed::exercise_library() {
                tx.create_exercise(exercise)?;
                inserted += 1;
            }
            let (song, segments) = seed::final_song_template();
            let segment_count = segments.len();
            let song = tx.create_song(song, segments)?;
            tx.insert_raw(keys::FINAL_SONG_TEMPLATE.to_vec(), song.id.to_be_bytes().to_vec());
            inserted += 1 + segment_count;
            tx.insert_raw(keys::SEEDED.to_vec(), vec![1]);
            Ok(inserted)
        })?;
        if inserted > 0 {
            info!("seeded game store with {} records", inserted);
        }
        Ok(inserted)
    }
}
