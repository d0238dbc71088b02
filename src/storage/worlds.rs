use std::collections::HashSet;

use crate::game::errors::{GameError, GameResult};
use crate::game::types::{
    LocationRecord, SegmentRecord, SongRecord, WorldRecord, LOCATION_SCHEMA_VERSION,
    SEGMENT_SCHEMA_VERSION, SONG_SCHEMA_VERSION, WORLD_SCHEMA_VERSION,
};
use crate::storage::keys;
use crate::storage::tx::{StoreTx, StoredRecord};

impl StoredRecord for WorldRecord {
    const ENTITY: &'static str = "world";
    const SCHEMA_VERSION: u8 = WORLD_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoredRecord for LocationRecord {
    const ENTITY: &'static str = "location";
    const SCHEMA_VERSION: u8 = LOCATION_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoredRecord for SongRecord {
    const ENTITY: &'static str = "song";
    const SCHEMA_VERSION: u8 = SONG_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

impl StoredRecord for SegmentRecord {
    const ENTITY: &'static str = "segment";
    const SCHEMA_VERSION: u8 = SEGMENT_SCHEMA_VERSION;

    fn schema_version(&self) -> u8 {
        self.schema_version
    }
}

fn decode_id(bytes: &[u8]) -> Option<u64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

impl StoreTx<'_> {
    // worlds

    /// Store a new world for its player. A player owns at most one world.
    pub fn create_world_record(&mut self, mut world: WorldRecord) -> GameResult<WorldRecord> {
        if self.get_raw(&keys::player_world(&world.player_id))?.is_some() {
            return Err(GameError::WorldAlreadyExists(world.player_id.clone()));
        }
        world.id = self.next_id()?;
        world.schema_version = WORLD_SCHEMA_VERSION;
        self.insert_raw(
            keys::player_world(&world.player_id),
            world.id.to_be_bytes().to_vec(),
        );
        self.put_world(&world)?;
        Ok(world)
    }

    pub fn put_world(&mut self, world: &WorldRecord) -> GameResult<()> {
        self.put(keys::world(world.id), world)
    }

    pub fn get_world(&self, world_id: u64) -> GameResult<Option<WorldRecord>> {
        self.get(&keys::world(world_id))
    }

    pub fn world_for_player(&self, player_id: &str) -> GameResult<Option<WorldRecord>> {
        let Some(raw) = self.get_raw(&keys::player_world(player_id))? else {
            return Ok(None);
        };
        match decode_id(&raw) {
            Some(world_id) => self.get_world(world_id),
            None => Ok(None),
        }
    }

    pub fn require_world_for_player(&self, player_id: &str) -> GameResult<WorldRecord> {
        self.world_for_player(player_id)?
            .ok_or_else(|| GameError::WorldNotFound(player_id.to_string()))
    }

    // locations

    pub fn create_location(&mut self, mut location: LocationRecord) -> GameResult<LocationRecord> {
        location.id = self.next_id()?;
        location.schema_version = LOCATION_SCHEMA_VERSION;
        self.put_location(&location)?;
        Ok(location)
    }

    pub fn put_location(&mut self, location: &LocationRecord) -> GameResult<()> {
        self.put(keys::location(location.id), location)
    }

    pub fn get_location(&self, location_id: u64) -> GameResult<Option<LocationRecord>> {
        self.get(&keys::location(location_id))
    }

    pub fn require_location(&self, location_id: u64) -> GameResult<LocationRecord> {
        self.get_location(location_id)?
            .ok_or(GameError::LocationNotFound(location_id))
    }

    /// Locations of a world ordered by `(order_index, id)`.
    pub fn world_locations(&self, world: &WorldRecord) -> GameResult<Vec<LocationRecord>> {
        let mut locations = Vec::with_capacity(world.location_ids.len());
        for id in &world.location_ids {
            if let Some(location) = self.get_location(*id)? {
                locations.push(location);
            }
        }
        locations.sort_by_key(|l| (l.order_index, l.id));
        Ok(locations)
    }

    /// Returns false when the location was already unlocked.
    pub fn unlock_location(&mut self, location_id: u64) -> GameResult<bool> {
        let mut location = self.require_location(location_id)?;
        if location.is_unlocked {
            return Ok(false);
        }
        location.is_unlocked = true;
        self.put_location(&location)?;
        Ok(true)
    }

    // songs and segments

    /// Store a song and its segments, assigning ids to both.
    pub fn create_song(
        &mut self,
        mut song: SongRecord,
        segments: Vec<SegmentRecord>,
    ) -> GameResult<SongRecord> {
        song.id = self.next_id()?;
        song.schema_version = SONG_SCHEMA_VERSION;
        song.segment_ids.clear();

        let mut seen = HashSet::new();
        let mut ordered = segments;
        ordered.sort_by_key(|s| s.segment_index);
        for mut segment in ordered {
            if !seen.insert(segment.segment_index) {
                return Err(GameError::DuplicateSegmentIndex {
                    song_id: song.id,
                    segment_index: segment.segment_index,
                });
            }
            segment.id = self.next_id()?;
            segment.song_id = song.id;
            segment.schema_version = SEGMENT_SCHEMA_VERSION;
            self.put_segment(&segment)?;
            song.segment_ids.push(segment.id);
        }

        self.put(keys::song(song.id), &song)?;
        Ok(song)
    }

    pub fn get_song(&self, song_id: u64) -> GameResult<Option<SongRecord>> {
        self.get(&keys::song(song_id))
    }

    /// The shared final-song template inserted by seeding.
    pub fn final_song_template(&self) -> GameResult<Option<SongRecord>> {
        let Some(raw) = self.get_raw(keys::FINAL_SONG_TEMPLATE)? else {
            return Ok(None);
        };
        match decode_id(&raw) {
            Some(song_id) => self.get_song(song_id),
            None => Ok(None),
        }
    }

    pub fn put_segment(&mut self, segment: &SegmentRecord) -> GameResult<()> {
        self.put(keys::segment(segment.id), segment)
    }

    pub fn get_segment(&self, segment_id: u64) -> GameResult<Option<SegmentRecord>> {
        self.get(&keys::segment(segment_id))
    }

    pub fn require_segment(&self, segment_id: u64) -> GameResult<SegmentRecord> {
        self.get_segment(segment_id)?
            .ok_or(GameError::SegmentNotFound(segment_id))
    }

    /// Segments of a song by ascending `segment_index`.
    pub fn song_segments(&self, song: &SongRecord) -> GameResult<Vec<SegmentRecord>> {
        let mut segments = Vec::with_capacity(song.segment_ids.len());
        for id in &song.segment_ids {
            segments.push(self.require_segment(*id)?);
        }
        segments.sort_by_key(|s| s.segment_index);
        Ok(segments)
    }

    /// The world's final song, if segments have been distributed.
    pub fn world_song(&self, world: &WorldRecord) -> GameResult<Option<SongRecord>> {
        match world.song_id {
            Some(id) => self.get_song(id),
            None => Ok(None),
        }
    }

    /// Segments of the owning world's song that are bound to `location`.
    pub fn segments_at_location(&self, location: &LocationRecord) -> GameResult<Vec<SegmentRecord>> {
        let Some(world) = self.get_world(location.world_id)? else {
            return Ok(Vec::new());
        };
        let Some(song) = self.world_song(&world)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .song_segments(&song)?
            .into_iter()
            .filter(|s| s.location_id == Some(location.id))
            .collect())
    }
}
