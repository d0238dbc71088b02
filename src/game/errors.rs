use thiserror::Error;

/// Broad category of a [`GameError`], used by callers that need to branch on the
/// kind of failure rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Unavailable,
    InvalidInput,
    ExternalFailure,
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code placed on error responses.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ExternalFailure => "external_failure",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Errors produced by the game engine, its services and the storage layer.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("player not found: {0}")]
    PlayerNotFound(String),

    #[error("world not found for player {0}")]
    WorldNotFound(String),

    #[error("location not found: {0}")]
    LocationNotFound(u64),

    #[error("segment not found: {0}")]
    SegmentNotFound(u64),

    #[error("exercise not found: {0}")]
    ExerciseNotFound(u64),

    #[error("player has no current location")]
    NoCurrentLocation,

    #[error("no active exercise")]
    NoActiveExercise,

    /// Timer has not elapsed yet; carries the time left so clients can poll sensibly.
    #[error("exercise not yet complete, {remaining_seconds:.0}s remaining")]
    ExerciseNotYetComplete { remaining_seconds: f64 },

    #[error("segment already collected")]
    AlreadyCollected,

    #[error("you must be at the segment's location to collect it")]
    LocationMismatch,

    #[error("you must be at a tavern to perform")]
    NotAtTavern,

    #[error("not all segments collected ({collected}/{required})")]
    SegmentsIncomplete { collected: usize, required: usize },

    #[error("player {0} already has a world")]
    WorldAlreadyExists(String),

    #[error("no exercises available")]
    NoExercisesAvailable,

    #[error("song {song_id} already has a segment at index {segment_index}")]
    DuplicateSegmentIndex { song_id: u64, segment_index: u32 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator (world generator, mentor) failed.
    #[error("external failure: {0}")]
    External(String),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::PlayerNotFound(_)
            | GameError::WorldNotFound(_)
            | GameError::LocationNotFound(_)
            | GameError::SegmentNotFound(_)
            | GameError::ExerciseNotFound(_)
            | GameError::NoCurrentLocation => ErrorKind::NotFound,
            GameError::NoActiveExercise
            | GameError::ExerciseNotYetComplete { .. }
            | GameError::AlreadyCollected
            | GameError::LocationMismatch
            | GameError::NotAtTavern
            | GameError::SegmentsIncomplete { .. }
            | GameError::WorldAlreadyExists(_)
            | GameError::DuplicateSegmentIndex { .. } => ErrorKind::InvalidState,
            GameError::NoExercisesAvailable => ErrorKind::Unavailable,
            GameError::InvalidInput(_) => ErrorKind::InvalidInput,
            GameError::External(_) => ErrorKind::ExternalFailure,
            GameError::Sled(_)
            | GameError::Bincode(_)
            | GameError::Io(_)
            | GameError::SchemaMismatch { .. } => ErrorKind::Storage,
        }
    }

    /// Seconds left on the exercise timer, for the not-yet-complete error only.
    pub fn remaining_seconds(&self) -> Option<f64> {
        match self {
            GameError::ExerciseNotYetComplete { remaining_seconds } => Some(*remaining_seconds),
            _ => None,
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        assert_eq!(GameError::PlayerNotFound("p".into()).kind(), ErrorKind::NotFound);
        assert_eq!(GameError::AlreadyCollected.kind(), ErrorKind::InvalidState);
        assert_eq!(GameError::NoExercisesAvailable.kind(), ErrorKind::Unavailable);
        assert_eq!(GameError::External("boom".into()).kind().code(), "external_failure");
    }

    #[test]
    fn not_yet_complete_reports_remaining() {
        let err = GameError::ExerciseNotYetComplete {
            remaining_seconds: 12.4,
        };
        assert_eq!(err.remaining_seconds(), Some(12.4));
        assert_eq!(err.to_string(), "exercise not yet complete, 12s remaining");
        assert_eq!(GameError::NotAtTavern.remaining_seconds(), None);
    }
}
