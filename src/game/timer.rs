//! In-memory registry of timed exercise sessions, one per player.
//!
//! Completion is derived from the clock on every read instead of being driven
//! by a background task: a session whose elapsed time has reached its duration
//! is observed as `completed` the next time anyone looks at it. The registry is
//! constructed explicitly and shared (usually behind an `Arc`) by the services
//! that need it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::game::clock::Clock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    Waiting,
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSession {
    pub player_id: String,
    pub exercise_id: u64,
    pub exercise_name: String,
    pub duration_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub state: ExerciseState,
    pub destination_location_id: Option<u64>,
}

impl ExerciseSession {
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> f64 {
        (self.duration_seconds as f64 - self.elapsed_seconds(now)).max(0.0)
    }

    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_seconds(now) >= self.duration_seconds as f64
    }

    /// Zero-length exercises count as fully done.
    pub fn progress_percent(&self, now: DateTime<Utc>) -> f64 {
        if self.duration_seconds == 0 {
            return 100.0;
        }
        (self.elapsed_seconds(now) / self.duration_seconds as f64 * 100.0).min(100.0)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            player_id: self.player_id.clone(),
            exercise_id: self.exercise_id,
            exercise_name: self.exercise_name.clone(),
            duration_seconds: self.duration_seconds,
            elapsed_seconds: round_tenth(self.elapsed_seconds(now)),
            remaining_seconds: round_tenth(self.remaining_seconds(now)),
            progress_percent: round_tenth(self.progress_percent(now)),
            state: self.state,
            is_complete: self.is_complete(now),
            destination_location_id: self.destination_location_id,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Serializable view of a session at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub player_id: String,
    pub exercise_id: u64,
    pub exercise_name: String,
    pub duration_seconds: u64,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub progress_percent: f64,
    pub state: ExerciseState,
    pub is_complete: bool,
    pub destination_location_id: Option<u64>,
}

/// Parameters for a new session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub exercise_id: u64,
    pub exercise_name: String,
    pub duration_seconds: u64,
    pub destination_location_id: Option<u64>,
}

/// Result of [`ExerciseTimer::start_session`].
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: ExerciseSession,
    /// Session that was running before and has now been expired.
    pub abandoned: Option<ExerciseSession>,
}

/// Outcome of trying to take a finished session out of the registry.
#[derive(Debug, Clone)]
pub enum Claim {
    Claimed(ExerciseSession),
    NotReady { remaining_seconds: f64 },
    Missing,
}

pub struct ExerciseTimer {
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, ExerciseSession>>,
}

impl ExerciseTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ExerciseSession>> {
        // A panic while holding the guard cannot leave a half-written entry, so keep going.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session, expiring whatever the player had running before.
    pub fn start_session(&self, player_id: &str, request: SessionRequest) -> StartedSession {
        let session = ExerciseSession {
            player_id: player_id.to_string(),
            exercise_id: request.exercise_id,
            exercise_name: request.exercise_name,
            duration_seconds: request.duration_seconds,
            started_at: self.clock.now(),
            state: ExerciseState::InProgress,
            destination_location_id: request.destination_location_id,
        };

        let abandoned = {
            let mut sessions = self.lock();
            sessions
                .insert(player_id.to_string(), session.clone())
                .map(|mut old| {
                    old.state = ExerciseState::Expired;
                    old
                })
        };

        if let Some(old) = &abandoned {
            info!(
                "[{}] abandoned exercise '{}' for '{}'",
                player_id, old.exercise_name, session.exercise_name
            );
        }
        debug!(
            "[{}] exercise '{}' started ({}s)",
            player_id, session.exercise_name, session.duration_seconds
        );

        StartedSession { session, abandoned }
    }

    /// Current session for the player, promoted to `completed` once its time is up.
    pub fn get_session(&self, player_id: &str) -> Option<ExerciseSession> {
        self.get_session_at(player_id, self.clock.now())
    }

    fn get_session_at(&self, player_id: &str, now: DateTime<Utc>) -> Option<ExerciseSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(player_id)?;
        if session.state == ExerciseState::InProgress && session.is_complete(now) {
            session.state = ExerciseState::Completed;
        }
        Some(session.clone())
    }

    pub fn check_session(&self, player_id: &str) -> Option<SessionSnapshot> {
        let now = self.clock.now();
        let session = self.get_session_at(player_id, now)?;
        Some(session.snapshot(now))
    }

    pub fn complete_session(&self, player_id: &str) -> Option<ExerciseSession> {
        let mut session = self.lock().remove(player_id)?;
        session.state = ExerciseState::Completed;
        Some(session)
    }

    pub fn cancel_session(&self, player_id: &str) -> Option<ExerciseSession> {
        let mut session = self.lock().remove(player_id)?;
        session.state = ExerciseState::Expired;
        info!("[{}] exercise '{}' cancelled", player_id, session.exercise_name);
        Some(session)
    }

    /// True while a session is running and its timer has not yet elapsed.
    pub fn has_active_session(&self, player_id: &str) -> bool {
        self.get_session(player_id)
            .is_some_and(|s| s.state == ExerciseState::InProgress)
    }

    pub fn can_complete(&self, player_id: &str) -> bool {
        let now = self.clock.now();
        self.get_session_at(player_id, now)
            .is_some_and(|s| s.is_complete(now))
    }

    /// Remove the session only if its timer has elapsed. The check and the removal
    /// happen under one lock so two callers can never both claim the same session.
    pub fn claim_completed(&self, player_id: &str) -> Claim {
        let now = self.clock.now();
        let mut sessions = self.lock();
        match sessions.entry(player_id.to_string()) {
            Entry::Vacant(_) => Claim::Missing,
            Entry::Occupied(entry) => {
                if !entry.get().is_complete(now) {
                    return Claim::NotReady {
                        remaining_seconds: entry.get().remaining_seconds(now),
                    };
                }
                let mut session = entry.remove();
                session.state = ExerciseState::Completed;
                Claim::Claimed(session)
            }
        }
    }

    /// Put back a claimed session after a failed completion, unless the player
    /// has already started something newer.
    pub fn reinstate(&self, mut session: ExerciseSession) -> bool {
        session.state = ExerciseState::InProgress;
        match self.lock().entry(session.player_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}
