//! Per-connection session and request router.
//!
//! A session starts unauthenticated; only `status` and `authenticate` are
//! served until a login succeeds. After that every request is routed to the
//! matching game service and the outcome is turned into a [`ServerMessage`].
//! Handling is synchronous; the listener runs it on the blocking pool.

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;

use crate::game::errors::{ErrorKind, GameError, GameResult};
use crate::game::generator::WorldBlueprint;
use crate::game::services::{exercise, player, quest, world};
use crate::game::views::{LocationSummary, LocationView, PlayerSnapshot, SegmentView, WorldLookup, WorldView};
use crate::logutil::escape_log;
use crate::server::auth::{self, Login};
use crate::server::context::GameContext;
use crate::server::mentor::{game_state_summary, MentorRequest, MentorToolbox};
use crate::server::messages::{ClientRequest, MessageType, RequestType, ServerMessage};
use crate::validation::{parse_frame, sanitize_chat};

/// Pick a destination by name: exact (case-insensitive) match first, then a
/// unique prefix.
pub fn match_destination<'a>(
    destinations: &'a [LocationSummary],
    query: &str,
) -> GameResult<&'a LocationSummary> {
    let wanted = query.trim().to_lowercase();
    if wanted.is_empty() {
        return Err(GameError::InvalidInput("destination required".into()));
    }
    if let Some(exact) = destinations.iter().find(|d| d.name.to_lowercase() == wanted) {
        return Ok(exact);
    }
    let names = |list: &[&LocationSummary]| list.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ");
    let prefixed: Vec<&LocationSummary> = destinations
        .iter()
        .filter(|d| d.name.to_lowercase().starts_with(&wanted))
        .collect();
    match prefixed.as_slice() {
        [only] => Ok(*only),
        [] => {
            let all: Vec<&LocationSummary> = destinations.iter().collect();
            Err(GameError::InvalidInput(format!(
                "Unknown destination '{}'. Available: {}",
                query.trim(),
                names(&all)
            )))
        }
        many => Err(GameError::InvalidInput(format!(
            "Destination '{}' is ambiguous: {}",
            query.trim(),
            names(many)
        ))),
    }
}

/// Location payload with the player's collection progress attached.
#[derive(Debug, Serialize)]
struct LocationState {
    #[serde(flatten)]
    view: LocationView,
    collected_segments: Vec<SegmentView>,
    total_segments: usize,
}

pub struct GameSession {
    id: String,
    ctx: GameContext,
    login: Option<Login>,
}

impl GameSession {
    pub fn new(ctx: GameContext, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ctx,
            login: None,
        }
    }

    pub fn player_id(&self) -> Option<&str> {
        self.login.as_ref().map(|l| l.player_id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.is_some()
    }

    /// Parse one raw frame and handle it.
    pub fn handle_line(&mut self, line: &str) -> Vec<ServerMessage> {
        match parse_frame::<ClientRequest>(line, self.ctx.config.server.max_frame_bytes) {
            Ok(request) => self.handle(request),
            Err(e) => {
                debug!("[{}] bad frame: {}", self.id, e);
                vec![ServerMessage::invalid_input(format!("Invalid message: {e}"))]
            }
        }
    }

    pub fn handle(&mut self, request: ClientRequest) -> Vec<ServerMessage> {
        match request.kind {
            RequestType::Authenticate => return self.authenticate(&request),
            RequestType::Status => return vec![self.status()],
            _ => {}
        }
        let Some(login) = self.login.clone() else {
            return vec![ServerMessage::error(
                ErrorKind::InvalidState,
                "Please authenticate first. Send type='authenticate' with username and password.",
            )];
        };

        debug!("[{}] {:?} request", login.player_id, request.kind);
        match self.route(&login, &request) {
            Ok(reply) => vec![reply],
            Err(err) => {
                match err.kind() {
                    ErrorKind::Storage | ErrorKind::ExternalFailure => {
                        error!("[{}] {:?} failed: {}", login.player_id, request.kind, err)
                    }
                    _ => warn!("[{}] {:?} rejected: {}", login.player_id, request.kind, err),
                }
                vec![ServerMessage::from(&err)]
            }
        }
    }

    fn route(&self, login: &Login, request: &ClientRequest) -> GameResult<ServerMessage> {
        let pid = login.player_id.as_str();
        match request.kind {
            RequestType::Chat => self.chat(login, &request.content),
            RequestType::World => self.world(login),
            RequestType::Location => self.location(pid),
            RequestType::Player => {
                let stats = player::get_stats(&self.ctx.store, pid)?;
                Ok(ServerMessage::new(
                    MessageType::PlayerState,
                    format!("Stats for {}", stats.name),
                    &stats,
                ))
            }
            RequestType::Travel => self.travel(pid, request),
            RequestType::Exercise => self.exercise(pid, &request.content),
            RequestType::Collect => {
                let segment_id = request
                    .data_u64("segment_id")
                    .or_else(|| request.content.trim().parse().ok())
                    .ok_or_else(|| GameError::InvalidInput("segment_id required in data".into()))?;
                let collected = quest::collect_segment(&self.ctx.store, pid, segment_id)?;
                Ok(ServerMessage::new(
                    MessageType::SegmentCollected,
                    format!("You learned '{}'!", collected.segment.name),
                    &collected,
                ))
            }
            RequestType::Perform => {
                let result = quest::perform_at_tavern(&self.ctx.store, pid, self.score(request))?;
                Ok(ServerMessage::new(
                    MessageType::PerformanceResult,
                    format!(
                        "The crowd cheers! +{} gold, +{} reputation",
                        result.rewards.gold_gained, result.rewards.reputation_gained
                    ),
                    &result,
                ))
            }
            RequestType::FinalQuest => self.final_quest(pid, request),
            RequestType::Inventory => {
                let inventory = quest::get_inventory(&self.ctx.store, pid)?;
                Ok(ServerMessage::new(
                    MessageType::InventoryUpdate,
                    format!(
                        "Segments collected: {}/{}",
                        inventory.collected_count, inventory.total_segments
                    ),
                    &inventory,
                ))
            }
            RequestType::Unknown | RequestType::Authenticate | RequestType::Status => {
                Err(GameError::InvalidInput("Unknown message type".into()))
            }
        }
    }

    fn score(&self, request: &ClientRequest) -> f64 {
        request
            .data_f64("score")
            .unwrap_or(self.ctx.config.game.default_performance_score)
    }

    fn status(&self) -> ServerMessage {
        let active_exercise = self
            .player_id()
            .is_some_and(|pid| self.ctx.timer.has_active_session(pid));
        let content = if self.is_authenticated() {
            "Connected and authenticated"
        } else {
            "Connected, not authenticated"
        };
        ServerMessage::new(
            MessageType::Status,
            content,
            &json!({
                "status": "ok",
                "session_id": self.id,
                "authenticated": self.is_authenticated(),
                "player_id": self.player_id(),
                "active_exercise": active_exercise,
                "active_sessions": self.ctx.timer.active_count(),
            }),
        )
    }

    fn authenticate(&mut self, request: &ClientRequest) -> Vec<ServerMessage> {
        let username = request.data_str("username").unwrap_or_default();
        let password = request.data_str("password").unwrap_or_default();
        let login = match auth::authenticate(&self.ctx.config.auth, username, password) {
            Ok(login) => login,
            Err(e) => {
                warn!("[{}] failed login for '{}': {}", self.id, escape_log(username), e);
                return vec![ServerMessage::auth_failed(e.to_string())];
            }
        };

        let record = match player::get_or_create(&self.ctx.store, &login.player_id, Some(&login.name)) {
            Ok(record) => record,
            Err(e) => {
                error!("[{}] could not load player {}: {}", self.id, login.player_id, e);
                return vec![ServerMessage::auth_failed(format!("Failed to create player: {e}"))];
            }
        };
        info!(
            "[{}] authenticated as {}{}",
            self.id,
            login.player_id,
            if login.guest { " (guest)" } else { "" }
        );

        let mut replies = vec![ServerMessage::new(
            MessageType::AuthSuccess,
            format!("Welcome, {}! Your mentor awaits.", record.name),
            &json!({
                "player_id": login.player_id,
                "guest": login.guest,
                "player": PlayerSnapshot::from(&record),
            }),
        )];
        self.login = Some(login.clone());

        let needs_world = matches!(
            world::get_or_generate(&self.ctx.store, &login.player_id),
            Ok(WorldLookup::NeedsGeneration { .. })
        );
        if needs_world {
            replies.push(ServerMessage::new(
                MessageType::WorldGenerating,
                "A new realm is being woven just for you...",
                &json!({ "status": "generating" }),
            ));
            replies.push(self.world(&login).unwrap_or_else(|e| ServerMessage::from(&e)));
        }
        replies
    }

    /// Ask the generator for a blueprint, falling back to the default world
    /// when it fails or produces something unusable.
    fn generate_blueprint(&self, login: &Login) -> WorldBlueprint {
        let generated = self
            .ctx
            .generator
            .generate(&login.player_id, &login.name)
            .and_then(WorldBlueprint::normalize);
        match generated {
            Ok(blueprint) => blueprint,
            Err(e) => {
                error!(
                    "[{}] world generation failed, using the default world: {:#}",
                    login.player_id, e
                );
                WorldBlueprint::default_world()
            }
        }
    }

    fn world(&self, login: &Login) -> GameResult<ServerMessage> {
        let view = match world::get_or_generate(&self.ctx.store, &login.player_id)? {
            WorldLookup::Existing(view) => view,
            WorldLookup::NeedsGeneration { .. } => {
                info!("[{}] generating a new world", login.player_id);
                let blueprint = self.generate_blueprint(login);
                match world::create_world(&self.ctx.store, &login.player_id, &blueprint) {
                    Ok(view) => view,
                    // Another connection of the same player got there first.
                    Err(GameError::WorldAlreadyExists(_)) => world::get_world(&self.ctx.store, &login.player_id)?,
                    Err(e) => return Err(e),
                }
            }
        };
        Ok(world_state(&view))
    }

    fn location(&self, pid: &str) -> GameResult<ServerMessage> {
        let view = player::get_current_location(&self.ctx.store, pid)?;
        let inventory = quest::get_inventory(&self.ctx.store, pid)?;
        Ok(ServerMessage::new(
            MessageType::LocationState,
            format!("You are at {}", view.location.name),
            &LocationState {
                view,
                collected_segments: inventory.collected_segments,
                total_segments: inventory.total_segments,
            },
        ))
    }

    fn travel(&self, pid: &str, request: &ClientRequest) -> GameResult<ServerMessage> {
        let destination_id = match request.data_u64("destination_id") {
            Some(id) => id,
            None => {
                let here = player::get_current_location(&self.ctx.store, pid)?;
                match_destination(&here.available_destinations, &request.content)?.id
            }
        };
        let started = exercise::start_travel(&self.ctx.store, &self.ctx.timer, pid, destination_id)?;
        Ok(ServerMessage::new(
            MessageType::ExerciseState,
            format!(
                "Travelling to {}. Practice '{}' for {}s: {}",
                started.destination.name,
                started.exercise.name,
                started.exercise.duration_seconds,
                started.exercise.instructions
            ),
            &started,
        ))
    }

    fn exercise(&self, pid: &str, action: &str) -> GameResult<ServerMessage> {
        match action.trim().to_lowercase().as_str() {
            "" | "check" => {
                let snapshot = exercise::check_exercise(&self.ctx.timer, pid)?;
                let content = if snapshot.is_complete {
                    format!(
                        "Exercise '{}' complete! Call complete to receive rewards.",
                        snapshot.exercise_name
                    )
                } else {
                    format!(
                        "Exercise '{}' in progress. {:.0}s remaining.",
                        snapshot.exercise_name, snapshot.remaining_seconds
                    )
                };
                Ok(ServerMessage::new(MessageType::ExerciseState, content, &snapshot))
            }
            "complete" => {
                let done = exercise::complete_exercise(&self.ctx.store, &self.ctx.timer, pid)?;
                let mut content = format!(
                    "Exercise complete! +{} XP, +{} gold",
                    done.rewards.xp_gained, done.rewards.gold_gained
                );
                if let Some(skill) = done.rewards.skill_type.filter(|_| done.rewards.skill_bonus > 0) {
                    content.push_str(&format!(", +{} {}", done.rewards.skill_bonus, skill.as_str()));
                }
                if let Some(level) = done.new_level {
                    content.push_str(&format!(" LEVEL UP! You are now level {level}!"));
                }
                Ok(ServerMessage::new(MessageType::ExerciseComplete, content, &done))
            }
            "cancel" => {
                let snapshot = exercise::cancel_exercise(&self.ctx.timer, pid)?;
                info!("[{}] abandoned '{}'", pid, snapshot.exercise_name);
                Ok(ServerMessage::new(
                    MessageType::ExerciseState,
                    format!("Exercise '{}' abandoned.", snapshot.exercise_name),
                    &snapshot,
                ))
            }
            other => Err(GameError::InvalidInput(format!(
                "Unknown exercise action: {}",
                escape_log(other)
            ))),
        }
    }

    fn final_quest(&self, pid: &str, request: &ClientRequest) -> GameResult<ServerMessage> {
        match request.content.trim().to_lowercase().as_str() {
            "" | "check" => {
                let readiness = quest::check_final_quest_ready(&self.ctx.store, pid)?;
                let content = if readiness.ready {
                    "You are ready for the final quest!".to_string()
                } else {
                    format!(
                        "Collect more segments: {}/{}",
                        readiness.segments_collected, readiness.segments_required
                    )
                };
                Ok(ServerMessage::new(MessageType::Response, content, &readiness))
            }
            "attempt" => {
                let outcome = quest::complete_final_quest(&self.ctx.store, pid, self.score(request))?;
                let content = match (&outcome.rescued, outcome.victory) {
                    (Some(rescued), true) => {
                        format!("Victory! You charmed {} and rescued {}!", outcome.final_monster, rescued)
                    }
                    _ => "The performance was not enough... Try again when you're ready.".to_string(),
                };
                Ok(ServerMessage::new(MessageType::GameComplete, content, &outcome))
            }
            other => Err(GameError::InvalidInput(format!(
                "Unknown final quest action: {}",
                escape_log(other)
            ))),
        }
    }

    fn chat(&self, login: &Login, content: &str) -> GameResult<ServerMessage> {
        let message = sanitize_chat(content, self.ctx.config.game.max_chat_bytes)
            .map_err(|e| GameError::InvalidInput(e.to_string()))?;
        info!("[{}] chat: {}", login.player_id, escape_log(&message));

        let request = MentorRequest {
            player_id: login.player_id.clone(),
            player_name: login.name.clone(),
            game_state: game_state_summary(&self.ctx, &login.player_id),
            message,
        };
        debug!("[{}] mentor prompt: {}", login.player_id, escape_log(&request.prompt()));
        let tools = MentorToolbox::new(self.ctx.clone(), login.player_id.clone());
        let reply = self
            .ctx
            .mentor
            .respond(&request, &tools)
            .map_err(|e| GameError::External(format!("mentor unavailable: {e:#}")))?;
        Ok(ServerMessage::new(
            MessageType::Response,
            reply,
            &json!({ "message_type": "chat" }),
        ))
    }
}

fn world_state(view: &WorldView) -> ServerMessage {
    ServerMessage::new(MessageType::WorldState, format!("Welcome to {}!", view.name), view)
}
