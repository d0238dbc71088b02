//! The mentor and the tools it may call.
//!
//! A [`Mentor`] answers chat messages. Whatever drives it (a language model,
//! a script, the built-in [`GuideMentor`]) acts on the game only through a
//! [`MentorToolbox`] bound to the chatting player. Every tool returns JSON:
//! the service payload on success, `{error, code}` on failure.

use std::fmt::Write as _;

use log::debug;
use serde::Serialize;
use serde_json::{json, Value};

use crate::game::errors::{GameError, GameResult};
use crate::game::services::{exercise, player, quest};
use crate::server::context::GameContext;
use crate::server::session::match_destination;

/// One chat turn handed to a mentor.
#[derive(Debug, Clone, PartialEq)]
pub struct MentorRequest {
    pub player_id: String,
    pub player_name: String,
    pub message: String,
    /// Plain-text summary of where the player stands.
    pub game_state: String,
}

impl MentorRequest {
    /// Game state followed by the player's words.
    pub fn prompt(&self) -> String {
        format!("{}\n\n## Player Message\n{}", self.game_state, self.message)
    }
}

/// Answers chat messages. Implementations may block; sessions call them from
/// the blocking pool.
pub trait Mentor: Send + Sync {
    fn respond(&self, request: &MentorRequest, tools: &MentorToolbox) -> anyhow::Result<String>;
}

pub const TOOL_NAMES: [&str; 10] = [
    "get_player_stats",
    "get_current_location",
    "start_travel",
    "check_exercise",
    "complete_exercise",
    "collect_song_segment",
    "get_inventory",
    "perform_at_tavern",
    "check_final_quest_ready",
    "attempt_final_quest",
];

fn to_json<T: Serialize>(result: GameResult<T>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|e| json!({ "error": e.to_string(), "code": "storage" })),
        Err(err) => error_json(&err),
    }
}

fn error_json(err: &GameError) -> Value {
    let mut value = json!({ "error": err.to_string(), "code": err.kind().code() });
    if let (Some(remaining), Value::Object(map)) = (err.remaining_seconds(), &mut value) {
        map.insert("remaining_seconds".into(), json!(remaining));
    }
    value
}

/// Game operations available to a mentor, scoped to one player.
#[derive(Clone)]
pub struct MentorToolbox {
    ctx: GameContext,
    player_id: String,
}

impl MentorToolbox {
    pub fn new(ctx: GameContext, player_id: impl Into<String>) -> Self {
        Self {
            ctx,
            player_id: player_id.into(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    fn performance_score(&self) -> f64 {
        self.ctx.config.game.default_performance_score
    }

    pub fn get_player_stats(&self) -> Value {
        to_json(player::get_stats(&self.ctx.store, &self.player_id))
    }

    pub fn get_current_location(&self) -> Value {
        to_json(player::get_current_location(&self.ctx.store, &self.player_id))
    }

    /// Start travelling to the reachable destination called `destination_name`.
    pub fn start_travel(&self, destination_name: &str) -> Value {
        let result = player::get_current_location(&self.ctx.store, &self.player_id).and_then(|here| {
            let destination = match_destination(&here.available_destinations, destination_name)?;
            exercise::start_travel(&self.ctx.store, &self.ctx.timer, &self.player_id, destination.id)
        });
        to_json(result)
    }

    pub fn check_exercise(&self) -> Value {
        to_json(exercise::check_exercise(&self.ctx.timer, &self.player_id))
    }

    pub fn complete_exercise(&self) -> Value {
        to_json(exercise::complete_exercise(&self.ctx.store, &self.ctx.timer, &self.player_id))
    }

    pub fn collect_song_segment(&self, segment_id: u64) -> Value {
        to_json(quest::collect_segment(&self.ctx.store, &self.player_id, segment_id))
    }

    pub fn get_inventory(&self) -> Value {
        to_json(quest::get_inventory(&self.ctx.store, &self.player_id))
    }

    pub fn perform_at_tavern(&self) -> Value {
        to_json(quest::perform_at_tavern(&self.ctx.store, &self.player_id, self.performance_score()))
    }

    pub fn check_final_quest_ready(&self) -> Value {
        to_json(quest::check_final_quest_ready(&self.ctx.store, &self.player_id))
    }

    pub fn attempt_final_quest(&self) -> Value {
        to_json(quest::complete_final_quest(&self.ctx.store, &self.player_id, self.performance_score()))
    }

    /// Dispatch a tool call by name, as an agent framework would issue it.
    pub fn invoke(&self, name: &str, args: &Value) -> Value {
        debug!("[{}] mentor tool {}", self.player_id, name);
        match name {
            "get_player_stats" => self.get_player_stats(),
            "get_current_location" => self.get_current_location(),
            "start_travel" => match args.get("destination_name").and_then(Value::as_str) {
                Some(dest) => self.start_travel(dest),
                None => error_json(&GameError::InvalidInput("destination_name required".into())),
            },
            "check_exercise" => self.check_exercise(),
            "complete_exercise" => self.complete_exercise(),
            "collect_song_segment" => match args.get("segment_id").and_then(Value::as_u64) {
                Some(id) => self.collect_song_segment(id),
                None => error_json(&GameError::InvalidInput("segment_id required".into())),
            },
            "get_inventory" => self.get_inventory(),
            "perform_at_tavern" => self.perform_at_tavern(),
            "check_final_quest_ready" => self.check_final_quest_ready(),
            "attempt_final_quest" => self.attempt_final_quest(),
            other => error_json(&GameError::InvalidInput(format!("unknown tool: {other}"))),
        }
    }
}

/// Text block describing the player's location, nearby segments,
/// destinations and collection progress.
pub fn game_state_summary(ctx: &GameContext, player_id: &str) -> String {
    let mut out = String::from("## Current Game State");
    if let Ok(here) = player::get_current_location(&ctx.store, player_id) {
        let _ = write!(
            out,
            "\nCurrent Location: {} ({})",
            here.location.name,
            here.location.location_type.as_str()
        );
        if here.uncollected_segments.is_empty() {
            out.push_str("\nNo segments available to collect at this location.");
        } else {
            let names: Vec<String> = here
                .uncollected_segments
                .iter()
                .map(|s| format!("{} (id {})", s.name, s.id))
                .collect();
            let _ = write!(out, "\nAvailable to collect here: {}", names.join(", "));
        }
        if !here.available_destinations.is_empty() {
            let names: Vec<&str> = here.available_destinations.iter().map(|d| d.name.as_str()).collect();
            let _ = write!(out, "\nCan travel to: {}", names.join(", "));
        }
    }
    if let Ok(inventory) = quest::get_inventory(&ctx.store, player_id) {
        let _ = write!(
            out,
            "\nSegments collected: {}/{}",
            inventory.collected_count, inventory.total_segments
        );
        if !inventory.collected_segments.is_empty() {
            let names: Vec<&str> = inventory.collected_segments.iter().map(|s| s.name.as_str()).collect();
            let _ = write!(out, "\nCollected: {}", names.join(", "));
        }
    }
    if let Some(session) = ctx.timer.check_session(player_id) {
        let _ = write!(
            out,
            "\nExercise: {} ({:.0}s remaining)",
            session.exercise_name, session.remaining_seconds
        );
    }
    out
}

/// Offline mentor: looks at the game through its tools and points at the
/// next useful step.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuideMentor;

impl GuideMentor {
    fn next_step(tools: &MentorToolbox) -> String {
        let exercise = tools.check_exercise();
        if exercise.get("error").is_none() {
            let name = exercise["exercise_name"].as_str().unwrap_or("your exercise");
            if exercise["is_complete"].as_bool() == Some(true) {
                return format!("You have finished '{name}'. Complete it to claim your reward and arrive.");
            }
            let remaining = exercise["remaining_seconds"].as_f64().unwrap_or(0.0);
            return format!("Keep practicing '{name}'. {remaining:.0} seconds remain on the road.");
        }

        let inventory = tools.get_inventory();
        if inventory["can_perform_final"].as_bool() == Some(true) {
            return "Every segment of the song is yours. Attempt the final quest when you feel ready.".into();
        }

        let here = tools.get_current_location();
        if here.get("error").is_some() {
            return "Your world is not ready yet. Ask to see the world and your journey begins.".into();
        }
        if let Some(segment) = here["uncollected_segments"].as_array().and_then(|s| s.first()) {
            return format!(
                "A fragment of the song lingers here: '{}'. Collect segment {} before you move on.",
                segment["name"].as_str().unwrap_or("a fragment"),
                segment["id"]
            );
        }
        if here["is_tavern"].as_bool() == Some(true) {
            return "This tavern has an audience. Perform to earn gold and reputation.".into();
        }
        match here["available_destinations"]
            .as_array()
            .and_then(|d| d.iter().find(|l| l["is_unlocked"].as_bool() == Some(false)).or(d.first()))
        {
            Some(dest) => format!(
                "The road to {} is open. Travel there and practice along the way.",
                dest["name"].as_str().unwrap_or("the next place")
            ),
            None => "Rest a moment. There is nowhere new to go from here.".into(),
        }
    }
}

impl Mentor for GuideMentor {
    fn respond(&self, request: &MentorRequest, tools: &MentorToolbox) -> anyhow::Result<String> {
        Ok(format!("Well met, {}. {}", request.player_name, Self::next_step(tools)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::game::clock::ManualClock;
    use crate::game::generator::WorldBlueprint;
    use crate::game::services::world;
    use crate::storage::GameStoreBuilder;

    fn context() -> (TempDir, GameContext, Arc<ManualClock>) {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let clock = Arc::new(ManualClock::starting_now());
        let ctx = GameContext::new(Arc::new(store), clock.clone(), Arc::new(Config::default()));
        player::get_or_create(&ctx.store, "p1", Some("Ann")).expect("player");
        world::create_world(&ctx.store, "p1", &WorldBlueprint::default_world()).expect("world");
        (dir, ctx, clock)
    }

    #[test]
    fn every_tool_name_dispatches() {
        let (_dir, ctx, _clock) = context();
        let tools = MentorToolbox::new(ctx, "p1");
        for name in TOOL_NAMES {
            let out = tools.invoke(name, &json!({}));
            assert!(
                out.get("code").and_then(Value::as_str) != Some("invalid_input")
                    || matches!(name, "start_travel" | "collect_song_segment"),
                "{name} returned {out}"
            );
        }
        assert_eq!(tools.invoke("dance", &json!({}))["code"], "invalid_input");
    }

    #[test]
    fn travel_tool_matches_names_and_reports_errors() {
        let (_dir, ctx, clock) = context();
        let tools = MentorToolbox::new(ctx, "p1");
        let err = tools.invoke("start_travel", &json!({ "destination_name": "Atlantis" }));
        assert_eq!(err["code"], "invalid_input");

        let started = tools.invoke("start_travel", &json!({ "destination_name": "melody" }));
        assert_eq!(started["status"], "travel_started");

        let early = tools.complete_exercise();
        assert_eq!(early["code"], "invalid_state");
        assert!(early["remaining_seconds"].as_f64().is_some());

        clock.advance_secs(3600);
        assert_eq!(tools.complete_exercise()["status"], "exercise_completed");
    }

    #[test]
    fn guide_points_at_segments_then_roads() {
        let (_dir, ctx, _clock) = context();
        let tools = MentorToolbox::new(ctx.clone(), "p1");
        let request = MentorRequest {
            player_id: "p1".into(),
            player_name: "Ann".into(),
            message: "what now?".into(),
            game_state: game_state_summary(&ctx, "p1"),
        };
        assert!(request.game_state.contains("Current Location: Rhythmwood Village"));
        assert!(request.prompt().ends_with("## Player Message\nwhat now?"));

        let reply = GuideMentor.respond(&request, &tools).expect("reply");
        assert!(reply.starts_with("Well met, Ann."));
        assert!(reply.contains("Collect segment"), "{reply}");
    }
}
