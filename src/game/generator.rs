//! World content generation.
//!
//! Generation itself is an external collaborator behind [`WorldGenerator`];
//! this module owns the payload it must produce and the validation applied
//! before a payload is turned into a world.

use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::game::types::{ExerciseType, LocationType};

pub const MIN_LOCATIONS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationBlueprint {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub exercise_focus: Option<ExerciseType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldBlueprint {
    pub name: String,
    pub theme: String,
    pub story_arc: String,
    pub final_monster: String,
    pub rescue_target: String,
    pub locations: Vec<LocationBlueprint>,
}

/// Produces the themed content for a new player's world. Implementations may
/// block for a long time; callers run them on the blocking pool.
pub trait WorldGenerator: Send + Sync {
    fn generate(&self, player_id: &str, player_name: &str) -> Result<WorldBlueprint>;
}

/// Always returns the built-in world.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultWorldGenerator;

impl WorldGenerator for DefaultWorldGenerator {
    fn generate(&self, _player_id: &str, _player_name: &str) -> Result<WorldBlueprint> {
        Ok(WorldBlueprint::default_world())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    exercise_focus: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWorld {
    name: Option<String>,
    theme: Option<String>,
    story_arc: Option<String>,
    final_monster: Option<String>,
    rescue_target: Option<String>,
    locations: Option<Vec<RawLocation>>,
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(anyhow!("missing required field: {}", field)),
    }
}

/// Pull the JSON object out of free-form generator text: a fenced ```json
/// block when present, otherwise the span from the first `{` to the last `}`.
fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}

impl WorldBlueprint {
    pub fn default_world() -> Self {
        let loc = |name: &str, description: &str, location_type, focus| LocationBlueprint {
            name: name.to_string(),
            description: description.to_string(),
            location_type,
            exercise_focus: Some(focus),
        };
        Self {
            name: "The Melodic Realm".into(),
            theme: "A land where music holds magical power".into(),
            story_arc: "Long ago the realm was filled with harmony. Then the Discord Dragon captured the Royal Composer, and only a brave bard can bring the music back.".into(),
            final_monster: "The Discord Dragon".into(),
            rescue_target: "The Royal Composer".into(),
            locations: vec![
                loc(
                    "Rhythmwood Village",
                    "A peaceful village where the heartbeat of music begins. Everyone taps along to an endless rhythm.",
                    LocationType::Village,
                    ExerciseType::Rhythm,
                ),
                loc(
                    "Melody Meadows",
                    "Rolling hills where the wind carries old tunes and flowers bloom in musical patterns.",
                    LocationType::Village,
                    ExerciseType::Melody,
                ),
                loc(
                    "The Harmonious Tavern",
                    "A famous inn where bards gather to trade songs and stories.",
                    LocationType::Tavern,
                    ExerciseType::Harmony,
                ),
                loc(
                    "Chord Crossing",
                    "A bridge where many musical paths meet and old melodies still echo.",
                    LocationType::Village,
                    ExerciseType::EarTraining,
                ),
                loc(
                    "Lair of The Discord Dragon",
                    "The dark cavern where The Discord Dragon holds The Royal Composer. Only the complete Hero's Ballad can calm the beast.",
                    LocationType::Dungeon,
                    ExerciseType::Harmony,
                ),
            ],
        }
    }

    /// Parse raw generator output and normalize it.
    pub fn from_model_output(text: &str) -> Result<Self> {
        let json = extract_json(text).ok_or_else(|| anyhow!("no JSON object in generator output"))?;
        let raw: RawWorld = serde_json::from_str(json).context("generator output is not valid world JSON")?;
        let locations = raw
            .locations
            .ok_or_else(|| anyhow!("missing required field: locations"))?
            .into_iter()
            .enumerate()
            .map(|(idx, l)| LocationBlueprint {
                name: l
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Village {}", idx + 1)),
                description: l
                    .description
                    .unwrap_or_else(|| "A mysterious place in the realm.".to_string()),
                location_type: l
                    .kind
                    .as_deref()
                    .and_then(LocationType::parse)
                    .unwrap_or(LocationType::Village),
                exercise_focus: l.exercise_focus.as_deref().and_then(ExerciseType::parse),
            })
            .collect();
        let blueprint = Self {
            name: required("name", raw.name)?,
            theme: required("theme", raw.theme)?,
            story_arc: required("story_arc", raw.story_arc)?,
            final_monster: required("final_monster", raw.final_monster)?,
            rescue_target: required("rescue_target", raw.rescue_target)?,
            locations,
        };
        blueprint.normalize()
    }

    /// Re-validate a payload: required text present, at least three locations,
    /// every location with a focus, and at least one tavern and one dungeon.
    pub fn normalize(mut self) -> Result<Self> {
        for (field, value) in [
            ("name", &self.name),
            ("theme", &self.theme),
            ("story_arc", &self.story_arc),
            ("final_monster", &self.final_monster),
            ("rescue_target", &self.rescue_target),
        ] {
            if value.trim().is_empty() {
                bail!("missing required field: {}", field);
            }
        }
        if self.locations.len() < MIN_LOCATIONS {
            bail!(
                "expected at least {} locations, got {}",
                MIN_LOCATIONS,
                self.locations.len()
            );
        }

        for (idx, location) in self.locations.iter_mut().enumerate() {
            if location.exercise_focus.is_none() {
                location.exercise_focus = Some(ExerciseType::ALL[idx % ExerciseType::ALL.len()]);
            }
        }

        if !self.locations.iter().any(|l| l.location_type == LocationType::Tavern) {
            let idx = self.locations.len() - 2;
            warn!("world '{}' has no tavern; converting '{}'", self.name, self.locations[idx].name);
            self.locations[idx].location_type = LocationType::Tavern;
        }

        if !self.locations.iter().any(|l| l.location_type == LocationType::Dungeon) {
            self.locations.push(LocationBlueprint {
                name: format!("Lair of {}", self.final_monster),
                description: format!(
                    "The dark domain where {} holds {} captive.",
                    self.final_monster, self.rescue_target
                ),
                location_type: LocationType::Dungeon,
                exercise_focus: Some(ExerciseType::Harmony),
            });
        }

        Ok(self)
    }
}
