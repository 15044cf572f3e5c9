use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stagerando_game::{Goals, RoomName, DEFAULT_SECTION};
use stagerando_logic::ScoreWeights;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RandomizerSettings {
    pub name: Option<String>,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub validation: Vec<ValidationStep>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub max_attempts: usize,
    // Rooms kept at their authored position, such as cutscene-only rooms.
    #[serde(default)]
    pub excluded_rooms: Vec<RoomName>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            max_attempts: 1000,
            excluded_rooms: vec![],
        }
    }
}

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

/// One simulated playthrough a layout has to pass before it is accepted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValidationStep {
    pub name: String,
    pub start_room: RoomName,
    #[serde(default = "default_section")]
    pub start_section: String,
    #[serde(default)]
    pub abilities: BTreeMap<String, bool>,
    pub goals: Goals,
    pub strategy: SearchStrategy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum SearchStrategy {
    RandomExploration {
        trials: usize,
        cycle_limit: usize,
        #[serde(default)]
        max_losses: usize,
        #[serde(default)]
        location_invariant: bool,
    },
    StrictBounded {
        max_steps: usize,
        #[serde(default)]
        location_invariant: bool,
    },
    RelaxedRandomized {
        max_steps: usize,
        cycle_limit: usize,
        decay_start: usize,
        #[serde(default)]
        location_invariant: bool,
    },
    ReflexiveBonded {
        cycle_limit: usize,
        reflexive_depth: usize,
        #[serde(default)]
        weights: ScoreWeights,
    },
}

impl SearchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SearchStrategy::RandomExploration { .. } => "random exploration",
            SearchStrategy::StrictBounded { .. } => "strict bounded",
            SearchStrategy::RelaxedRandomized { .. } => "relaxed randomized",
            SearchStrategy::ReflexiveBonded { .. } => "reflexive bonded",
        }
    }
}

impl Default for RandomizerSettings {
    fn default() -> Self {
        RandomizerSettings {
            name: Some("Default".to_string()),
            generation: GenerationSettings::default(),
            validation: vec![],
        }
    }
}

pub fn parse_randomizer_settings(settings_json: &str) -> Result<RandomizerSettings> {
    let mut des = serde_json::Deserializer::from_str(settings_json);
    let settings = serde_path_to_error::deserialize(&mut des)?;
    Ok(settings)
}

impl RandomizerSettings {
    pub fn load(path: &Path) -> Result<RandomizerSettings> {
        let settings_str = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read settings at {}", path.display()))?;
        parse_randomizer_settings(&settings_str)
            .with_context(|| format!("Unable to parse settings at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings = parse_randomizer_settings(
            r#"{
                "name": "Quick",
                "generation": {"max_attempts": 20},
                "validation": [
                    {"name": "Reach Lab", "start_room": "Castle Entrance, After Drawbridge",
                     "goals": {"Lab": {"Any": {"Room": "Alchemy Laboratory, Entryway"}}},
                     "strategy": {"type": "StrictBounded", "max_steps": 30}},
                    {"name": "Soft-lock check", "start_room": "Castle Entrance, After Drawbridge",
                     "abilities": {"Relic - Soul of Bat": true},
                     "goals": {"Lab": {"Any": {"Room": "Alchemy Laboratory, Entryway"}}},
                     "strategy": {"type": "RandomExploration", "trials": 5, "cycle_limit": 100}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.generation.max_attempts, 20);
        assert!(settings.generation.excluded_rooms.is_empty());
        assert_eq!(settings.validation.len(), 2);
        assert_eq!(settings.validation[0].start_section, "Main");
        assert_eq!(
            settings.validation[0].strategy,
            SearchStrategy::StrictBounded {
                max_steps: 30,
                location_invariant: false
            }
        );
        assert_eq!(settings.validation[1].strategy.name(), "random exploration");
        assert_eq!(settings.validation[1].abilities.len(), 1);
    }

    #[test]
    fn test_parse_error_has_path() {
        let err = parse_randomizer_settings(
            r#"{"name": null, "generation": {"max_attempts": "many"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("generation.max_attempts"));
    }

    #[test]
    fn test_relaxed_location_invariant() {
        let strategy: SearchStrategy = serde_json::from_str(
            r#"{"type": "RelaxedRandomized", "max_steps": 40, "cycle_limit": 900,
                "decay_start": 600, "location_invariant": true}"#,
        )
        .unwrap();
        assert_eq!(
            strategy,
            SearchStrategy::RelaxedRandomized {
                max_steps: 40,
                cycle_limit: 900,
                decay_start: 600,
                location_invariant: true
            }
        );
    }

    #[test]
    fn test_default_weights() {
        let strategy: SearchStrategy = serde_json::from_str(
            r#"{"type": "ReflexiveBonded", "cycle_limit": 500, "reflexive_depth": 2}"#,
        )
        .unwrap();
        match strategy {
            SearchStrategy::ReflexiveBonded { weights, .. } => {
                assert_eq!(weights, ScoreWeights::default())
            }
            _ => panic!("wrong strategy"),
        }
    }
}
