//! Session configuration.
//!
//! Every tunable the runtime reads lives in [`SimConfig`]. Defaults
//! reproduce the built-in game; a JSON file may override any subset of
//! fields.

use std::collections::BTreeMap;
use std::path::Path;

use ascension_logic::progression::ProgressionRules;
use ascension_logic::stats::{check_allocation, Attribute, StatError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error(transparent)]
    Allocation(#[from] StatError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Cultivation gain, gate and reward constants.
    pub progression: ProgressionRules,
    /// Per-turn event chance at neutral potency.
    pub event_base_chance: f64,
    /// Turns between world refreshes.
    pub world_refresh_interval: u64,
    /// Turns between automatic saves.
    pub autosave_interval: u64,
    /// Session ends once `elapsed_turns` reaches this.
    pub lifespan_turns: u64,
    /// Messages kept in the guide conversation.
    pub guide_history: usize,
    /// Slot used for automatic and explicit saves.
    pub save_slot: String,
    /// RNG seed; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Starting attribute points. Empty keeps the default of 5 each.
    pub starting_attributes: BTreeMap<Attribute, u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            progression: ProgressionRules::default(),
            event_base_chance: 0.15,
            world_refresh_interval: 10,
            autosave_interval: 20,
            lifespan_turns: 1000,
            guide_history: 50,
            save_slot: "autosave".to_string(),
            seed: None,
            starting_attributes: BTreeMap::new(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_starting_attributes(mut self, allocation: BTreeMap<Attribute, u32>) -> Self {
        self.starting_attributes = allocation;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_refresh_interval == 0 {
            return Err(ConfigError::ZeroInterval("world_refresh_interval"));
        }
        if self.autosave_interval == 0 {
            return Err(ConfigError::ZeroInterval("autosave_interval"));
        }
        check_allocation(&self.starting_attributes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.world_refresh_interval, 10);
        assert_eq!(config.autosave_interval, 20);
        assert_eq!(config.lifespan_turns, 1000);
        assert_eq!(config.guide_history, 50);
        assert_eq!(config.progression.penalty_floor, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config =
            SimConfig::from_json_str(r#"{ "seed": 7, "progression": { "gate_step": 30 } }"#).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.progression.gate_step, 30);
        assert_eq!(config.progression.base_increment, 3);
        assert_eq!(config.autosave_interval, 20);

        let config =
            SimConfig::from_json_str(r#"{ "starting_attributes": { "fortune": 12, "spirit_root": 8 } }"#)
                .unwrap();
        assert_eq!(config.starting_attributes[&Attribute::Fortune], 12);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(matches!(
            SimConfig::from_json_str(r#"{ "autosave_interval": 0 }"#),
            Err(ConfigError::ZeroInterval("autosave_interval"))
        ));
        assert!(matches!(
            SimConfig::from_json_str(r#"{ "starting_attributes": { "fortune": 30 } }"#),
            Err(ConfigError::Allocation(_))
        ));
        assert!(matches!(
            SimConfig::from_json_file("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_extreme_progression_values_play() {
        use std::sync::Arc;

        use crate::content::Content;
        use crate::engine::{Action, GameSession};
        use crate::persistence::MemorySaveStore;
        use crate::systems::shared_world;

        let config = SimConfig::from_json_str(
            r#"{ "seed": 1, "progression": {
                "base_increment": 4294967295,
                "insight_bonus": 4294967295,
                "gate_step": 4294967295,
                "rest_base": 4294967295 } }"#,
        )
        .unwrap();
        let mut session = GameSession::new(
            "Tester",
            config,
            Arc::new(Content::builtin().unwrap()),
            shared_world(),
            Box::new(MemorySaveStore::new()),
        )
        .unwrap();
        for action in [Action::Cultivate, Action::Rest, Action::Cultivate] {
            session.run_turn(action).unwrap();
            assert!(session.model().progress_points() <= 100);
        }
        assert_eq!(session.model().tier_index(), 0);
    }
}
