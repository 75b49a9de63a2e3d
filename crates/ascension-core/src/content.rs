//! Game content: tiers, quests, achievements, recipes, locations, events,
//! sects and crops.
//!
//! Built-in content ships as `data/content.json`, embedded at compile time
//! and validated on load. Every cross-reference (quest prerequisites,
//! discovery items and opponents, achievement conditions) is checked up
//! front so the turn loop never meets a dangling id.

use std::collections::BTreeMap;

use ascension_logic::condition::{Condition, ConditionError};
use ascension_logic::crafting::{CraftableFormula, IngredientDef, MaterialCost, RefinableItem};
use ascension_logic::farming::CropDef;
use ascension_logic::graph::{DependencyGraph, GraphError, NodeDef};
use ascension_logic::sect::{ExchangeOffer, SectDef};
use ascension_logic::stats::Attribute;
use ascension_logic::techniques::TechniqueDef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::systems::EventKind;

const BUILTIN_CONTENT: &str = include_str!("../../../data/content.json");

/// Number of refinement level bands (0–2, 3–5, 6–8, 9+).
pub const RECIPE_TIERS: usize = 4;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("content declares no tiers")]
    NoTiers,
    #[error("invalid {kind} graph: {source}")]
    Graph {
        kind: &'static str,
        #[source]
        source: GraphError,
    },
    #[error("achievement `{id}` has a bad condition: {source}")]
    Condition {
        id: String,
        #[source]
        source: ConditionError,
    },
    #[error("{kind} `{owner}` references unknown {target_kind} `{target}`")]
    UnknownReference {
        kind: &'static str,
        owner: String,
        target_kind: &'static str,
        target: String,
    },
    #[error("expected 4 refinement recipe tiers, found {0}")]
    RecipeTiers(usize),
    #[error("{0} table has no positive weights")]
    EmptyTable(&'static str),
    #[error("duplicate {kind} id `{id}`")]
    Duplicate { kind: &'static str, id: String },
    #[error("crop `{0}` has no growth time")]
    NoGrowthTime(String),
}

/// One weighted outcome of exploring a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub weight: u32,
    pub description: String,
    #[serde(default)]
    pub resources: BTreeMap<String, u64>,
    #[serde(default)]
    pub attributes: BTreeMap<Attribute, u32>,
    /// Quest objectives advanced by this discovery.
    #[serde(default)]
    pub objectives: BTreeMap<String, u32>,
    #[serde(default)]
    pub progress: u32,
    /// Artifact id granted on discovery.
    #[serde(default)]
    pub item: Option<String>,
    /// Opponent id fought on discovery.
    #[serde(default)]
    pub opponent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub min_tier: usize,
    /// Objective recorded on every visit.
    #[serde(default)]
    pub objective: Option<String>,
    pub discoveries: Vec<Discovery>,
}

fn default_objective() -> String {
    ascension_logic::constants::objectives::DEFEAT_BEAST.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opponent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub min_tier: usize,
    pub hp_multiplier: f64,
    pub damage_multiplier: f64,
    /// Objective recorded on victory.
    #[serde(default = "default_objective")]
    pub objective: String,
    /// Whether random ambush events may pick this opponent.
    #[serde(default = "default_true")]
    pub ambush: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWeight {
    pub kind: EventKind,
    pub weight: u32,
}

/// Immutable content shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub tiers: Vec<String>,
    #[serde(default)]
    pub quests: Vec<NodeDef>,
    #[serde(default)]
    pub achievements: Vec<NodeDef>,
    #[serde(default)]
    pub ingredients: BTreeMap<String, IngredientDef>,
    #[serde(default)]
    pub formulas: Vec<CraftableFormula>,
    pub refinement_recipes: Vec<Vec<MaterialCost>>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, RefinableItem>,
    #[serde(default)]
    pub techniques: Vec<TechniqueDef>,
    #[serde(default)]
    pub locations: Vec<Location>,
    pub events: Vec<EventWeight>,
    #[serde(default)]
    pub opponents: Vec<Opponent>,
    #[serde(default)]
    pub guide_lines: Vec<String>,
    #[serde(default)]
    pub sects: Vec<SectDef>,
    #[serde(default)]
    pub sect_exchange: Vec<ExchangeOffer>,
    #[serde(default)]
    pub crops: Vec<CropDef>,
}

impl Content {
    /// The embedded `data/content.json`.
    pub fn builtin() -> Result<Self, ContentError> {
        Self::from_json(BUILTIN_CONTENT)
    }

    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let content: Content = serde_json::from_str(json)?;
        content.validate()?;
        Ok(content)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier_name(&self, index: usize) -> &str {
        self.tiers.get(index).map_or("Unknown", String::as_str)
    }

    pub fn quest_graph(&self) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::new(self.quests.clone())
    }

    pub fn formula(&self, id: &str) -> Option<&CraftableFormula> {
        self.formulas.iter().find(|f| f.id == id)
    }

    pub fn technique(&self, id: &str) -> Option<&TechniqueDef> {
        self.techniques.iter().find(|t| t.id == id)
    }

    pub fn location(&self, id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    pub fn opponent(&self, id: &str) -> Option<&Opponent> {
        self.opponents.iter().find(|o| o.id == id)
    }

    pub fn sect(&self, id: &str) -> Option<&SectDef> {
        self.sects.iter().find(|s| s.id == id)
    }

    pub fn exchange_offer(&self, id: &str) -> Option<&ExchangeOffer> {
        self.sect_exchange.iter().find(|o| o.id == id)
    }

    pub fn crop(&self, id: &str) -> Option<&CropDef> {
        self.crops.iter().find(|c| c.id == id)
    }

    /// Materials for refining an item currently at `level`.
    pub fn refinement_recipe(&self, level: u32) -> &[MaterialCost] {
        let tier = ascension_logic::crafting::recipe_tier(level);
        self.refinement_recipes
            .get(tier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check every invariant the runtime relies on.
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.tiers.is_empty() {
            return Err(ContentError::NoTiers);
        }
        if self.refinement_recipes.len() != RECIPE_TIERS {
            return Err(ContentError::RecipeTiers(self.refinement_recipes.len()));
        }

        DependencyGraph::new(self.quests.clone()).map_err(|source| ContentError::Graph {
            kind: "quest",
            source,
        })?;
        DependencyGraph::new(self.achievements.clone()).map_err(|source| ContentError::Graph {
            kind: "achievement",
            source,
        })?;
        for achievement in &self.achievements {
            if let Some(expr) = &achievement.condition {
                Condition::parse(expr).map_err(|source| ContentError::Condition {
                    id: achievement.id.clone(),
                    source,
                })?;
            }
        }

        check_unique("formula", self.formulas.iter().map(|f| f.id.as_str()))?;
        check_unique("technique", self.techniques.iter().map(|t| t.id.as_str()))?;
        check_unique("location", self.locations.iter().map(|l| l.id.as_str()))?;
        check_unique("opponent", self.opponents.iter().map(|o| o.id.as_str()))?;
        check_unique("sect", self.sects.iter().map(|s| s.id.as_str()))?;
        check_unique("exchange offer", self.sect_exchange.iter().map(|o| o.id.as_str()))?;
        check_unique("crop", self.crops.iter().map(|c| c.id.as_str()))?;
        if let Some(crop) = self.crops.iter().find(|c| c.growth_turns == 0) {
            return Err(ContentError::NoGrowthTime(crop.id.clone()));
        }

        if self.events.iter().all(|e| e.weight == 0) {
            return Err(ContentError::EmptyTable("event"));
        }

        for location in &self.locations {
            if location.discoveries.iter().all(|d| d.weight == 0) {
                return Err(ContentError::EmptyTable("discovery"));
            }
            for discovery in &location.discoveries {
                if let Some(item) = &discovery.item {
                    if !self.artifacts.contains_key(item) {
                        return Err(unknown("location", &location.id, "artifact", item));
                    }
                }
                if let Some(opponent) = &discovery.opponent {
                    if self.opponent(opponent).is_none() {
                        return Err(unknown("location", &location.id, "opponent", opponent));
                    }
                }
            }
        }
        Ok(())
    }
}

fn unknown(kind: &'static str, owner: &str, target_kind: &'static str, target: &str) -> ContentError {
    ContentError::UnknownReference {
        kind,
        owner: owner.to_string(),
        target_kind,
        target: target.to_string(),
    }
}

fn check_unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), ContentError> {
    let mut seen = std::collections::BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContentError::Duplicate {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
