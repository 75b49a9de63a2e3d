//! Exploration system - weighted discoveries at named locations

use ascension_logic::constants::flags;
use ascension_logic::stats::StatModel;
use rand::{Rng, RngCore};
use thiserror::Error;

use super::battle::{BattleOutcome, BattleResolver};
use crate::content::{Content, Discovery, Location};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExploreError {
    #[error("unknown location `{0}`")]
    UnknownLocation(String),
    #[error("{location} requires tier {required}")]
    TierTooLow { location: String, required: usize },
}

/// What one expedition found
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationOutcome {
    pub location: String,
    pub description: String,
    /// Quest objectives to advance, including the location's own
    pub objectives: Vec<(String, u32)>,
    /// Artifact id to add to the inventory
    pub item: Option<String>,
    pub battle: Option<BattleOutcome>,
}

/// Pick one discovery by weight. `None` only for an all-zero table.
pub fn pick_discovery<'a>(location: &'a Location, rng: &mut (impl Rng + ?Sized)) -> Option<&'a Discovery> {
    let total: u32 = location.discoveries.iter().map(|d| d.weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    location.discoveries.iter().find(|d| {
        if roll < d.weight {
            true
        } else {
            roll -= d.weight;
            false
        }
    })
}

/// Explore `location_id`, applying the discovery to `model`.
///
/// Items are reported, not stored; the caller owns the inventory.
pub fn explore(
    model: &mut StatModel,
    content: &Content,
    location_id: &str,
    battle: &mut dyn BattleResolver,
    rng: &mut dyn RngCore,
) -> Result<ExplorationOutcome, ExploreError> {
    let location = content
        .location(location_id)
        .ok_or_else(|| ExploreError::UnknownLocation(location_id.to_string()))?;
    if model.tier_index() < location.min_tier {
        return Err(ExploreError::TierTooLow {
            location: location.name.clone(),
            required: location.min_tier,
        });
    }

    let mut objectives: Vec<(String, u32)> = location
        .objective
        .iter()
        .map(|objective| (objective.clone(), 1))
        .collect();

    let Some(discovery) = pick_discovery(location, rng) else {
        return Ok(ExplorationOutcome {
            location: location.id.clone(),
            description: format!("{} yields nothing", location.name),
            objectives,
            item: None,
            battle: None,
        });
    };

    for (resource, amount) in &discovery.resources {
        model.add_resource(resource, *amount);
    }
    for (attribute, amount) in &discovery.attributes {
        model.raise_attribute(*attribute, *amount);
    }
    if discovery.progress > 0 {
        model.add_progress(discovery.progress);
    }
    objectives.extend(discovery.objectives.iter().map(|(id, n)| (id.clone(), *n)));

    let mut fight = None;
    if let Some(opponent) = discovery.opponent.as_deref().and_then(|id| content.opponent(id)) {
        let outcome = battle.resolve(model, opponent, rng);
        outcome.apply(model);
        model.set_flag(flags::FIRST_COMBAT);
        if outcome.victory {
            objectives.push((opponent.objective.clone(), 1));
        }
        fight = Some(outcome);
    }

    log::debug!("{} explored {}: {}", model.name, location.name, discovery.description);

    Ok(ExplorationOutcome {
        location: location.id.clone(),
        description: discovery.description.clone(),
        objectives,
        item: discovery.item.clone(),
        battle: fight,
    })
}
