//! Battle resolution - participant versus one opponent
//!
//! Battles are a collaborator behind [`BattleResolver`] so alternative
//! combat models can be swapped in. [`DuelResolver`] is the built-in
//! round-based exchange: the participant strikes first, then the opponent,
//! until one side drops to zero health.

use ascension_logic::constants::resources;
use ascension_logic::stats::{Attribute, StatModel};
use rand::{Rng, RngCore};

use crate::content::Opponent;

/// Extra health by tier index. Tiers past the table use its last entry.
const TIER_HEALTH_BONUS: [i32; 9] = [0, 0, 50, 100, 200, 400, 800, 1600, 3200];
/// Extra damage by tier index.
const TIER_DAMAGE_BONUS: [i32; 9] = [0, 0, 10, 25, 50, 80, 120, 170, 230];

const BASE_HEALTH: i32 = 100;
const HEALTH_PER_CONSTITUTION: i32 = 10;
const BASE_DAMAGE: i32 = 20;
const OPPONENT_BASE_HEALTH: f64 = 80.0;
const OPPONENT_BASE_DAMAGE: f64 = 15.0;
/// Hard stop; a duel that runs this long counts as a loss.
const MAX_ROUNDS: u32 = 100;

/// Result of one battle. Deltas are applied by [`BattleOutcome::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleOutcome {
    pub opponent: String,
    pub victory: bool,
    pub rounds: u32,
    /// Signed resource changes.
    pub resource_deltas: Vec<(String, i64)>,
    pub progress_delta: i32,
}

impl BattleOutcome {
    /// Apply deltas to the model. Losses never take more than is held.
    pub fn apply(&self, model: &mut StatModel) {
        for (name, delta) in &self.resource_deltas {
            if *delta >= 0 {
                model.add_resource(name, *delta as u64);
            } else {
                model.drain_resource(name, delta.unsigned_abs());
            }
        }
        if self.progress_delta >= 0 {
            model.add_progress(self.progress_delta as u32);
        } else {
            model.remove_progress(self.progress_delta.unsigned_abs());
        }
    }
}

/// Pluggable combat model.
pub trait BattleResolver: Send {
    /// Fight without mutating the participant; the caller applies the outcome.
    fn resolve(
        &mut self,
        participant: &StatModel,
        opponent: &Opponent,
        rng: &mut dyn RngCore,
    ) -> BattleOutcome;
}

/// Built-in alternating-strike duel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuelResolver;

fn tier_bonus(table: &[i32; 9], tier: usize) -> i32 {
    table[tier.min(table.len() - 1)]
}

impl DuelResolver {
    pub fn participant_health(participant: &StatModel) -> i32 {
        BASE_HEALTH
            + tier_bonus(&TIER_HEALTH_BONUS, participant.tier_index())
            + participant.attribute(Attribute::Constitution) as i32 * HEALTH_PER_CONSTITUTION
    }

    pub fn opponent_health(opponent: &Opponent) -> i32 {
        (OPPONENT_BASE_HEALTH * opponent.hp_multiplier).round() as i32
    }
}

impl BattleResolver for DuelResolver {
    fn resolve(
        &mut self,
        participant: &StatModel,
        opponent: &Opponent,
        rng: &mut dyn RngCore,
    ) -> BattleOutcome {
        let mut own_health = Self::participant_health(participant);
        let mut foe_health = Self::opponent_health(opponent);
        let strike = BASE_DAMAGE
            + tier_bonus(&TIER_DAMAGE_BONUS, participant.tier_index())
            + participant.attribute(Attribute::Constitution) as i32;
        let foe_strike = (OPPONENT_BASE_DAMAGE * opponent.damage_multiplier) as i32;

        let mut rounds = 0;
        let victory = loop {
            rounds += 1;
            foe_health -= (strike + rng.gen_range(-5..=10)).max(1);
            if foe_health <= 0 {
                break true;
            }
            own_health -= (foe_strike + rng.gen_range(-3..=8)).max(1);
            if own_health <= 0 || rounds >= MAX_ROUNDS {
                break false;
            }
        };

        let (resource_deltas, progress_delta) = if victory {
            (
                vec![(
                    resources::SPIRIT_STONES.to_string(),
                    rng.gen_range(20..=100),
                )],
                rng.gen_range(10..=30),
            )
        } else {
            let loss = participant.resource(resources::SPIRIT_STONES).min(20) as i64;
            (vec![(resources::SPIRIT_STONES.to_string(), -loss)], -5)
        };

        log::debug!(
            "{} vs {}: {} after {} rounds",
            participant.name,
            opponent.name,
            if victory { "victory" } else { "defeat" },
            rounds
        );

        BattleOutcome {
            opponent: opponent.id.clone(),
            victory,
            rounds,
            resource_deltas,
            progress_delta,
        }
    }
}
