//! Tier progression: the leaky bucket with a probabilistic gate.
//!
//! Each cultivation call pours a gain into `progress_points`. When the
//! bucket is full the breakthrough gate fires: one draw in `[1, 10]` plus
//! the Fortune attribute must beat `(tier_index + 1) * 20`. Success moves
//! the participant up one tier; failure drains the bucket to the penalty
//! floor so the next attempt is close but not free.
//!
//! Everything here is pure: the random draw is an argument. The runtime
//! crate supplies it from a seeded RNG.
//!
//! ```
//! use ascension_logic::progression::{advance_with_draw, AdvanceOutcome, ProgressionRules};
//! use ascension_logic::stats::StatModel;
//!
//! let rules = ProgressionRules::default();
//! let mut model = StatModel::new("Tester").with_position(0, 97);
//! let outcome = advance_with_draw(&mut model, 10, 9, &rules);
//! assert!(matches!(outcome, AdvanceOutcome::GateFailed { .. }));
//! assert_eq!((model.tier_index(), model.progress_points()), (0, 90));
//! ```

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::constants::{resources, MAX_PROGRESS};
use crate::stats::{Attribute, StatModel};

/// Inclusive range of the gate draw.
pub const GATE_DRAW: RangeInclusive<u32> = 1..=10;

/// Tunable progression constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionRules {
    /// Flat progress per cultivation call.
    pub base_increment: u32,
    /// Insight above this grants `insight_bonus`.
    pub insight_threshold: u32,
    pub insight_bonus: u32,
    /// Gate threshold per tier: `(tier + 1) * gate_step`.
    pub gate_step: u32,
    /// Progress left after a failed gate.
    pub penalty_floor: u32,
    /// Spirit stones granted on breakthrough.
    pub breakthrough_stones: u64,
    /// Constitution and SpiritRoot gained on breakthrough.
    pub breakthrough_attribute_gain: u32,
    /// Flat progress per rest turn, before the Constitution bonus.
    pub rest_base: u32,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            base_increment: 3,
            insight_threshold: 7,
            insight_bonus: 1,
            gate_step: 20,
            penalty_floor: 90,
            breakthrough_stones: 50,
            breakthrough_attribute_gain: 1,
            rest_base: 5,
        }
    }
}

/// What one cultivation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Progress grew; the bucket is not full yet.
    Progressed { gain: u32, progress: u32 },
    /// The gate was cleared.
    Breakthrough { from: usize, to: usize, roll: u32 },
    /// The gate held; progress dropped to the penalty floor.
    GateFailed { roll: u32, threshold: u32 },
    /// Final tier with a full bucket; nothing left to transition to.
    Terminal,
}

impl AdvanceOutcome {
    pub fn is_breakthrough(&self) -> bool {
        matches!(self, AdvanceOutcome::Breakthrough { .. })
    }
}

/// `base + SpiritRoot / 2 + bonus if Insight > threshold`.
pub fn cultivation_gain(model: &StatModel, rules: &ProgressionRules) -> u32 {
    let mut gain = rules
        .base_increment
        .saturating_add(model.attribute(Attribute::SpiritRoot) / 2);
    if model.attribute(Attribute::Insight) > rules.insight_threshold {
        gain = gain.saturating_add(rules.insight_bonus);
    }
    gain
}

/// Fortune-plus-draw score the gate must exceed at `tier_index`.
pub fn gate_threshold(tier_index: usize, rules: &ProgressionRules) -> u32 {
    let tier = u32::try_from(tier_index).unwrap_or(u32::MAX);
    tier.saturating_add(1).saturating_mul(rules.gate_step)
}

/// Progress regained by one rest turn: `rest_base + Constitution / 2`.
pub fn rest_gain(model: &StatModel, rules: &ProgressionRules) -> u32 {
    rules
        .rest_base
        .saturating_add(model.attribute(Attribute::Constitution) / 2)
}

/// Whether the model sits on the last tier.
pub fn is_final_tier(model: &StatModel, tier_count: usize) -> bool {
    model.tier_index() + 1 >= tier_count
}

/// Fire the gate on a full bucket. No-op (returns `None`) below 100.
pub fn resolve_gate(
    model: &mut StatModel,
    draw: u32,
    tier_count: usize,
    rules: &ProgressionRules,
) -> Option<AdvanceOutcome> {
    if model.progress_points() < MAX_PROGRESS {
        return None;
    }
    if is_final_tier(model, tier_count) {
        log::info!("{} is at the final tier; no further breakthrough", model.name);
        return Some(AdvanceOutcome::Terminal);
    }

    let from = model.tier_index();
    let threshold = gate_threshold(from, rules);
    let roll = model.attribute(Attribute::Fortune).saturating_add(draw);

    if roll > threshold {
        model.promote();
        model.add_resource(resources::SPIRIT_STONES, rules.breakthrough_stones);
        model.raise_attribute(Attribute::Constitution, rules.breakthrough_attribute_gain);
        model.raise_attribute(Attribute::SpiritRoot, rules.breakthrough_attribute_gain);
        log::info!(
            "{} broke through: tier {} -> {} (roll {} > {})",
            model.name,
            from,
            from + 1,
            roll,
            threshold
        );
        Some(AdvanceOutcome::Breakthrough {
            from,
            to: from + 1,
            roll,
        })
    } else {
        model.clamp_progress_to(rules.penalty_floor);
        log::info!(
            "{} failed the gate at tier {} (roll {} <= {})",
            model.name,
            from,
            roll,
            threshold
        );
        Some(AdvanceOutcome::GateFailed { roll, threshold })
    }
}

/// One cultivation call with an injected gate draw.
///
/// Tier never decreases and progress stays in `[0, 100]` for every draw.
pub fn advance_with_draw(
    model: &mut StatModel,
    draw: u32,
    tier_count: usize,
    rules: &ProgressionRules,
) -> AdvanceOutcome {
    if is_final_tier(model, tier_count) && model.progress_points() >= MAX_PROGRESS {
        log::debug!("{} cultivates at the peak; nothing changes", model.name);
        return AdvanceOutcome::Terminal;
    }

    let gain = cultivation_gain(model, rules);
    let progress = model.add_progress(gain);
    resolve_gate(model, draw, tier_count, rules)
        .unwrap_or(AdvanceOutcome::Progressed { gain, progress })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: usize = 9;

    #[test]
    fn test_gain_formula() {
        let rules = ProgressionRules::default();
        let mut model = StatModel::new("Tester");
        assert_eq!(cultivation_gain(&model, &rules), 5);
        model.set_attribute(Attribute::Insight, 8);
        model.set_attribute(Attribute::SpiritRoot, 9);
        assert_eq!(cultivation_gain(&model, &rules), 3 + 4 + 1);
    }

    #[test]
    fn test_failed_gate_clamps_to_penalty_floor() {
        let rules = ProgressionRules::default();
        let mut model = StatModel::new("Tester").with_position(0, 97);
        let outcome = advance_with_draw(&mut model, 10, TIERS, &rules);
        assert_eq!(
            outcome,
            AdvanceOutcome::GateFailed {
                roll: 15,
                threshold: 20
            }
        );
        assert_eq!(model.tier_index(), 0);
        assert_eq!(model.progress_points(), 90);
    }

    #[test]
    fn test_breakthrough_rewards() {
        let rules = ProgressionRules::default();
        let mut model = StatModel::new("Tester").with_position(0, 99);
        model.set_attribute(Attribute::Fortune, 15);
        let outcome = advance_with_draw(&mut model, 6, TIERS, &rules);
        assert_eq!(
            outcome,
            AdvanceOutcome::Breakthrough {
                from: 0,
                to: 1,
                roll: 21
            }
        );
        assert_eq!(model.tier_index(), 1);
        assert_eq!(model.progress_points(), 0);
        assert_eq!(model.resource(resources::SPIRIT_STONES), 150);
        assert_eq!(model.attribute(Attribute::Constitution), 6);
        assert_eq!(model.attribute(Attribute::SpiritRoot), 6);
    }

    #[test]
    fn test_gate_needs_full_bucket() {
        let rules = ProgressionRules::default();
        let mut model = StatModel::new("Tester").with_position(2, 40);
        assert_eq!(resolve_gate(&mut model, 10, TIERS, &rules), None);
        assert_eq!(
            advance_with_draw(&mut model, 10, TIERS, &rules),
            AdvanceOutcome::Progressed {
                gain: 5,
                progress: 45
            }
        );
    }

    #[test]
    fn test_final_tier_is_terminal() {
        let rules = ProgressionRules::default();
        let mut model = StatModel::new("Tester").with_position(TIERS - 1, 98);
        model.set_attribute(Attribute::Fortune, 500);
        assert_eq!(
            advance_with_draw(&mut model, 10, TIERS, &rules),
            AdvanceOutcome::Terminal
        );
        assert_eq!(model.tier_index(), TIERS - 1);
        assert_eq!(model.progress_points(), 100);

        let before = model.clone();
        assert_eq!(
            advance_with_draw(&mut model, 10, TIERS, &rules),
            AdvanceOutcome::Terminal
        );
        assert_eq!(model, before);
    }

    #[test]
    fn test_tier_never_decreases_over_draw_sweep() {
        let rules = ProgressionRules::default();
        for start_tier in 0..TIERS {
            for start_progress in [0, 50, 89, 95, 100] {
                for draw in GATE_DRAW {
                    let mut model =
                        StatModel::new("Tester").with_position(start_tier, start_progress);
                    for _ in 0..30 {
                        let before = model.tier_index();
                        advance_with_draw(&mut model, draw, TIERS, &rules);
                        assert!(model.tier_index() >= before);
                        assert!(model.tier_index() < TIERS);
                        assert!(model.progress_points() <= 100);
                    }
                }
            }
        }
    }

    #[test]
    fn test_extreme_rules_saturate() {
        let rules = ProgressionRules {
            base_increment: u32::MAX,
            insight_bonus: u32::MAX,
            insight_threshold: 0,
            gate_step: u32::MAX,
            rest_base: u32::MAX,
            ..ProgressionRules::default()
        };
        let mut model = StatModel::new("Tester");
        assert_eq!(cultivation_gain(&model, &rules), u32::MAX);
        assert_eq!(rest_gain(&model, &rules), u32::MAX);
        assert_eq!(gate_threshold(TIERS - 1, &rules), u32::MAX);

        model.set_attribute(Attribute::Fortune, u32::MAX);
        let outcome = advance_with_draw(&mut model, 10, TIERS, &rules);
        assert!(matches!(outcome, AdvanceOutcome::GateFailed { roll: u32::MAX, .. }));
        assert_eq!(model.progress_points(), rules.penalty_floor);
    }

    #[test]
    fn test_rest_gain() {
        let rules = ProgressionRules::default();
        let model = StatModel::new("Tester");
        assert_eq!(rest_gain(&model, &rules), 7);
    }
}
