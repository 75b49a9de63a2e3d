//! Weighted success-rate rules shared by crafting and refinement.
//!
//! Every probabilistic action resolves through two steps: compute a rate
//! from modifiers, then compare one uniform sample against it. The rate is
//! always hard-clamped to `[0.05, 0.95]`, so no combination of inputs makes
//! an action certain or impossible.
//!
//! ```
//! use ascension_logic::probability::{attempt, reinforcement_rate, success_rate};
//!
//! let rate = success_rate(0.8, 2.0, 0.0, 5.0, 1.2);
//! assert!((0.05..=0.95).contains(&rate));
//! assert!(attempt(rate, 0.0));
//! assert!((reinforcement_rate(5) - 0.65).abs() < 1e-9);
//! ```

/// Lowest reachable success probability.
pub const MIN_RATE: f64 = 0.05;
/// Highest reachable success probability.
pub const MAX_RATE: f64 = 0.95;

/// Per mastery percent of the acting skill.
pub const SKILL_COEFFICIENT: f64 = 0.003;
/// Per point of the Fortune attribute.
pub const LUCK_COEFFICIENT: f64 = 0.02;
/// Per unit of material quality above 1.0.
pub const QUALITY_COEFFICIENT: f64 = 0.2;
/// Per point of difficulty.
pub const DIFFICULTY_COEFFICIENT: f64 = 0.08;

/// Refinement rate at level 0.
const REINFORCE_BASE: f64 = 0.9;
/// Refinement rate lost per level already reached.
const REINFORCE_STEP: f64 = 0.05;
/// Refinement rate never drops below this.
const REINFORCE_FLOOR: f64 = 0.3;

/// Success probability for a crafting-style action.
///
/// `base + 0.003·skill + 0.02·luck + 0.2·(quality − 1) − 0.08·difficulty`,
/// clamped to `[MIN_RATE, MAX_RATE]`. Non-decreasing in skill, luck and
/// quality; non-increasing in difficulty. A non-finite intermediate result
/// (infinite inputs) falls to the floor.
pub fn success_rate(
    base: f64,
    difficulty: f64,
    actor_skill: f64,
    actor_luck: f64,
    material_quality: f64,
) -> f64 {
    let raw = base + SKILL_COEFFICIENT * actor_skill + LUCK_COEFFICIENT * actor_luck
        + QUALITY_COEFFICIENT * (material_quality - 1.0)
        - DIFFICULTY_COEFFICIENT * difficulty;
    clamp_rate(raw)
}

/// Clamp any raw probability into the reachable band.
pub fn clamp_rate(raw: f64) -> f64 {
    if raw.is_nan() {
        return MIN_RATE;
    }
    raw.clamp(MIN_RATE, MAX_RATE)
}

/// Additive base-rate modifier from the world's ambient potency (0–100).
///
/// Neutral at 50; ±0.1 at the extremes.
pub fn ambient_bonus(ambient_potency: u32) -> f64 {
    (ambient_potency as f64 - 50.0) / 500.0
}

/// Compare one uniform sample in `[0, 1)` against a rate.
pub fn attempt(rate: f64, sample: f64) -> bool {
    sample < rate
}

/// Refinement success rate at the item's current level.
///
/// Diminishing returns are explicit here rather than folded into
/// [`success_rate`]: `max(0.3, 0.9 − 0.05·level)`.
pub fn reinforcement_rate(level: u32) -> f64 {
    (REINFORCE_BASE - level as f64 * REINFORCE_STEP).max(REINFORCE_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds_extremes() {
        assert_eq!(success_rate(10.0, 0.0, 100.0, 100.0, 5.0), MAX_RATE);
        assert_eq!(success_rate(-10.0, 50.0, 0.0, 0.0, 0.0), MIN_RATE);
        assert_eq!(success_rate(f64::INFINITY, 0.0, 0.0, 0.0, 1.0), MAX_RATE);
        assert_eq!(success_rate(0.5, f64::INFINITY, 0.0, 0.0, 1.0), MIN_RATE);
        assert_eq!(
            success_rate(f64::INFINITY, f64::INFINITY, 0.0, 0.0, 1.0),
            MIN_RATE
        );
    }

    #[test]
    fn test_rate_formula_midrange() {
        // 0.6 + 0.03 + 0.1 + 0.04 - 0.4 = 0.37
        let rate = success_rate(0.6, 5.0, 10.0, 5.0, 1.2);
        assert!((rate - 0.37).abs() < 1e-9);
    }

    #[test]
    fn test_rate_monotonic_sweep() {
        let steps: Vec<f64> = (0..=40).map(|i| i as f64 * 2.5).collect();
        for window in steps.windows(2) {
            let (lo, hi) = (window[0], window[1]);
            assert!(success_rate(0.5, 3.0, hi, 5.0, 1.0) >= success_rate(0.5, 3.0, lo, 5.0, 1.0));
            assert!(success_rate(0.5, 3.0, 10.0, hi, 1.0) >= success_rate(0.5, 3.0, 10.0, lo, 1.0));
            assert!(
                success_rate(0.5, 3.0, 10.0, 5.0, hi / 20.0)
                    >= success_rate(0.5, 3.0, 10.0, 5.0, lo / 20.0)
            );
            assert!(success_rate(0.5, hi, 10.0, 5.0, 1.0) <= success_rate(0.5, lo, 10.0, 5.0, 1.0));
        }
    }

    #[test]
    fn test_attempt_compares_sample() {
        assert!(attempt(0.5, 0.49));
        assert!(!attempt(0.5, 0.5));
        assert!(!attempt(MIN_RATE, 0.99));
    }

    #[test]
    fn test_reinforcement_rate_curve() {
        assert!((reinforcement_rate(0) - 0.9).abs() < 1e-9);
        assert!((reinforcement_rate(5) - 0.65).abs() < 1e-9);
        assert!((reinforcement_rate(12) - 0.3).abs() < 1e-9);
        assert!((reinforcement_rate(40) - 0.3).abs() < 1e-9);
        for level in 0..20 {
            assert!(reinforcement_rate(level + 1) <= reinforcement_rate(level));
        }
    }

    #[test]
    fn test_ambient_bonus_neutral_at_fifty() {
        assert_eq!(ambient_bonus(50), 0.0);
        assert!((ambient_bonus(100) - 0.1).abs() < 1e-9);
        assert!((ambient_bonus(10) + 0.08).abs() < 1e-9);
    }
}
