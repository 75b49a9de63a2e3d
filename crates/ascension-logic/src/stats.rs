//! Participant stat model: tier, progress, attributes, resources, skills and flags.
//!
//! `StatModel` is the one record every other rule reads and writes. Mutation
//! goes through the methods here so the bounds hold after every call:
//!
//! - `progress_points` always stays in `[0, 100]`
//! - resources never go negative (a consume that would is rejected whole)
//! - skill mastery stays in `[0, 100]`
//! - flags are insertion-only
//! - `elapsed_turns` only moves forward
//!
//! ```
//! use ascension_logic::stats::{Attribute, StatModel};
//!
//! let mut model = StatModel::new("Han Li");
//! model.add_resource("herbs", 3);
//! assert!(model.consume_resource("herbs", 5).is_err());
//! assert_eq!(model.resource("herbs"), 3);
//! assert_eq!(model.attribute(Attribute::Fortune), 5);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{resources, MAX_PROGRESS, MAX_SKILL};

/// Independent capability axes. All start at [`Attribute::STARTING_VALUE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Body strength. Drives battle health and rest recovery.
    Constitution,
    /// Affinity for absorbing qi. Drives cultivation gain.
    SpiritRoot,
    /// Comprehension. Drives technique practice and the cultivation bonus.
    Insight,
    /// Luck. Drives the breakthrough gate and crafting luck.
    Fortune,
}

impl Attribute {
    /// All attributes in order.
    pub const ALL: [Attribute; 4] = [
        Attribute::Constitution,
        Attribute::SpiritRoot,
        Attribute::Insight,
        Attribute::Fortune,
    ];

    pub const STARTING_VALUE: u32 = 5;

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Constitution => "constitution",
            Attribute::SpiritRoot => "spirit_root",
            Attribute::Insight => "insight",
            Attribute::Fortune => "fortune",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Points a new participant distributes across attributes.
pub const ALLOCATION_POINTS: u32 = 20;

/// Rejected stat mutations. These leave the model untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatError {
    #[error("not enough {name}: need {needed}, have {available}")]
    InsufficientResource {
        name: String,
        needed: u64,
        available: u64,
    },
    #[error("allocated {spent} attribute points, only {available} available")]
    AllocationExceeded { spent: u32, available: u32 },
}

/// Check a starting allocation against [`ALLOCATION_POINTS`].
pub fn check_allocation(allocation: &BTreeMap<Attribute, u32>) -> Result<(), StatError> {
    let spent = allocation
        .values()
        .fold(0u32, |total, points| total.saturating_add(*points));
    if spent > ALLOCATION_POINTS {
        return Err(StatError::AllocationExceeded {
            spent,
            available: ALLOCATION_POINTS,
        });
    }
    Ok(())
}

/// A broken model invariant. Always a programming error; fatal to the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("tier index {index} out of range for {tier_count} tiers")]
    TierOutOfRange { index: usize, tier_count: usize },
    #[error("progress {0} outside [0, 100]")]
    ProgressOutOfRange(u32),
    #[error("skill {name} mastery {value} outside [0, 100]")]
    SkillOutOfRange { name: String, value: f32 },
    #[error("event queue holds {0} unresolved events at turn start")]
    EventBacklog(usize),
}

/// One participant's full stat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModel {
    pub name: String,
    tier_index: usize,
    progress_points: u32,
    elapsed_turns: u64,
    attributes: BTreeMap<Attribute, u32>,
    resources: BTreeMap<String, u64>,
    skill_levels: BTreeMap<String, f32>,
    flags: BTreeSet<String>,
}

impl StatModel {
    /// A fresh participant: tier 0, no progress, 100 spirit stones.
    pub fn new(name: impl Into<String>) -> Self {
        let attributes = Attribute::ALL
            .into_iter()
            .map(|a| (a, Attribute::STARTING_VALUE))
            .collect();

        let mut resources = BTreeMap::new();
        resources.insert(resources::SPIRIT_STONES.to_string(), 100);
        for name in [resources::HERBS, resources::PILLS, resources::ARTIFACTS] {
            resources.insert(name.to_string(), 0);
        }

        Self {
            name: name.into(),
            tier_index: 0,
            progress_points: 0,
            elapsed_turns: 0,
            attributes,
            resources,
            skill_levels: BTreeMap::new(),
            flags: BTreeSet::new(),
        }
    }

    /// New participant with hand-picked attributes. Attributes left out of
    /// `allocation` start at 0.
    pub fn with_allocation(
        name: impl Into<String>,
        allocation: &BTreeMap<Attribute, u32>,
    ) -> Result<Self, StatError> {
        check_allocation(allocation)?;
        let mut model = Self::new(name);
        for attribute in Attribute::ALL {
            model.set_attribute(attribute, allocation.get(&attribute).copied().unwrap_or(0));
        }
        Ok(model)
    }

    // ── Tier & progress ─────────────────────────────────────────────────

    pub fn tier_index(&self) -> usize {
        self.tier_index
    }

    pub fn progress_points(&self) -> u32 {
        self.progress_points
    }

    /// Add progress, saturating at 100. Returns the new value.
    pub fn add_progress(&mut self, amount: u32) -> u32 {
        self.progress_points = self.progress_points.saturating_add(amount).min(MAX_PROGRESS);
        self.progress_points
    }

    /// Remove progress, saturating at 0. Returns the new value.
    pub fn remove_progress(&mut self, amount: u32) -> u32 {
        self.progress_points = self.progress_points.saturating_sub(amount);
        self.progress_points
    }

    /// Lower progress to `ceiling` if it is currently above it.
    pub fn clamp_progress_to(&mut self, ceiling: u32) {
        self.progress_points = self.progress_points.min(ceiling.min(MAX_PROGRESS));
    }

    /// Move up exactly one tier and reset progress. Callers check the gate
    /// and the tier count first.
    pub(crate) fn promote(&mut self) {
        self.tier_index += 1;
        self.progress_points = 0;
    }

    // ── Time ────────────────────────────────────────────────────────────

    pub fn elapsed_turns(&self) -> u64 {
        self.elapsed_turns
    }

    pub fn advance_turn(&mut self) -> u64 {
        self.elapsed_turns += 1;
        self.elapsed_turns
    }

    // ── Attributes ──────────────────────────────────────────────────────

    pub fn attribute(&self, attribute: Attribute) -> u32 {
        self.attributes.get(&attribute).copied().unwrap_or(0)
    }

    pub fn raise_attribute(&mut self, attribute: Attribute, amount: u32) -> u32 {
        let value = self.attributes.entry(attribute).or_insert(0);
        *value = value.saturating_add(amount);
        *value
    }

    pub fn attributes(&self) -> &BTreeMap<Attribute, u32> {
        &self.attributes
    }

    /// Overwrite an attribute. Initial point allocation only.
    pub fn set_attribute(&mut self, attribute: Attribute, value: u32) {
        self.attributes.insert(attribute, value);
    }

    // ── Resources ───────────────────────────────────────────────────────

    pub fn resource(&self, name: &str) -> u64 {
        self.resources.get(name).copied().unwrap_or(0)
    }

    pub fn resources(&self) -> &BTreeMap<String, u64> {
        &self.resources
    }

    pub fn add_resource(&mut self, name: &str, amount: u64) -> u64 {
        let value = self.resources.entry(name.to_string()).or_insert(0);
        *value = value.saturating_add(amount);
        *value
    }

    /// Subtract `amount`, or reject without touching anything.
    pub fn consume_resource(&mut self, name: &str, amount: u64) -> Result<u64, StatError> {
        let available = self.resource(name);
        if available < amount {
            return Err(StatError::InsufficientResource {
                name: name.to_string(),
                needed: amount,
                available,
            });
        }
        let remaining = available - amount;
        self.resources.insert(name.to_string(), remaining);
        Ok(remaining)
    }

    /// Subtract several resources atomically: all or nothing.
    pub fn consume_all(&mut self, costs: &[(String, u64)]) -> Result<(), StatError> {
        // Merge duplicate names so "herbs x2, herbs x2" is checked as 4.
        let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
        for (name, amount) in costs {
            *totals.entry(name.as_str()).or_insert(0) += amount;
        }
        for (name, needed) in &totals {
            let available = self.resource(name);
            if available < *needed {
                return Err(StatError::InsufficientResource {
                    name: name.to_string(),
                    needed: *needed,
                    available,
                });
            }
        }
        for (name, needed) in totals {
            let value = self.resources.entry(name.to_string()).or_insert(0);
            *value -= needed;
        }
        Ok(())
    }

    /// Take up to `amount`, never more than is held. Returns what was taken.
    pub fn drain_resource(&mut self, name: &str, amount: u64) -> u64 {
        let taken = self.resource(name).min(amount);
        if taken > 0 {
            let value = self.resources.entry(name.to_string()).or_insert(0);
            *value -= taken;
        }
        taken
    }

    // ── Skills ──────────────────────────────────────────────────────────

    pub fn skill(&self, name: &str) -> f32 {
        self.skill_levels.get(name).copied().unwrap_or(0.0)
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.skill_levels.contains_key(name)
    }

    pub fn skill_levels(&self) -> &BTreeMap<String, f32> {
        &self.skill_levels
    }

    /// Set mastery, clamped to `[0, 100]`. Non-finite values become 0.
    pub fn set_skill(&mut self, name: &str, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(0.0, MAX_SKILL)
        } else {
            0.0
        };
        self.skill_levels.insert(name.to_string(), value);
        value
    }

    pub fn train_skill(&mut self, name: &str, gain: f32) -> f32 {
        let current = self.skill(name);
        self.set_skill(name, current + gain.max(0.0))
    }

    // ── Flags ───────────────────────────────────────────────────────────

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Record a one-time trigger. Returns `true` the first time only.
    pub fn set_flag(&mut self, flag: &str) -> bool {
        self.flags.insert(flag.to_string())
    }

    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    // ── Invariants ──────────────────────────────────────────────────────

    pub fn validate(&self, tier_count: usize) -> Result<(), InvariantViolation> {
        if self.tier_index >= tier_count {
            return Err(InvariantViolation::TierOutOfRange {
                index: self.tier_index,
                tier_count,
            });
        }
        if self.progress_points > MAX_PROGRESS {
            return Err(InvariantViolation::ProgressOutOfRange(self.progress_points));
        }
        if let Some((name, value)) = self
            .skill_levels
            .iter()
            .find(|(_, v)| !(0.0..=MAX_SKILL).contains(*v))
        {
            return Err(InvariantViolation::SkillOutOfRange {
                name: name.clone(),
                value: *value,
            });
        }
        Ok(())
    }

    /// Test and restore hook: place the model at an arbitrary tier/progress.
    /// Values are clamped to the progress bound but the tier is not checked
    /// here; `validate` reports it.
    pub fn with_position(mut self, tier_index: usize, progress_points: u32) -> Self {
        self.tier_index = tier_index;
        self.progress_points = progress_points.min(MAX_PROGRESS);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_participant_defaults() {
        let model = StatModel::new("Tester");
        assert_eq!(model.tier_index(), 0);
        assert_eq!(model.progress_points(), 0);
        assert_eq!(model.elapsed_turns(), 0);
        assert_eq!(model.resource(resources::SPIRIT_STONES), 100);
        for attr in Attribute::ALL {
            assert_eq!(model.attribute(attr), 5);
        }
        assert!(model.validate(9).is_ok());
    }

    #[test]
    fn test_allocation() {
        let allocation = BTreeMap::from([(Attribute::Fortune, 15), (Attribute::SpiritRoot, 5)]);
        let model = StatModel::with_allocation("Tester", &allocation).unwrap();
        assert_eq!(model.attribute(Attribute::Fortune), 15);
        assert_eq!(model.attribute(Attribute::Insight), 0);

        let greedy = BTreeMap::from([(Attribute::Fortune, 15), (Attribute::Insight, 6)]);
        assert_eq!(
            StatModel::with_allocation("Tester", &greedy).unwrap_err(),
            StatError::AllocationExceeded {
                spent: 21,
                available: ALLOCATION_POINTS
            }
        );
    }

    #[test]
    fn test_progress_saturates_both_ends() {
        let mut model = StatModel::new("Tester");
        assert_eq!(model.add_progress(250), 100);
        assert_eq!(model.remove_progress(400), 0);
        model.add_progress(95);
        model.clamp_progress_to(90);
        assert_eq!(model.progress_points(), 90);
        model.clamp_progress_to(95);
        assert_eq!(model.progress_points(), 90);
    }

    #[test]
    fn test_consume_rejects_without_mutation() {
        let mut model = StatModel::new("Tester");
        let err = model.consume_resource(resources::SPIRIT_STONES, 101).unwrap_err();
        assert_eq!(
            err,
            StatError::InsufficientResource {
                name: resources::SPIRIT_STONES.into(),
                needed: 101,
                available: 100,
            }
        );
        assert_eq!(model.resource(resources::SPIRIT_STONES), 100);
        assert_eq!(model.consume_resource(resources::SPIRIT_STONES, 100), Ok(0));
    }

    #[test]
    fn test_consume_all_is_atomic() {
        let mut model = StatModel::new("Tester");
        model.add_resource("herbs", 3);
        let costs = vec![
            (resources::SPIRIT_STONES.to_string(), 50),
            ("herbs".to_string(), 2),
            ("herbs".to_string(), 2),
        ];
        assert!(model.consume_all(&costs).is_err());
        assert_eq!(model.resource(resources::SPIRIT_STONES), 100);
        assert_eq!(model.resource("herbs"), 3);

        let costs = vec![
            (resources::SPIRIT_STONES.to_string(), 50),
            ("herbs".to_string(), 3),
        ];
        assert!(model.consume_all(&costs).is_ok());
        assert_eq!(model.resource(resources::SPIRIT_STONES), 50);
        assert_eq!(model.resource("herbs"), 0);
    }

    #[test]
    fn test_drain_takes_at_most_held() {
        let mut model = StatModel::new("Tester");
        assert_eq!(model.drain_resource(resources::SPIRIT_STONES, 30), 30);
        assert_eq!(model.drain_resource(resources::SPIRIT_STONES, 500), 70);
        assert_eq!(model.resource(resources::SPIRIT_STONES), 0);
    }

    #[test]
    fn test_skill_clamped() {
        let mut model = StatModel::new("Tester");
        assert_eq!(model.set_skill("alchemy", 150.0), 100.0);
        assert_eq!(model.set_skill("alchemy", -3.0), 0.0);
        assert_eq!(model.set_skill("alchemy", f32::NAN), 0.0);
        model.train_skill("alchemy", 12.5);
        assert!((model.skill("alchemy") - 12.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_flags_insert_once() {
        let mut model = StatModel::new("Tester");
        assert!(model.set_flag("first_breakthrough"));
        assert!(!model.set_flag("first_breakthrough"));
        assert!(model.has_flag("first_breakthrough"));
    }

    #[test]
    fn test_validate_catches_out_of_range_tier() {
        let model = StatModel::new("Tester").with_position(9, 0);
        assert_eq!(
            model.validate(9),
            Err(InvariantViolation::TierOutOfRange {
                index: 9,
                tier_count: 9
            })
        );
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for attr in Attribute::ALL {
            assert_eq!(Attribute::from_name(attr.name()), Some(attr));
        }
        assert_eq!(Attribute::from_name("charisma"), None);
    }
}
