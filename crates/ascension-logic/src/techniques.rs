//! Cultivation techniques: learning requirements, cost and practice.
//!
//! Learning a technique checks a minimum tier and attribute minimums, then
//! charges `level × 20` spirit stones and starts mastery at 10%. Practice
//! adds `Insight / 10 + hours × 0.1` mastery, capped at 100%. A
//! technique's effects scale linearly with mastery.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{resources, MAX_SKILL};
use crate::stats::{Attribute, StatError, StatModel};

/// Spirit stones per technique level.
pub const COST_PER_LEVEL: u64 = 20;
/// Mastery right after learning.
pub const INITIAL_MASTERY: f32 = 10.0;
/// Mastery at which a technique counts as proficient.
pub const PROFICIENCY_MASTERY: f32 = 50.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueDef {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub min_tier: usize,
    #[serde(default)]
    pub requirements: BTreeMap<Attribute, u32>,
    /// Attribute bonus at full mastery.
    #[serde(default)]
    pub effects: BTreeMap<Attribute, u32>,
}

impl TechniqueDef {
    pub fn cost(&self) -> u64 {
        self.level as u64 * COST_PER_LEVEL
    }

    /// Tier and attribute minimums, first unmet one reported.
    pub fn check_requirements(&self, model: &StatModel) -> Result<(), TechniqueError> {
        if model.tier_index() < self.min_tier {
            return Err(TechniqueError::TierTooLow {
                technique: self.id.clone(),
                required: self.min_tier,
                current: model.tier_index(),
            });
        }
        for (attribute, required) in &self.requirements {
            let current = model.attribute(*attribute);
            if current < *required {
                return Err(TechniqueError::AttributeTooLow {
                    technique: self.id.clone(),
                    attribute: *attribute,
                    required: *required,
                    current,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TechniqueError {
    #[error("technique `{0}` already learned")]
    AlreadyLearned(String),
    #[error("technique `{0}` not learned")]
    NotLearned(String),
    #[error("technique `{technique}` needs tier {required}, at {current}")]
    TierTooLow {
        technique: String,
        required: usize,
        current: usize,
    },
    #[error("technique `{technique}` needs {attribute:?} {required}, have {current}")]
    AttributeTooLow {
        technique: String,
        attribute: Attribute,
        required: u32,
        current: u32,
    },
    #[error(transparent)]
    Cost(#[from] StatError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PracticeOutcome {
    pub gain: f32,
    pub mastery: f32,
    /// Mastery crossed [`PROFICIENCY_MASTERY`] on this practice.
    pub became_proficient: bool,
}

/// Learned techniques and their mastery percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechniqueBook {
    mastery: BTreeMap<String, f32>,
}

impl TechniqueBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_learned(&self, id: &str) -> bool {
        self.mastery.contains_key(id)
    }

    pub fn mastery(&self, id: &str) -> Option<f32> {
        self.mastery.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.mastery.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.mastery.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mastery.is_empty()
    }

    /// Check requirements, pay the cost, record initial mastery.
    pub fn learn(&mut self, def: &TechniqueDef, model: &mut StatModel) -> Result<u64, TechniqueError> {
        if self.is_learned(&def.id) {
            return Err(TechniqueError::AlreadyLearned(def.id.clone()));
        }
        def.check_requirements(model)?;
        let cost = def.cost();
        model.consume_resource(resources::SPIRIT_STONES, cost)?;
        self.mastery.insert(def.id.clone(), INITIAL_MASTERY);
        log::info!("{} learned {} for {} spirit stones", model.name, def.name, cost);
        Ok(cost)
    }

    /// Practise a learned technique for `hours`.
    pub fn practice(
        &mut self,
        id: &str,
        model: &StatModel,
        hours: u32,
    ) -> Result<PracticeOutcome, TechniqueError> {
        let mastery = self
            .mastery
            .get_mut(id)
            .ok_or_else(|| TechniqueError::NotLearned(id.to_string()))?;

        let efficiency = model.attribute(Attribute::Insight) as f32 / 10.0 + hours as f32 * 0.1;
        let before = *mastery;
        let gain = efficiency.min(MAX_SKILL - before).max(0.0);
        *mastery = before + gain;

        Ok(PracticeOutcome {
            gain,
            mastery: *mastery,
            became_proficient: before < PROFICIENCY_MASTERY && *mastery >= PROFICIENCY_MASTERY,
        })
    }

    /// Sum of every learned technique's effects scaled by mastery.
    pub fn total_effects(&self, defs: &[TechniqueDef]) -> BTreeMap<Attribute, f32> {
        let mut totals = BTreeMap::new();
        for def in defs {
            let Some(mastery) = self.mastery(&def.id) else {
                continue;
            };
            for (attribute, bonus) in &def.effects {
                *totals.entry(*attribute).or_insert(0.0) += *bonus as f32 * mastery / MAX_SKILL;
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evergreen() -> TechniqueDef {
        let mut requirements = BTreeMap::new();
        requirements.insert(Attribute::Insight, 3);
        let mut effects = BTreeMap::new();
        effects.insert(Attribute::Constitution, 2);
        TechniqueDef {
            id: "evergreen_art".into(),
            name: "Evergreen Art".into(),
            level: 1,
            min_tier: 0,
            requirements,
            effects,
        }
    }

    #[test]
    fn test_learn_charges_and_starts_at_ten() {
        let mut book = TechniqueBook::new();
        let mut model = StatModel::new("Tester");
        assert_eq!(book.learn(&evergreen(), &mut model), Ok(20));
        assert_eq!(model.resource(resources::SPIRIT_STONES), 80);
        assert_eq!(book.mastery("evergreen_art"), Some(10.0));
        assert_eq!(
            book.learn(&evergreen(), &mut model),
            Err(TechniqueError::AlreadyLearned("evergreen_art".into()))
        );
    }

    #[test]
    fn test_learn_checks_requirements_before_paying() {
        let mut def = evergreen();
        def.min_tier = 2;
        let mut book = TechniqueBook::new();
        let mut model = StatModel::new("Tester");
        assert!(matches!(
            book.learn(&def, &mut model),
            Err(TechniqueError::TierTooLow { .. })
        ));

        let mut def = evergreen();
        def.requirements.insert(Attribute::Constitution, 8);
        assert!(matches!(
            book.learn(&def, &mut model),
            Err(TechniqueError::AttributeTooLow { current: 5, .. })
        ));

        let mut def = evergreen();
        def.level = 6;
        assert!(matches!(book.learn(&def, &mut model), Err(TechniqueError::Cost(_))));
        assert_eq!(model.resource(resources::SPIRIT_STONES), 100);
        assert!(book.is_empty());
    }

    #[test]
    fn test_practice_caps_at_full_mastery() {
        let mut book = TechniqueBook::new();
        let mut model = StatModel::new("Tester");
        book.learn(&evergreen(), &mut model).unwrap();

        let outcome = book.practice("evergreen_art", &model, 5).unwrap();
        assert!((outcome.gain - 1.0).abs() < 1e-6);
        assert!(!outcome.became_proficient);

        let mut crossed = 0;
        for _ in 0..200 {
            if book.practice("evergreen_art", &model, 5).unwrap().became_proficient {
                crossed += 1;
            }
        }
        assert_eq!(crossed, 1);
        assert_eq!(book.mastery("evergreen_art"), Some(100.0));
        assert!(book.practice("unknown", &model, 1).is_err());
    }

    #[test]
    fn test_effects_scale_with_mastery() {
        let mut book = TechniqueBook::new();
        let mut model = StatModel::new("Tester");
        book.learn(&evergreen(), &mut model).unwrap();
        let effects = book.total_effects(&[evergreen()]);
        assert!((effects[&Attribute::Constitution] - 0.2).abs() < 1e-6);
    }
}
