//! Sect membership: the entrance test, sect tasks and the contribution
//! exchange.
//!
//! A participant past the mortal tier may try to join one sect. The
//! entrance chance is `(Insight + Fortune) / 20`, divided by the sect's
//! test difficulty `max(1, reputation / 100)`. Members take sect tasks of
//! difficulty 1–5 for `20 × difficulty` contribution, and spend
//! contribution at the exchange. Random draws are passed in so every rule
//! here is deterministic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::resources;
use crate::probability::{attempt, clamp_rate};
use crate::stats::{Attribute, StatError, StatModel};

/// Lowest tier allowed to take the entrance test.
pub const JOIN_MIN_TIER: usize = 1;
/// Spirit stones handed to a new disciple.
pub const JOIN_STONES: u64 = 100;
/// Contribution handed to a new disciple.
pub const JOIN_CONTRIBUTION: u64 = 50;

/// Task difficulty range, inclusive.
pub const TASK_DIFFICULTY: std::ops::RangeInclusive<u32> = 1..=5;
/// Contribution per point of task difficulty.
pub const CONTRIBUTION_PER_DIFFICULTY: u64 = 20;
/// Chance that a completed task also hands out an item.
pub const BONUS_ITEM_CHANCE: f64 = 0.3;
/// Items a completed task may hand out, one unit each.
pub const BONUS_ITEMS: [&str; 3] = [resources::PILLS, resources::ARTIFACTS, resources::MANUALS];

const TASK_BASE: f64 = 0.35;
const TASK_CONSTITUTION: f64 = 0.02;
const TASK_INSIGHT: f64 = 0.015;
const TASK_FORTUNE: f64 = 0.01;
const TASK_DIFFICULTY_PENALTY: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectDef {
    pub id: String,
    pub name: String,
    /// Path the sect teaches, e.g. sword or alchemy.
    pub discipline: String,
    pub reputation: u32,
}

impl SectDef {
    /// Entrance test difficulty, never below 1.
    pub fn test_difficulty(&self) -> u32 {
        (self.reputation / 100).max(1)
    }

    /// Clamped chance of passing the entrance test.
    pub fn join_rate(&self, model: &StatModel) -> f64 {
        let aptitude = model
            .attribute(Attribute::Insight)
            .saturating_add(model.attribute(Attribute::Fortune));
        clamp_rate(aptitude as f64 / 20.0 / self.test_difficulty() as f64)
    }
}

fn default_quantity() -> u64 {
    1
}

/// One entry of the contribution exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOffer {
    pub id: String,
    pub name: String,
    /// Contribution spent per exchange.
    pub cost: u64,
    /// Resource granted.
    pub resource: String,
    #[serde(default = "default_quantity")]
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SectError {
    #[error("sect entrance needs tier {required}, at {current}")]
    TierTooLow { required: usize, current: usize },
    #[error("already a disciple of `{0}`")]
    AlreadyMember(String),
    #[error("not a member of any sect")]
    NotMember,
    #[error(transparent)]
    Contribution(#[from] StatError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined { sect: String },
    /// The test was taken and failed; the turn is spent.
    Failed { rate: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub difficulty: u32,
    pub success: bool,
    /// Contribution earned, zero on failure.
    pub contribution: u64,
    /// Resource key of the extra item, if any.
    pub bonus_item: Option<String>,
}

/// Clamped success chance of a sect task.
///
/// Constitution, Insight and Fortune weigh in at 4:3:2; every point of
/// difficulty costs 0.05.
pub fn task_rate(model: &StatModel, difficulty: u32) -> f64 {
    let raw = TASK_BASE
        + TASK_CONSTITUTION * model.attribute(Attribute::Constitution) as f64
        + TASK_INSIGHT * model.attribute(Attribute::Insight) as f64
        + TASK_FORTUNE * model.attribute(Attribute::Fortune) as f64
        - TASK_DIFFICULTY_PENALTY * difficulty as f64;
    clamp_rate(raw)
}

/// The bonus item picked by `sample`, or `None` above [`BONUS_ITEM_CHANCE`].
fn bonus_item(sample: f64) -> Option<&'static str> {
    if !attempt(BONUS_ITEM_CHANCE, sample) {
        return None;
    }
    let index = (sample / BONUS_ITEM_CHANCE * BONUS_ITEMS.len() as f64) as usize;
    BONUS_ITEMS.get(index.min(BONUS_ITEMS.len() - 1)).copied()
}

/// A participant's sect membership and task record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectStanding {
    sect: Option<String>,
    tasks_completed: u32,
    tasks_failed: u32,
}

impl SectStanding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sect(&self) -> Option<&str> {
        self.sect.as_deref()
    }

    pub fn is_member(&self) -> bool {
        self.sect.is_some()
    }

    pub fn tasks_completed(&self) -> u32 {
        self.tasks_completed
    }

    pub fn tasks_failed(&self) -> u32 {
        self.tasks_failed
    }

    /// Whether `model` may take an entrance test at all.
    pub fn check_join(&self, model: &StatModel) -> Result<(), SectError> {
        if let Some(current) = &self.sect {
            return Err(SectError::AlreadyMember(current.clone()));
        }
        if model.tier_index() < JOIN_MIN_TIER {
            return Err(SectError::TierTooLow {
                required: JOIN_MIN_TIER,
                current: model.tier_index(),
            });
        }
        Ok(())
    }

    /// Take the entrance test with one uniform `sample`.
    pub fn join(&mut self, def: &SectDef, model: &mut StatModel, sample: f64) -> Result<JoinOutcome, SectError> {
        self.check_join(model)?;
        let rate = def.join_rate(model);
        if !attempt(rate, sample) {
            log::info!("{} failed the entrance test of {} ({:.2})", model.name, def.name, rate);
            return Ok(JoinOutcome::Failed { rate });
        }
        self.sect = Some(def.id.clone());
        model.add_resource(resources::SPIRIT_STONES, JOIN_STONES);
        model.add_resource(resources::CONTRIBUTION, JOIN_CONTRIBUTION);
        log::info!("{} joined {}", model.name, def.name);
        Ok(JoinOutcome::Joined { sect: def.id.clone() })
    }

    /// One sect task at a drawn `difficulty`, resolved by `sample`. A
    /// completed task may also hand out an item, picked by `bonus_sample`.
    pub fn perform_task(
        &mut self,
        model: &mut StatModel,
        difficulty: u32,
        sample: f64,
        bonus_sample: f64,
    ) -> Result<TaskOutcome, SectError> {
        if !self.is_member() {
            return Err(SectError::NotMember);
        }
        let difficulty = difficulty.clamp(*TASK_DIFFICULTY.start(), *TASK_DIFFICULTY.end());
        if !attempt(task_rate(model, difficulty), sample) {
            self.tasks_failed = self.tasks_failed.saturating_add(1);
            return Ok(TaskOutcome {
                difficulty,
                success: false,
                contribution: 0,
                bonus_item: None,
            });
        }

        let contribution = difficulty as u64 * CONTRIBUTION_PER_DIFFICULTY;
        model.add_resource(resources::CONTRIBUTION, contribution);
        let bonus = bonus_item(bonus_sample);
        if let Some(item) = bonus {
            model.add_resource(item, 1);
        }
        self.tasks_completed = self.tasks_completed.saturating_add(1);
        log::debug!("{} completed a sect task for {} contribution", model.name, contribution);
        Ok(TaskOutcome {
            difficulty,
            success: true,
            contribution,
            bonus_item: bonus.map(str::to_string),
        })
    }

    /// Spend contribution on `offer`. Returns the contribution left.
    pub fn exchange(&self, offer: &ExchangeOffer, model: &mut StatModel) -> Result<u64, SectError> {
        if !self.is_member() {
            return Err(SectError::NotMember);
        }
        let remaining = model.consume_resource(resources::CONTRIBUTION, offer.cost)?;
        model.add_resource(&offer.resource, offer.quantity);
        log::info!("{} exchanged {} contribution for {}", model.name, offer.cost, offer.name);
        Ok(remaining)
    }
}
