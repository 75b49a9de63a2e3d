//! Alchemy (crafting) and artifact refinement.
//!
//! Both actions share the same shape: check the inputs, consume materials
//! atomically, compute a rate, compare one uniform sample. Materials are
//! spent on every attempt, successful or not. A miss is an ordinary
//! outcome variant, never an error.
//!
//! # Alchemy
//!
//! A [`CraftableFormula`] lists ingredient resources. Their catalogue
//! entries give each a quality score `grade × rarity × purity`; the
//! formula's material quality is the quantity-weighted mean. The rate is
//! [`success_rate`] with the alchemy skill, Fortune, that quality and the
//! formula's difficulty, plus the world's ambient bonus on the base.
//!
//! # Refinement
//!
//! A [`RefinableItem`] climbs one level per success up to its grade's
//! maximum. The rate follows [`reinforcement_rate`]; each success scales
//! the item's attributes by 1.1. The material recipe depends on the level
//! band the item is in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::skills;
use crate::probability::{ambient_bonus, attempt, clamp_rate, reinforcement_rate, success_rate};
use crate::stats::{Attribute, StatError, StatModel};

/// Attribute multiplier applied by every successful refinement.
pub const REFINE_SCALING_STEP: f64 = 1.1;

/// Alchemy mastery percent per formula rank.
const MASTERY_PER_RANK: f32 = 10.0;

// ── Ingredients ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngredientGrade {
    Mortal,
    Spirit,
    Immortal,
    Divine,
}

impl IngredientGrade {
    pub fn score(self) -> f64 {
        match self {
            IngredientGrade::Mortal => 1.0,
            IngredientGrade::Spirit => 2.0,
            IngredientGrade::Immortal => 3.0,
            IngredientGrade::Divine => 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Precious,
    Legendary,
}

impl Rarity {
    pub fn score(self) -> f64 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Rare => 2.0,
            Rarity::Precious => 3.0,
            Rarity::Legendary => 5.0,
        }
    }
}

fn default_purity() -> f64 {
    1.0
}

/// Catalogue entry for one ingredient resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDef {
    pub grade: IngredientGrade,
    pub rarity: Rarity,
    /// 0.0–1.0
    #[serde(default = "default_purity")]
    pub purity: f64,
}

impl IngredientDef {
    pub fn quality_score(&self) -> f64 {
        self.grade.score() * self.rarity.score() * self.purity.clamp(0.0, 1.0)
    }
}

/// One resource requirement of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCost {
    pub resource: String,
    pub quantity: u64,
}

fn as_costs(materials: &[MaterialCost]) -> Vec<(String, u64)> {
    materials
        .iter()
        .map(|m| (m.resource.clone(), m.quantity))
        .collect()
}

// ── Alchemy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftableFormula {
    pub id: String,
    pub name: String,
    /// Formula rank, 1–9.
    pub level: u32,
    pub ingredients: Vec<MaterialCost>,
    pub base_success: f64,
    pub difficulty: u32,
    /// Resource produced on success.
    pub product: String,
    #[serde(default = "default_quantity")]
    pub product_quantity: u64,
}

fn default_quantity() -> u64 {
    1
}

impl CraftableFormula {
    /// Alchemy mastery gained per successful craft.
    pub fn skill_experience(&self) -> f32 {
        self.level as f32 * 2.0
    }

    /// Quantity-weighted mean quality of the ingredients. Ingredients
    /// missing from the catalogue count as 1.0.
    pub fn material_quality(&self, catalogue: &BTreeMap<String, IngredientDef>) -> f64 {
        let total: u64 = self.ingredients.iter().map(|m| m.quantity).sum();
        if total == 0 {
            return 1.0;
        }
        let weighted: f64 = self
            .ingredients
            .iter()
            .map(|m| {
                let score = catalogue.get(&m.resource).map_or(1.0, IngredientDef::quality_score);
                score * m.quantity as f64
            })
            .sum();
        weighted / total as f64
    }
}

/// Highest formula rank the given alchemy mastery can attempt.
pub fn alchemy_rank(mastery: f32) -> u32 {
    1 + (mastery.max(0.0) / MASTERY_PER_RANK) as u32
}

/// Success probability for one attempt at `formula`.
pub fn craft_rate(
    formula: &CraftableFormula,
    model: &StatModel,
    material_quality: f64,
    ambient_potency: u32,
) -> f64 {
    success_rate(
        formula.base_success + ambient_bonus(ambient_potency),
        formula.difficulty as f64,
        model.skill(skills::ALCHEMY) as f64,
        model.attribute(Attribute::Fortune) as f64,
        material_quality,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum CraftOutcome {
    Crafted {
        product: String,
        quantity: u64,
        rate: f64,
    },
    Failed {
        rate: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CraftError {
    #[error("formula `{formula}` needs alchemy rank {required}, have {current}")]
    RankTooLow {
        formula: String,
        required: u32,
        current: u32,
    },
    #[error(transparent)]
    Materials(#[from] StatError),
}

/// Attempt a formula with one uniform sample in `[0, 1)`.
///
/// Rejected attempts (rank, materials) leave the model untouched.
pub fn craft(
    model: &mut StatModel,
    formula: &CraftableFormula,
    material_quality: f64,
    ambient_potency: u32,
    sample: f64,
) -> Result<CraftOutcome, CraftError> {
    let current = alchemy_rank(model.skill(skills::ALCHEMY));
    if formula.level > current {
        return Err(CraftError::RankTooLow {
            formula: formula.id.clone(),
            required: formula.level,
            current,
        });
    }

    model.consume_all(&as_costs(&formula.ingredients))?;
    let rate = craft_rate(formula, model, material_quality, ambient_potency);

    if attempt(rate, sample) {
        model.add_resource(&formula.product, formula.product_quantity);
        model.train_skill(skills::ALCHEMY, formula.skill_experience());
        log::info!("{} crafted {} (rate {:.2})", model.name, formula.name, rate);
        Ok(CraftOutcome::Crafted {
            product: formula.product.clone(),
            quantity: formula.product_quantity,
            rate,
        })
    } else {
        log::info!("{} failed to craft {} (rate {:.2})", model.name, formula.name, rate);
        Ok(CraftOutcome::Failed { rate })
    }
}

// ── Refinement ──────────────────────────────────────────────────────────

/// Artifact grade; bounds the refinement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    Implement,
    Spirit,
    Treasure,
    Immortal,
    Divine,
}

impl Grade {
    pub fn max_level(self) -> u32 {
        match self {
            Grade::Implement => 3,
            Grade::Spirit => 6,
            Grade::Treasure => 9,
            Grade::Immortal => 12,
            Grade::Divine => 15,
        }
    }

    pub fn base_power(self) -> u32 {
        match self {
            Grade::Implement => 100,
            Grade::Spirit => 500,
            Grade::Treasure => 2000,
            Grade::Immortal => 8000,
            Grade::Divine => 30000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinableItem {
    pub name: String,
    pub grade: Grade,
    #[serde(default)]
    pub level: u32,
    /// Unscaled attribute values.
    #[serde(default)]
    pub attributes: BTreeMap<String, u32>,
    /// Multiplier applied to every attribute; only ever grows.
    #[serde(default = "default_scaling")]
    pub scaling: f64,
}

fn default_scaling() -> f64 {
    1.0
}

impl RefinableItem {
    pub fn new(name: impl Into<String>, grade: Grade, attributes: BTreeMap<String, u32>) -> Self {
        Self {
            name: name.into(),
            grade,
            level: 0,
            attributes,
            scaling: 1.0,
        }
    }

    pub fn can_refine(&self) -> bool {
        self.level < self.grade.max_level()
    }

    /// Attribute value after scaling, truncated.
    pub fn effective_attribute(&self, name: &str) -> u32 {
        self.attributes
            .get(name)
            .map_or(0, |v| (*v as f64 * self.scaling) as u32)
    }

    pub fn power_rating(&self) -> u32 {
        let attrs: u32 = self
            .attributes
            .keys()
            .map(|k| self.effective_attribute(k) / 10)
            .sum();
        self.grade.base_power() + attrs + self.level * 50
    }
}

/// Index into the recipe table for an item at `level`: 0–2, 3–5, 6–8, 9+.
pub fn recipe_tier(level: u32) -> usize {
    match level {
        0..=2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

/// Refinement rate at `level` shifted by ambient potency.
pub fn refine_rate(level: u32, ambient_potency: u32) -> f64 {
    clamp_rate(reinforcement_rate(level) + ambient_bonus(ambient_potency))
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefineOutcome {
    Refined { level: u32, rate: f64 },
    Failed { rate: f64 },
    /// Grade maximum reached; nothing consumed.
    AtMaximum,
}

/// Attempt one refinement with materials from `recipe` and a uniform
/// sample in `[0, 1)`.
pub fn refine(
    model: &mut StatModel,
    item: &mut RefinableItem,
    recipe: &[MaterialCost],
    ambient_potency: u32,
    sample: f64,
) -> Result<RefineOutcome, StatError> {
    if !item.can_refine() {
        return Ok(RefineOutcome::AtMaximum);
    }

    model.consume_all(&as_costs(recipe))?;
    let rate = refine_rate(item.level, ambient_potency);

    if attempt(rate, sample) {
        item.level += 1;
        item.scaling *= REFINE_SCALING_STEP;
        log::info!("{} refined to +{} (rate {:.2})", item.name, item.level, rate);
        Ok(RefineOutcome::Refined {
            level: item.level,
            rate,
        })
    } else {
        log::info!("{} refinement failed at +{} (rate {:.2})", item.name, item.level, rate);
        Ok(RefineOutcome::Failed { rate })
    }
}
