//! Spirit fields: planting, growth, water, fertilizer and harvest.
//!
//! A [`Farm`] owns plots of [`SLOTS_PER_PLOT`] slots each. Every turn a
//! watered plot gives each of its crops one turn of growth and loses
//! [`WATER_PER_TURN`] water; a dry plot stalls. A crop passes through four
//! [`GrowthStage`]s and matures once three quarters of its growth time
//! have passed. Quality is fixed at maturity from Spirit Root, Insight,
//! the plot's fertilizer and one jitter draw, and scales the harvest.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::resources;
use crate::crafting::Rarity;
use crate::stats::{Attribute, StatError, StatModel};

pub const SLOTS_PER_PLOT: usize = 4;
pub const STARTING_PLOTS: usize = 2;
pub const MAX_PLOTS: usize = 6;
/// Spirit stones per plot already owned.
pub const EXPANSION_COST_PER_PLOT: u64 = 100;

pub const MAX_WATER: u32 = 100;
pub const WATER_PER_ACTION: u32 = 30;
/// Lost by a planted plot each turn.
pub const WATER_PER_TURN: u32 = 5;

pub const MAX_FERTILIZER: u32 = 5;
/// Fertilizer bags in a new farm's store.
pub const STARTING_FERTILIZER: u32 = 5;

pub const BASE_QUALITY: f64 = 0.7;
/// Range the engine draws quality jitter from.
pub const QUALITY_JITTER: Range<f64> = -0.2..0.3;
const SPIRIT_ROOT_QUALITY: f64 = 0.02;
const INSIGHT_QUALITY: f64 = 0.01;
const FERTILIZER_QUALITY: f64 = 0.02;
const MIN_QUALITY: f64 = 0.1;
const MAX_QUALITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GrowthStage {
    Seed,
    Sprout,
    Growing,
    Mature,
}

impl GrowthStage {
    /// Stage after `growth` turns of a crop needing `growth_turns`.
    pub fn from_growth(growth: u32, growth_turns: u32) -> Self {
        if growth_turns == 0 {
            return GrowthStage::Mature;
        }
        let quarters = (growth as u64 * 4) / growth_turns as u64;
        match quarters {
            0 => GrowthStage::Seed,
            1 => GrowthStage::Sprout,
            2 => GrowthStage::Growing,
            _ => GrowthStage::Mature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropDef {
    pub id: String,
    pub name: String,
    pub growth_turns: u32,
    pub rarity: Rarity,
    /// Attribute minimums for planting.
    #[serde(default)]
    pub requirements: BTreeMap<Attribute, u32>,
    /// Resource the harvest yields.
    pub yields: String,
    /// Spirit stones at quality 0.5.
    #[serde(default)]
    pub stones: u64,
    /// Objective recorded per harvested crop.
    #[serde(default)]
    pub objective: Option<String>,
}

impl CropDef {
    pub fn base_yield(&self) -> u64 {
        match self.rarity {
            Rarity::Common => 2,
            _ => 1,
        }
    }

    /// Resource units and spirit stones at `quality`. Always at least one unit.
    pub fn harvest_yield(&self, quality: f64) -> (u64, u64) {
        let multiplier = quality.clamp(MIN_QUALITY, MAX_QUALITY) * 2.0;
        let units = ((self.base_yield() as f64 * multiplier) as u64).max(1);
        let stones = (self.stones as f64 * multiplier) as u64;
        (units, stones)
    }

    pub fn check_requirements(&self, model: &StatModel) -> Result<(), FarmError> {
        for (attribute, required) in &self.requirements {
            let current = model.attribute(*attribute);
            if current < *required {
                return Err(FarmError::AttributeTooLow {
                    crop: self.id.clone(),
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
pub enum FarmError {
    #[error("crop `{crop}` needs {attribute:?} {required}, have {current}")]
    AttributeTooLow {
        crop: String,
        attribute: Attribute,
        required: u32,
        current: u32,
    },
    #[error("no free slot in any plot")]
    NoFreeSlot,
    #[error("no plot {0}")]
    NoPlot(usize),
    #[error("fertilizer store is empty")]
    NoFertilizer,
    #[error("plot {0} is fully fertilized")]
    FertilizerFull(usize),
    #[error("no mature crops to harvest")]
    NothingToHarvest,
    #[error("farm is at its plot limit")]
    FarmFull,
    #[error(transparent)]
    Cost(#[from] StatError),
}

/// Quality fixed at maturity, clamped to `[0.1, 1.0]`.
pub fn crop_quality(model: &StatModel, fertilizer: u32, jitter: f64) -> f64 {
    let raw = BASE_QUALITY
        + SPIRIT_ROOT_QUALITY * model.attribute(Attribute::SpiritRoot) as f64
        + INSIGHT_QUALITY * model.attribute(Attribute::Insight) as f64
        + FERTILIZER_QUALITY * fertilizer as f64
        + jitter;
    if raw.is_nan() {
        return MIN_QUALITY;
    }
    raw.clamp(MIN_QUALITY, MAX_QUALITY)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantedCrop {
    pub crop: String,
    /// Turns of growth received so far.
    pub growth: u32,
    /// Set once the crop matures.
    pub quality: Option<f64>,
}

impl PlantedCrop {
    pub fn is_mature(&self) -> bool {
        self.quality.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    slots: Vec<Option<PlantedCrop>>,
    water: u32,
    fertilizer: u32,
}

impl Default for Plot {
    fn default() -> Self {
        Self {
            slots: vec![None; SLOTS_PER_PLOT],
            water: MAX_WATER,
            fertilizer: 0,
        }
    }
}

impl Plot {
    pub fn slots(&self) -> &[Option<PlantedCrop>] {
        &self.slots
    }

    pub fn water(&self) -> u32 {
        self.water
    }

    pub fn fertilizer(&self) -> u32 {
        self.fertilizer
    }

    pub fn is_planted(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    fn crops_mut(&mut self) -> impl Iterator<Item = &mut PlantedCrop> {
        self.slots.iter_mut().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOutcome {
    pub crops: Vec<String>,
    /// Resources gained, spirit stones included.
    pub resources: BTreeMap<String, u64>,
    /// Quest objectives advanced by the harvest.
    pub objectives: BTreeMap<String, u32>,
}

/// One participant's fields and fertilizer store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    plots: Vec<Plot>,
    fertilizer: u32,
}

impl Default for Farm {
    fn default() -> Self {
        Self {
            plots: vec![Plot::default(); STARTING_PLOTS],
            fertilizer: STARTING_FERTILIZER,
        }
    }
}

impl Farm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn fertilizer_stock(&self) -> u32 {
        self.fertilizer
    }

    /// First empty `(plot, slot)`, in plot order.
    pub fn free_slot(&self) -> Option<(usize, usize)> {
        self.plots.iter().enumerate().find_map(|(p, plot)| {
            plot.slots
                .iter()
                .position(Option::is_none)
                .map(|s| (p, s))
        })
    }

    pub fn has_harvest(&self) -> bool {
        self.plots
            .iter()
            .flat_map(|p| p.slots.iter().flatten())
            .any(PlantedCrop::is_mature)
    }

    pub fn expansion_cost(&self) -> u64 {
        self.plots.len() as u64 * EXPANSION_COST_PER_PLOT
    }

    fn plot_mut(&mut self, index: usize) -> Result<&mut Plot, FarmError> {
        self.plots.get_mut(index).ok_or(FarmError::NoPlot(index))
    }

    /// Plant `def` in the first free slot.
    pub fn plant(&mut self, def: &CropDef, model: &StatModel) -> Result<(usize, usize), FarmError> {
        def.check_requirements(model)?;
        let (plot, slot) = self.free_slot().ok_or(FarmError::NoFreeSlot)?;
        self.plots[plot].slots[slot] = Some(PlantedCrop {
            crop: def.id.clone(),
            growth: 0,
            quality: None,
        });
        log::debug!("{} planted {} in plot {} slot {}", model.name, def.name, plot, slot);
        Ok((plot, slot))
    }

    /// Returns the plot's new water level.
    pub fn water(&mut self, plot: usize) -> Result<u32, FarmError> {
        let plot = self.plot_mut(plot)?;
        plot.water = plot.water.saturating_add(WATER_PER_ACTION).min(MAX_WATER);
        Ok(plot.water)
    }

    /// Spend one bag from the store. Returns the plot's new level.
    pub fn fertilize(&mut self, index: usize) -> Result<u32, FarmError> {
        if self.fertilizer == 0 {
            return Err(FarmError::NoFertilizer);
        }
        let plot = self.plot_mut(index)?;
        if plot.fertilizer >= MAX_FERTILIZER {
            return Err(FarmError::FertilizerFull(index));
        }
        plot.fertilizer += 1;
        let level = plot.fertilizer;
        self.fertilizer -= 1;
        Ok(level)
    }

    /// Pay for one more plot.
    pub fn expand(&mut self, model: &mut StatModel) -> Result<u64, FarmError> {
        if self.plots.len() >= MAX_PLOTS {
            return Err(FarmError::FarmFull);
        }
        let cost = self.expansion_cost();
        model.consume_resource(resources::SPIRIT_STONES, cost)?;
        self.plots.push(Plot::default());
        log::info!("{} expanded the farm to {} plots", model.name, self.plots.len());
        Ok(cost)
    }

    /// One turn of growth. Returns the ids of crops that matured, each
    /// given a quality from one `jitter` draw. Crops missing from
    /// `catalogue` never grow.
    pub fn tick(
        &mut self,
        catalogue: &[CropDef],
        model: &StatModel,
        mut jitter: impl FnMut() -> f64,
    ) -> Vec<String> {
        let mut matured = Vec::new();
        for plot in &mut self.plots {
            if !plot.is_planted() || plot.water == 0 {
                continue;
            }
            plot.water = plot.water.saturating_sub(WATER_PER_TURN);
            let fertilizer = plot.fertilizer;
            for crop in plot.crops_mut() {
                if crop.is_mature() {
                    continue;
                }
                let Some(def) = catalogue.iter().find(|c| c.id == crop.crop) else {
                    continue;
                };
                crop.growth = crop.growth.saturating_add(1);
                if GrowthStage::from_growth(crop.growth, def.growth_turns) == GrowthStage::Mature {
                    crop.quality = Some(crop_quality(model, fertilizer, jitter()));
                    matured.push(crop.crop.clone());
                }
            }
        }
        matured
    }

    /// Clear every mature crop and pay out its yield.
    pub fn harvest(&mut self, catalogue: &[CropDef], model: &mut StatModel) -> Result<HarvestOutcome, FarmError> {
        let mut outcome = HarvestOutcome {
            crops: Vec::new(),
            resources: BTreeMap::new(),
            objectives: BTreeMap::new(),
        };
        for slot in self.plots.iter_mut().flat_map(|p| p.slots.iter_mut()) {
            let Some(quality) = slot.as_ref().and_then(|c| c.quality) else {
                continue;
            };
            let Some(crop) = slot.take() else {
                continue;
            };
            if let Some(def) = catalogue.iter().find(|c| c.id == crop.crop) {
                let (units, stones) = def.harvest_yield(quality);
                *outcome.resources.entry(def.yields.clone()).or_insert(0) += units;
                if stones > 0 {
                    *outcome
                        .resources
                        .entry(resources::SPIRIT_STONES.to_string())
                        .or_insert(0) += stones;
                }
                if let Some(objective) = &def.objective {
                    *outcome.objectives.entry(objective.clone()).or_insert(0) += 1;
                }
            }
            outcome.crops.push(crop.crop);
        }
        if outcome.crops.is_empty() {
            return Err(FarmError::NothingToHarvest);
        }
        for (name, amount) in &outcome.resources {
            model.add_resource(name, *amount);
        }
        log::info!("{} harvested {} crops", model.name, outcome.crops.len());
        Ok(outcome)
    }
}
