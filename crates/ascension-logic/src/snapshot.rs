//! Persisted session record.
//!
//! Everything a session needs to resume, and nothing derived. All
//! collections are ordered so the same state always encodes to the same
//! bytes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::crafting::RefinableItem;
use crate::farming::Farm;
use crate::sect::SectStanding;
use crate::stats::StatModel;
use crate::techniques::TechniqueBook;

/// Bumped whenever the layout below changes.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub stats: StatModel,
    pub completed_quests: BTreeSet<String>,
    pub failed_quests: BTreeSet<String>,
    /// Objective counters of every active quest.
    pub active_quests: BTreeMap<String, BTreeMap<String, u32>>,
    pub unlocked_achievements: BTreeSet<String>,
    /// Owned artifacts keyed by artifact id.
    pub items: BTreeMap<String, RefinableItem>,
    pub techniques: TechniqueBook,
    pub sect: SectStanding,
    pub farm: Farm,
    /// `elapsed_turns` at the moment of the save.
    pub committed_turn: u64,
}

impl Snapshot {
    /// Empty record for a fresh participant.
    pub fn new(stats: StatModel) -> Self {
        let committed_turn = stats.elapsed_turns();
        Self {
            version: SNAPSHOT_VERSION,
            stats,
            completed_quests: BTreeSet::new(),
            failed_quests: BTreeSet::new(),
            active_quests: BTreeMap::new(),
            unlocked_achievements: BTreeSet::new(),
            items: BTreeMap::new(),
            techniques: TechniqueBook::new(),
            sect: SectStanding::new(),
            farm: Farm::new(),
            committed_turn,
        }
    }
}
