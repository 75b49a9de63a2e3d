//! Game constants: tier names, resource keys, skill keys, objective ids and flags.
//!
//! Plain string and numeric constants with no runtime dependency. Content
//! files refer to the same keys, and the harness uses them to drive sessions.

/// Upper bound of the cultivation progress accumulator.
pub const MAX_PROGRESS: u32 = 100;

/// Upper bound of a skill mastery percentage.
pub const MAX_SKILL: f32 = 100.0;

/// The built-in ordered realm sequence.
pub const DEFAULT_TIERS: [&str; 9] = [
    "Mortal",
    "Qi Refining",
    "Foundation Establishment",
    "Golden Core",
    "Nascent Soul",
    "Spirit Severing",
    "Unity",
    "Mahayana",
    "Tribulation Transcendence",
];

pub mod resources {
    /// Base currency.
    pub const SPIRIT_STONES: &str = "spirit_stones";
    pub const HERBS: &str = "herbs";
    pub const PILLS: &str = "pills";
    pub const ARTIFACTS: &str = "artifacts";
    pub const MANUALS: &str = "manuals";
    /// Sect currency earned from sect tasks and quest rewards.
    pub const CONTRIBUTION: &str = "contribution";
}

pub mod skills {
    pub const ALCHEMY: &str = "alchemy";
    pub const REFINING: &str = "refining";
}

pub mod objectives {
    pub const COLLECT_HERBS: &str = "collect_herbs";
    pub const DEFEAT_BEAST: &str = "defeat_beast";
    pub const FIND_MASTER: &str = "find_master";
    pub const EXPLORE_MOUNTAIN: &str = "explore_mountain";
    pub const CRAFT_PILL: &str = "craft_pill";
    pub const REFINE_ARTIFACT: &str = "refine_artifact";
    pub const BREAKTHROUGH: &str = "breakthrough";
    pub const JOIN_SECT: &str = "join_sect";
}

pub mod flags {
    pub const FIRST_BREAKTHROUGH: &str = "first_breakthrough";
    pub const FIRST_COMBAT: &str = "first_combat";
    /// Prefix for per-quest completion flags (`completed_<id>`).
    pub const COMPLETED_PREFIX: &str = "completed_";
}
