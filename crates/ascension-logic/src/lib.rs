//! Pure cultivation rules for Ascension.
//!
//! This crate contains all game logic that is independent of any runtime,
//! storage or presentation. Functions take plain data (and explicit random
//! draws) and return results, making them unit-testable and reusable by the
//! session runtime, the headless harness and any future front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`achievements`] | Condition-driven achievements over the dependency graph |
//! | [`condition`] | `kind:value` unlock expressions, parsed and evaluated |
//! | [`constants`] | Tier names, resource/skill/objective keys, story flags |
//! | [`crafting`] | Alchemy formulas, material quality, artifact refinement |
//! | [`farming`] | Spirit-field plots, crop growth and harvest |
//! | [`graph`] | Quest/achievement prerequisite DAG and node lifecycle |
//! | [`probability`] | Clamped success rates shared by crafting and refinement |
//! | [`progression`] | Cultivation gain and the breakthrough gate |
//! | [`sect`] | Sect entrance, sect tasks and the contribution exchange |
//! | [`snapshot`] | Persisted session record |
//! | [`stats`] | Participant stat model and its invariants |
//! | [`techniques`] | Technique requirements, cost and practice |
//! | [`world`] | Season, weather and ambient potency |

pub mod achievements;
pub mod condition;
pub mod constants;
pub mod crafting;
pub mod farming;
pub mod graph;
pub mod probability;
pub mod progression;
pub mod sect;
pub mod snapshot;
pub mod stats;
pub mod techniques;
pub mod world;
