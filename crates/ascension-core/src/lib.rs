//! Ascension Core - turn-based cultivation session runtime
//!
//! Drives the pure rules in `ascension-logic` one turn at a time: draws
//! randomness from a seeded RNG, loads content and configuration, resolves
//! random events and battles, and persists snapshots.
//!
//! # Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `engine` | `GameSession`: the fixed per-turn sequence and presentation views |
//! | `systems` | Progression, world refresh, exploration, battles, event scheduling |
//! | `content` | Built-in tiers, quests, achievements, recipes, locations, opponents, sects, crops |
//! | `config` | `SimConfig` tunables, loadable from JSON |
//! | `guide` | `CompletionService` seam and the bounded guide conversation |
//! | `persistence` | Versioned bincode snapshots and `SaveStore` backends |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ascension_core::prelude::*;
//!
//! let content = Arc::new(Content::builtin().unwrap());
//! let mut session = GameSession::new(
//!     "Lin Mu",
//!     SimConfig::default().with_seed(7),
//!     content,
//!     shared_world(),
//!     Box::new(MemorySaveStore::new()),
//! )
//! .unwrap();
//!
//! while session.is_running() {
//!     session.run_turn(Action::Cultivate).unwrap();
//! }
//! ```

pub mod config;
pub mod content;
pub mod engine;
pub mod guide;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::content::Content;
    pub use crate::engine::{Action, ActionResult, GameSession, TurnError, TurnReport, TurnWarning};
    pub use crate::persistence::{FileSaveStore, MemorySaveStore, SaveStore};
    pub use crate::systems::{shared_world, SharedWorld};
}
