//! Systems - runtime logic that drives the pure rules each turn

mod battle;
mod events;
mod exploration;
mod progression;
mod world;

pub use battle::*;
pub use events::*;
pub use exploration::*;
pub use progression::*;
pub use world::*;
