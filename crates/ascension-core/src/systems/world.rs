//! World system - shared season, weather and potency
//!
//! One [`SharedWorld`] may be read by many sessions. Only the refresh path
//! takes the write lock, and a refresh for a cycle that already happened
//! is skipped, so concurrent sessions on the same turn refresh it once.

use std::sync::{Arc, PoisonError, RwLock};

use ascension_logic::world::{Weather, WorldState, POTENCY_JITTER};
use rand::Rng;

pub type SharedWorld = Arc<RwLock<WorldState>>;

pub fn shared_world() -> SharedWorld {
    Arc::new(RwLock::new(WorldState::default()))
}

/// Copy of the current world state.
pub fn read_world(world: &SharedWorld) -> WorldState {
    world.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Roll weather and jitter and advance one cycle.
pub fn refresh_world(state: &mut WorldState, rng: &mut impl Rng) {
    let weather = Weather::from_roll(rng.gen_range(0..Weather::TOTAL_WEIGHT));
    let jitter = rng.gen_range(POTENCY_JITTER);
    state.refresh(weather, jitter);
    log::debug!(
        "World cycle {}: {} / {} (potency {})",
        state.cycle,
        state.season,
        state.weather,
        state.ambient_potency
    );
}

/// Refresh on every `interval`-th turn. Returns true if this call refreshed.
pub fn maybe_refresh(world: &SharedWorld, turn: u64, interval: u64, rng: &mut impl Rng) -> bool {
    if interval == 0 || turn == 0 || turn % interval != 0 {
        return false;
    }
    let target_cycle = turn / interval;
    let mut state = world.write().unwrap_or_else(PoisonError::into_inner);
    if state.cycle >= target_cycle {
        return false;
    }
    refresh_world(&mut state, rng);
    true
}
