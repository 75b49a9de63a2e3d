//! Shared environment: season, weather and ambient spiritual potency.
//!
//! The world is refreshed every few turns by the session runtime. Potency
//! feeds success rates through [`crate::probability::ambient_bonus`] and
//! scales the random-event chance. Draws are passed in, so a refresh is
//! deterministic given its inputs.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Potency bounds after every refresh.
pub const MIN_POTENCY: u32 = 10;
pub const MAX_POTENCY: u32 = 100;
pub const NEUTRAL_POTENCY: u32 = 50;

/// Inclusive range of the per-refresh potency jitter.
pub const POTENCY_JITTER: RangeInclusive<i32> = -10..=10;

/// Refresh cycles per season.
const CYCLES_PER_SEASON: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    /// `(cycle / 4) % 4`.
    pub fn for_cycle(cycle: u64) -> Self {
        Self::ALL[((cycle / CYCLES_PER_SEASON) % 4) as usize]
    }

    pub fn potency_modifier(self) -> i32 {
        match self {
            Season::Spring => 10,
            Season::Summer => 5,
            Season::Autumn => 0,
            Season::Winter => -5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Cloudy,
    Drizzle,
    Thunderstorm,
    Fog,
}

impl Weather {
    pub const ALL: [Weather; 5] = [
        Weather::Clear,
        Weather::Cloudy,
        Weather::Drizzle,
        Weather::Thunderstorm,
        Weather::Fog,
    ];

    /// Relative draw weight out of [`Weather::TOTAL_WEIGHT`].
    pub fn weight(self) -> u32 {
        match self {
            Weather::Clear => 40,
            Weather::Cloudy => 30,
            Weather::Drizzle => 15,
            Weather::Thunderstorm => 10,
            Weather::Fog => 5,
        }
    }

    pub const TOTAL_WEIGHT: u32 = 100;

    pub fn potency_modifier(self) -> i32 {
        match self {
            Weather::Clear => 5,
            Weather::Cloudy => 0,
            Weather::Drizzle => -3,
            Weather::Thunderstorm => 15,
            Weather::Fog => -10,
        }
    }

    /// Map a roll in `0..TOTAL_WEIGHT` onto the weighted table. Rolls past
    /// the end land on the last entry.
    pub fn from_roll(roll: u32) -> Self {
        let mut acc = 0;
        for weather in Self::ALL {
            acc += weather.weight();
            if roll < acc {
                return weather;
            }
        }
        Weather::Fog
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `clamp(50 + season + weather + jitter, 10, 100)`.
pub fn ambient_potency(season: Season, weather: Weather, jitter: i32) -> u32 {
    let raw = NEUTRAL_POTENCY as i32 + season.potency_modifier() + weather.potency_modifier() + jitter;
    raw.clamp(MIN_POTENCY as i32, MAX_POTENCY as i32) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    pub cycle: u64,
    pub season: Season,
    pub weather: Weather,
    pub ambient_potency: u32,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            cycle: 0,
            season: Season::Spring,
            weather: Weather::Clear,
            ambient_potency: NEUTRAL_POTENCY,
        }
    }
}

impl WorldState {
    /// Advance one cycle with the given weather and jitter draws.
    pub fn refresh(&mut self, weather: Weather, jitter: i32) {
        self.cycle += 1;
        self.season = Season::for_cycle(self.cycle);
        self.weather = weather;
        self.ambient_potency = ambient_potency(self.season, weather, jitter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_cycles_every_four() {
        assert_eq!(Season::for_cycle(0), Season::Spring);
        assert_eq!(Season::for_cycle(3), Season::Spring);
        assert_eq!(Season::for_cycle(4), Season::Summer);
        assert_eq!(Season::for_cycle(12), Season::Winter);
        assert_eq!(Season::for_cycle(16), Season::Spring);
    }

    #[test]
    fn test_weather_weights_cover_rolls() {
        assert_eq!(Weather::ALL.iter().map(|w| w.weight()).sum::<u32>(), Weather::TOTAL_WEIGHT);
        assert_eq!(Weather::from_roll(0), Weather::Clear);
        assert_eq!(Weather::from_roll(39), Weather::Clear);
        assert_eq!(Weather::from_roll(40), Weather::Cloudy);
        assert_eq!(Weather::from_roll(70), Weather::Drizzle);
        assert_eq!(Weather::from_roll(85), Weather::Thunderstorm);
        assert_eq!(Weather::from_roll(95), Weather::Fog);
        assert_eq!(Weather::from_roll(500), Weather::Fog);
    }

    #[test]
    fn test_potency_clamped() {
        assert_eq!(ambient_potency(Season::Spring, Weather::Thunderstorm, 10), 85);
        assert_eq!(ambient_potency(Season::Winter, Weather::Fog, -10), 25);
        assert_eq!(ambient_potency(Season::Autumn, Weather::Cloudy, 0), 50);
        for season in Season::ALL {
            for weather in Weather::ALL {
                for jitter in POTENCY_JITTER {
                    let p = ambient_potency(season, weather, jitter);
                    assert!((MIN_POTENCY..=MAX_POTENCY).contains(&p));
                }
            }
        }
    }

    #[test]
    fn test_refresh_advances_cycle() {
        let mut world = WorldState::default();
        for _ in 0..4 {
            world.refresh(Weather::Cloudy, 0);
        }
        assert_eq!(world.cycle, 4);
        assert_eq!(world.season, Season::Summer);
        assert_eq!(world.ambient_potency, 55);
    }
}
