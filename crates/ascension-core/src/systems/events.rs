//! Events system - random encounters between turns
//!
//! After each action the scheduler may roll one event. The chance scales
//! with the world's ambient potency; the kind comes from a weighted content
//! table. Every queued event is resolved in the same turn, marked
//! processed and purged, so the queue is empty at every turn boundary.

use std::collections::VecDeque;

use ascension_logic::constants::{flags, resources};
use ascension_logic::stats::{Attribute, StatModel};
use ascension_logic::world::NEUTRAL_POTENCY;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::battle::{BattleOutcome, BattleResolver};
use crate::content::{EventWeight, Opponent};

/// Price of one herb from a wandering merchant.
pub const MERCHANT_HERB_PRICE: u64 = 20;

/// Kinds of random events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Spirit stones from a herb patch
    HerbDiscovery,
    /// A fellow disciple shares insight
    FellowDisciple,
    /// A rush of qi
    Windfall,
    /// A beast attacks; resolved as a battle
    BeastAmbush,
    /// Inner turmoil; no lasting effect
    MindTurmoil,
    /// Sells one herb if the participant can pay
    WanderingMerchant,
    /// An artifact in old ruins
    AncientRuins,
    /// An auspicious sign
    HeavenlyOmen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    Pending,
    Processed,
}

/// A queued event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: u64,
    pub kind: EventKind,
    /// Turn the event was rolled on
    pub turn: u64,
    pub state: EventState,
}

/// What resolving an event did
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub id: u64,
    pub kind: EventKind,
    pub summary: String,
    /// Quest objectives to advance
    pub objectives: Vec<(String, u32)>,
    pub battle: Option<BattleOutcome>,
}

/// Collaborators an event may need while resolving
pub struct EventContext<'a> {
    pub model: &'a mut StatModel,
    pub opponents: &'a [Opponent],
    pub battle: &'a mut dyn BattleResolver,
    pub rng: &'a mut dyn RngCore,
}

/// Rolls, queues and resolves random events
#[derive(Debug, Clone)]
pub struct EventScheduler {
    queue: VecDeque<GameEvent>,
    next_id: u64,
    base_chance: f64,
    table: Vec<EventWeight>,
}

impl EventScheduler {
    pub fn new(base_chance: f64, table: Vec<EventWeight>) -> Self {
        Self {
            queue: VecDeque::new(),
            next_id: 0,
            base_chance,
            table,
        }
    }

    /// `base_chance × potency / 50`, clamped to `[0, 1]`.
    pub fn chance(&self, ambient_potency: u32) -> f64 {
        let chance = self.base_chance * ambient_potency as f64 / NEUTRAL_POTENCY as f64;
        if chance.is_nan() {
            return 0.0;
        }
        chance.clamp(0.0, 1.0)
    }

    /// Maybe roll an event for `turn`. Does not enqueue it.
    pub fn generate(&mut self, turn: u64, ambient_potency: u32, rng: &mut impl Rng) -> Option<GameEvent> {
        let chance = self.chance(ambient_potency);
        if !rng.gen_bool(chance) {
            return None;
        }

        let total: u32 = self.table.iter().map(|e| e.weight).sum();
        if total == 0 {
            return None;
        }
        let mut roll = rng.gen_range(0..total);
        let kind = self.table.iter().find_map(|entry| {
            if roll < entry.weight {
                Some(entry.kind)
            } else {
                roll -= entry.weight;
                None
            }
        })?;

        let id = self.next_id;
        self.next_id += 1;
        log::debug!("Turn {}: rolled event {:?} (chance {:.2})", turn, kind, chance);
        Some(GameEvent {
            id,
            kind,
            turn,
            state: EventState::Pending,
        })
    }

    pub fn enqueue(&mut self, event: GameEvent) {
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Apply one event's effects.
    pub fn resolve(&self, event: &mut GameEvent, ctx: &mut EventContext<'_>) -> EventOutcome {
        let mut objectives_advanced = Vec::new();
        let mut battle = None;
        let model = &mut *ctx.model;

        let summary = match event.kind {
            EventKind::HerbDiscovery => {
                let stones = ctx.rng.gen_range(10..=50);
                model.add_resource(resources::SPIRIT_STONES, stones);
                format!("Found a herb patch and sold it for {} spirit stones", stones)
            }
            EventKind::FellowDisciple => {
                model.raise_attribute(Attribute::Insight, 1);
                "A fellow disciple shared their insight (+1 insight)".to_string()
            }
            EventKind::Windfall => {
                let gain = ctx.rng.gen_range(5..=15);
                model.add_progress(gain);
                format!("A surge of qi (+{} progress)", gain)
            }
            EventKind::BeastAmbush => {
                let tier = model.tier_index();
                let candidates: Vec<&Opponent> = ctx
                    .opponents
                    .iter()
                    .filter(|o| o.ambush && o.min_tier <= tier)
                    .collect();
                if candidates.is_empty() {
                    "Something rustled in the undergrowth, then nothing".to_string()
                } else {
                    let opponent = candidates[ctx.rng.gen_range(0..candidates.len())];
                    let outcome = ctx.battle.resolve(model, opponent, ctx.rng);
                    outcome.apply(model);
                    model.set_flag(flags::FIRST_COMBAT);
                    if outcome.victory {
                        objectives_advanced.push((opponent.objective.clone(), 1));
                    }
                    let summary = format!(
                        "Ambushed by a {}: {}",
                        opponent.name,
                        if outcome.victory { "victory" } else { "defeat" }
                    );
                    battle = Some(outcome);
                    summary
                }
            }
            EventKind::MindTurmoil => "A wave of doubt passes; you steady your mind".to_string(),
            EventKind::WanderingMerchant => {
                match model.consume_resource(resources::SPIRIT_STONES, MERCHANT_HERB_PRICE) {
                    Ok(_) => {
                        model.add_resource(resources::HERBS, 1);
                        objectives_advanced.push(("trade_items".to_string(), 1));
                        format!("Bought a herb from a wandering merchant for {} stones", MERCHANT_HERB_PRICE)
                    }
                    Err(_) => "A wandering merchant passes by; you cannot afford their wares".to_string(),
                }
            }
            EventKind::AncientRuins => {
                model.add_resource(resources::ARTIFACTS, 1);
                "Unearthed an artifact in ancient ruins".to_string()
            }
            EventKind::HeavenlyOmen => {
                model.add_progress(10);
                "A heavenly omen lights the sky (+10 progress)".to_string()
            }
        };

        event.state = EventState::Processed;
        EventOutcome {
            id: event.id,
            kind: event.kind,
            summary,
            objectives: objectives_advanced,
            battle,
        }
    }

    /// Resolve every queued event in order, then purge the processed ones.
    pub fn resolve_pending(&mut self, ctx: &mut EventContext<'_>) -> Vec<EventOutcome> {
        let mut queue = std::mem::take(&mut self.queue);
        let outcomes = queue
            .iter_mut()
            .map(|event| self.resolve(event, ctx))
            .collect();
        queue.retain(|e| e.state != EventState::Processed);
        self.queue = queue;
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::battle::DuelResolver;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table() -> Vec<EventWeight> {
        vec![
            EventWeight {
                kind: EventKind::HerbDiscovery,
                weight: 1,
            },
            EventWeight {
                kind: EventKind::HeavenlyOmen,
                weight: 1,
            },
        ]
    }

    fn resolve_one(kind: EventKind, model: &mut StatModel) -> EventOutcome {
        let mut scheduler = EventScheduler::new(0.15, table());
        let mut rng = StdRng::seed_from_u64(1);
        let mut duel = DuelResolver;
        scheduler.enqueue(GameEvent {
            id: 0,
            kind,
            turn: 1,
            state: EventState::Pending,
        });
        let mut ctx = EventContext {
            model,
            opponents: &[],
            battle: &mut duel,
            rng: &mut rng,
        };
        let mut outcomes = scheduler.resolve_pending(&mut ctx);
        assert!(scheduler.is_empty());
        outcomes.remove(0)
    }

    #[test]
    fn test_chance_scales_with_potency() {
        let scheduler = EventScheduler::new(0.15, table());
        assert!((scheduler.chance(50) - 0.15).abs() < 1e-9);
        assert!((scheduler.chance(100) - 0.30).abs() < 1e-9);
        assert_eq!(EventScheduler::new(2.0, table()).chance(100), 1.0);
        assert_eq!(EventScheduler::new(0.0, table()).chance(100), 0.0);
    }

    #[test]
    fn test_generation_rate_roughly_matches_chance() {
        let mut scheduler = EventScheduler::new(0.15, table());
        let mut rng = StdRng::seed_from_u64(99);
        let rolled = (0..10_000)
            .filter(|turn| scheduler.generate(*turn, 50, &mut rng).is_some())
            .count();
        assert!((1200..1800).contains(&rolled), "rolled {rolled}");
    }

    #[test]
    fn test_queue_drained_after_resolution() {
        let mut scheduler = EventScheduler::new(1.0, table());
        let mut rng = StdRng::seed_from_u64(5);
        for turn in 0..3 {
            let event = scheduler.generate(turn, 50, &mut rng).unwrap();
            scheduler.enqueue(event);
        }
        assert_eq!(scheduler.pending(), 3);

        let mut model = StatModel::new("Tester");
        let mut duel = DuelResolver;
        let mut event_rng = StdRng::seed_from_u64(6);
        let mut ctx = EventContext {
            model: &mut model,
            opponents: &[],
            battle: &mut duel,
            rng: &mut event_rng,
        };
        let outcomes = scheduler.resolve_pending(&mut ctx);
        assert_eq!(outcomes.len(), 3);
        assert!(scheduler.is_empty());
        let ids: Vec<u64> = outcomes.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_event_effects() {
        let mut model = StatModel::new("Tester");
        resolve_one(EventKind::FellowDisciple, &mut model);
        assert_eq!(model.attribute(Attribute::Insight), 6);

        resolve_one(EventKind::HeavenlyOmen, &mut model);
        assert_eq!(model.progress_points(), 10);

        let before = model.clone();
        resolve_one(EventKind::MindTurmoil, &mut model);
        assert_eq!(model, before);

        resolve_one(EventKind::AncientRuins, &mut model);
        assert_eq!(model.resource(resources::ARTIFACTS), 1);

        let outcome = resolve_one(EventKind::HerbDiscovery, &mut model);
        let stones = model.resource(resources::SPIRIT_STONES);
        assert!((110..=150).contains(&stones), "{}", outcome.summary);
    }

    #[test]
    fn test_merchant_needs_stones() {
        let mut model = StatModel::new("Tester");
        let outcome = resolve_one(EventKind::WanderingMerchant, &mut model);
        assert_eq!(model.resource(resources::HERBS), 1);
        assert_eq!(model.resource(resources::SPIRIT_STONES), 80);
        assert_eq!(outcome.objectives, vec![("trade_items".to_string(), 1)]);

        model.drain_resource(resources::SPIRIT_STONES, 70);
        let outcome = resolve_one(EventKind::WanderingMerchant, &mut model);
        assert_eq!(model.resource(resources::HERBS), 1);
        assert!(outcome.objectives.is_empty());
    }

    #[test]
    fn test_ambush_without_opponents_is_harmless() {
        let mut model = StatModel::new("Tester");
        let before = model.clone();
        let outcome = resolve_one(EventKind::BeastAmbush, &mut model);
        assert!(outcome.battle.is_none());
        assert_eq!(model, before);
    }
}
