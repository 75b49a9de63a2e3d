//! Integration tests for the session turn loop.
//!
//! Exercises: turn ordering, event queue draining, autosave, resume,
//! seeded determinism and collaborator failures.

use std::collections::BTreeMap;
use std::sync::Arc;

use ascension_core::content::Opponent;
use ascension_core::engine::{ActionError, ActionResult, EndReason, SessionError};
use ascension_core::guide::{ChatMessage, CompletionError, CompletionService, FALLBACK_LINE};
use ascension_core::persistence::SaveError;
use ascension_core::prelude::*;
use ascension_core::systems::{BattleOutcome, BattleResolver};
use ascension_logic::constants::{flags, resources};
use ascension_logic::snapshot::Snapshot;
use ascension_logic::stats::{Attribute, StatModel};
use rand::RngCore;

// ── Helpers ────────────────────────────────────────────────────────────

fn content() -> Arc<Content> {
    Arc::new(Content::builtin().expect("built-in content loads"))
}

fn session_with(seed: u64, store: Box<dyn SaveStore + Send>) -> GameSession {
    GameSession::new(
        "Lin Mu",
        SimConfig::default().with_seed(seed),
        content(),
        shared_world(),
        store,
    )
    .expect("session starts")
}

fn session(seed: u64) -> GameSession {
    session_with(seed, Box::new(MemorySaveStore::new()))
}

/// Cycles through cultivating, resting and exploring the starting area.
fn scripted(turn: u64) -> Action {
    match turn % 4 {
        0 | 1 => Action::Cultivate,
        2 => Action::Explore("azure_cloud_mountains".into()),
        _ => Action::Rest,
    }
}

struct BrokenStore;

impl SaveStore for BrokenStore {
    fn save(&mut self, _: &str, _: &Snapshot) -> Result<(), SaveError> {
        Err(SaveError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only disk",
        )))
    }

    fn load(&self, _: &str) -> Result<Option<Snapshot>, SaveError> {
        Ok(None)
    }

    fn list_slots(&self) -> Result<Vec<String>, SaveError> {
        Ok(Vec::new())
    }

    fn delete_slot(&mut self, slot: &str) -> Result<(), SaveError> {
        Err(SaveError::MissingSlot(slot.to_string()))
    }
}

struct RateLimited;

impl CompletionService for RateLimited {
    fn complete(&mut self, _: &[ChatMessage]) -> Result<String, CompletionError> {
        Err(CompletionError::RateLimited)
    }
}

/// Loses every fight without touching stats.
struct AlwaysLose;

impl BattleResolver for AlwaysLose {
    fn resolve(&mut self, _: &StatModel, opponent: &Opponent, _: &mut dyn RngCore) -> BattleOutcome {
        BattleOutcome {
            opponent: opponent.id.clone(),
            victory: false,
            rounds: 1,
            resource_deltas: Vec::new(),
            progress_delta: 0,
        }
    }
}

// ── Turn loop ──────────────────────────────────────────────────────────

#[test]
fn event_queue_empty_at_every_turn_boundary() {
    let mut session = session(11);
    for turn in 0..300 {
        assert_eq!(session.pending_events(), 0);
        let report = session.run_turn(scripted(turn)).expect("turn runs");
        assert_eq!(session.pending_events(), 0);
        for event in &report.events {
            assert!(!event.summary.is_empty());
        }
        if !session.is_running() {
            break;
        }
    }
}

#[test]
fn bounds_hold_over_a_long_session() {
    // Default Fortune can never clear the first gate
    let config = SimConfig::default()
        .with_seed(12)
        .with_starting_attributes(BTreeMap::from([
            (Attribute::Fortune, 15),
            (Attribute::SpiritRoot, 5),
        ]));
    let mut session = GameSession::new(
        "Lin Mu",
        config,
        content(),
        shared_world(),
        Box::new(MemorySaveStore::new()),
    )
    .unwrap();
    let mut last_tier = 0;
    while session.is_running() {
        let turn = session.model().elapsed_turns();
        session.run_turn(scripted(turn)).expect("turn runs");
        let model = session.model();
        assert!(model.tier_index() >= last_tier);
        assert!(model.progress_points() <= 100);
        assert!(model.tier_index() < session.content().tier_count());
        last_tier = model.tier_index();
    }
    assert!(matches!(
        session.end_reason(),
        Some(EndReason::Lifespan) | Some(EndReason::Ascended)
    ));
    assert!(last_tier > 0);
    assert!(session.model().has_flag(flags::FIRST_BREAKTHROUGH));
}

#[test]
fn world_refreshes_on_interval() {
    let mut session = session(13);
    let mut refreshed_on = Vec::new();
    for _ in 0..35 {
        let report = session.run_turn(Action::Rest).unwrap();
        if report.world_refreshed {
            refreshed_on.push(report.turn);
        }
    }
    assert_eq!(refreshed_on, vec![10, 20, 30]);
    assert_eq!(session.world().cycle, 3);
}

#[test]
fn same_seed_same_game() {
    let play = |seed| {
        let mut session = session(seed);
        for turn in 0..120 {
            session.run_turn(scripted(turn)).unwrap();
        }
        session.snapshot()
    };
    assert_eq!(play(21), play(21));
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn autosaves_every_twenty_turns() {
    let store = MemorySaveStore::new();
    let mut session = session_with(31, Box::new(store.clone()));
    for turn in 0..19 {
        let report = session.run_turn(scripted(turn)).unwrap();
        assert!(!report.saved);
    }
    assert!(store.load("autosave").unwrap().is_none());

    let report = session.run_turn(Action::Rest).unwrap();
    assert!(report.saved);
    let saved = store.load("autosave").unwrap().expect("autosave written");
    assert_eq!(saved.committed_turn, 20);
    assert_eq!(saved, session.snapshot());
}

#[test]
fn failed_save_is_a_warning() {
    let mut session = session_with(32, Box::new(BrokenStore));
    let report = session.run_turn(Action::Save).unwrap();
    assert!(!report.saved);
    assert!(matches!(report.warnings[..], [TurnWarning::SaveFailed(_)]));
    assert!(session.is_running());
    assert_eq!(session.model().elapsed_turns(), 1);
}

#[test]
fn resume_continues_from_snapshot() {
    let store = MemorySaveStore::new();
    let mut session = session_with(33, Box::new(store.clone()));
    for turn in 0..40 {
        session.run_turn(scripted(turn)).unwrap();
    }
    let expected = session.snapshot();

    let resumed = GameSession::load(
        SimConfig::default().with_seed(33),
        content(),
        shared_world(),
        Box::new(store),
    )
    .expect("resume from autosave");
    assert_eq!(resumed.snapshot(), expected);
    assert_eq!(resumed.model().elapsed_turns(), 40);
}

#[test]
fn resume_rejects_broken_snapshot() {
    let snapshot = Snapshot::new(StatModel::new("Lin Mu").with_position(20, 0));
    let result = GameSession::resume(
        snapshot,
        SimConfig::default(),
        content(),
        shared_world(),
        Box::new(MemorySaveStore::new()),
    );
    assert!(matches!(result, Err(SessionError::Invariant(_))));

    let missing = GameSession::load(
        SimConfig::default(),
        content(),
        shared_world(),
        Box::new(MemorySaveStore::new()),
    );
    assert!(matches!(missing, Err(SessionError::NoSave(_))));
}

// ── Collaborators ──────────────────────────────────────────────────────

#[test]
fn guide_failure_falls_back() {
    let mut session = session(41).with_completion_service(Box::new(RateLimited));
    let stones = session.model().resource(resources::SPIRIT_STONES);
    let report = session.run_turn(Action::Consult("Where next?".into())).unwrap();
    assert_eq!(report.result, ActionResult::Consulted(FALLBACK_LINE.to_string()));
    assert_eq!(
        report.warnings,
        vec![TurnWarning::GuideUnavailable(CompletionError::RateLimited)]
    );
    // Only events may have moved resources
    if report.events.is_empty() {
        assert_eq!(session.model().resource(resources::SPIRIT_STONES), stones);
    }
}

#[test]
fn custom_battle_resolver_is_used() {
    let mut session = session(42).with_battle_resolver(Box::new(AlwaysLose));
    let mut fought = false;
    for _ in 0..100 {
        let report = session
            .run_turn(Action::Explore("azure_cloud_mountains".into()))
            .unwrap();
        if let ActionResult::Explored(outcome) = &report.result {
            if let Some(battle) = &outcome.battle {
                assert!(!battle.victory);
                assert!(outcome.objectives.iter().all(|(id, _)| id != "defeat_beast"));
                fought = true;
            }
        }
    }
    assert!(fought);
    assert!(session.model().has_flag(flags::FIRST_COMBAT));
}

// ── Content flow ───────────────────────────────────────────────────────

#[test]
fn story_quest_completes_and_chains() {
    let mut session = session(51);
    session
        .run_turn(Action::AcceptQuest("q001_find_master".into()))
        .unwrap();
    assert!(session.available_quests().iter().all(|q| q.id != "q002_first_trial"));

    let mut completed = false;
    for _ in 0..150 {
        let report = session
            .run_turn(Action::Explore("azure_cloud_mountains".into()))
            .unwrap();
        if report.completed_quests.iter().any(|q| q == "q001_find_master") {
            completed = true;
            break;
        }
    }
    assert!(completed);
    assert!(session.model().has_flag("completed_q001_find_master"));
    assert!(session.available_quests().iter().any(|q| q.id == "q002_first_trial"));

    // Completion never repeats
    let before = session.snapshot().completed_quests.len();
    session.run_turn(Action::Rest).unwrap();
    assert_eq!(session.snapshot().completed_quests.len(), before);
}

#[test]
fn unknown_targets_are_rejected_without_cost() {
    let mut session = session(52);
    for action in [
        Action::Explore("atlantis".into()),
        Action::Craft("elixir_of_life".into()),
        Action::Refine("azure_blade".into()),
        Action::LearnTechnique("sword_of_nothing".into()),
        Action::AcceptQuest("q999".into()),
        Action::PracticeTechnique {
            id: "evergreen_art".into(),
            hours: 2,
        },
    ] {
        let report = session.run_turn(action).unwrap();
        assert!(report.is_rejected());
    }
    assert_eq!(session.model().elapsed_turns(), 0);
    assert!(matches!(
        session.run_selection("explore netherworld_valley").unwrap().result,
        ActionResult::Rejected(ActionError::Explore(_))
    ));
}

#[test]
fn sessions_share_one_world() {
    let world = shared_world();
    let handles: Vec<_> = (0..3)
        .map(|seed| {
            let world = world.clone();
            std::thread::spawn(move || {
                let mut session = GameSession::new(
                    &format!("Disciple {seed}"),
                    SimConfig::default().with_seed(seed),
                    content(),
                    world,
                    Box::new(MemorySaveStore::new()),
                )
                .unwrap();
                for turn in 0..50 {
                    session.run_turn(scripted(turn)).unwrap();
                }
                session.model().elapsed_turns()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 50);
    }
    assert_eq!(ascension_core::systems::read_world(&world).cycle, 4);
}
