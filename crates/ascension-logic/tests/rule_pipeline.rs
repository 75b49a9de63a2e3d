//! Integration tests across the rule modules.
//!
//! Exercises: StatModel → progression gate → achievements, and the
//! quest graph under every completed-set permutation.
//!
//! All tests are pure logic: draws are injected, nothing touches a runtime.

use std::collections::BTreeSet;

use ascension_logic::achievements::AchievementTracker;
use ascension_logic::constants::{objectives, DEFAULT_TIERS};
use ascension_logic::graph::{DependencyGraph, NodeDef, NodeState, Objective, Reward};
use ascension_logic::probability::success_rate;
use ascension_logic::progression::{advance_with_draw, AdvanceOutcome, ProgressionRules, GATE_DRAW};
use ascension_logic::stats::{Attribute, StatModel};

// ── Helpers ────────────────────────────────────────────────────────────

fn quest(id: &str, prerequisites: &[&str], objectives: &[(&str, u32)]) -> NodeDef {
    NodeDef {
        id: id.into(),
        title: id.into(),
        description: String::new(),
        objectives: objectives
            .iter()
            .map(|(o, t)| Objective {
                id: (*o).into(),
                target: *t,
                description: String::new(),
            })
            .collect(),
        reward: Reward::default(),
        prerequisites: prerequisites.iter().map(|p| (*p).into()).collect(),
        condition: None,
    }
}

fn story_arc() -> Vec<NodeDef> {
    let mut find = quest("find_master", &[], &[(objectives::FIND_MASTER, 1)]);
    find.reward.next = Some("first_trial".into());
    let mut trial = quest(
        "first_trial",
        &[],
        &[(objectives::COLLECT_HERBS, 3), (objectives::DEFEAT_BEAST, 1)],
    );
    trial.reward.next = Some("join_sect".into());
    trial.reward.resources.insert("spirit_stones".into(), 100);
    let join = quest("join_sect", &[], &[(objectives::EXPLORE_MOUNTAIN, 1)]);
    let side = quest("herb_gathering", &[], &[(objectives::COLLECT_HERBS, 5)]);
    let gated = quest("elder_errand", &["first_trial", "herb_gathering"], &[]);
    vec![find, trial, join, side, gated]
}

fn subsets(ids: &[&str]) -> Vec<BTreeSet<String>> {
    (0..(1u32 << ids.len()))
        .map(|mask| {
            ids.iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| (*id).to_string())
                .collect()
        })
        .collect()
}

// ── Graph properties ───────────────────────────────────────────────────

#[test]
fn unmet_prerequisites_never_available() {
    let graph = DependencyGraph::new(story_arc()).unwrap();
    let ids: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    for completed in subsets(&id_refs) {
        for id in graph.available_nodes(&completed) {
            let def = graph.node(&id).unwrap();
            assert!(
                def.prerequisites.iter().all(|p| completed.contains(p)),
                "{id} offered with {completed:?}"
            );
            assert!(!completed.contains(&id));
        }
    }
}

#[test]
fn story_arc_plays_through() {
    let mut graph = DependencyGraph::new(story_arc()).unwrap();
    let initial = graph.available();
    assert!(initial.contains("find_master"));
    assert!(initial.contains("herb_gathering"));
    assert!(!initial.contains("first_trial"));

    graph.start("find_master").unwrap();
    graph.start("herb_gathering").unwrap();
    graph.record_progress(objectives::FIND_MASTER, 1);
    assert!(graph.check_completion("find_master").unwrap());
    assert_eq!(graph.state("first_trial"), Some(NodeState::Available));

    graph.start("first_trial").unwrap();
    let touched = graph.record_progress(objectives::COLLECT_HERBS, 3);
    assert_eq!(touched.len(), 2);
    assert!(!graph.check_completion("first_trial").unwrap());
    graph.record_progress(objectives::DEFEAT_BEAST, 1);
    assert!(graph.check_completion("first_trial").unwrap());

    assert_eq!(graph.state("elder_errand"), Some(NodeState::Locked));
    graph.record_progress(objectives::COLLECT_HERBS, 2);
    assert_eq!(graph.check_all_active(), vec!["herb_gathering".to_string()]);
    assert_eq!(graph.state("elder_errand"), Some(NodeState::Available));

    let rewards = graph.take_rewards();
    let ids: Vec<&str> = rewards.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["find_master", "first_trial", "herb_gathering"]);
}

// ── Progression properties ─────────────────────────────────────────────

#[test]
fn long_run_keeps_bounds_for_every_draw_sequence() {
    let rules = ProgressionRules::default();
    let tiers = DEFAULT_TIERS.len();
    let draws: Vec<u32> = GATE_DRAW.collect();

    for fortune in [0, 5, 20, 80, 200] {
        let mut model = StatModel::new("Tester");
        model.set_attribute(Attribute::Fortune, fortune);
        let mut last_tier = 0;
        for step in 0..2000 {
            let draw = draws[(step * 7 + fortune as usize) % draws.len()];
            let outcome = advance_with_draw(&mut model, draw, tiers, &rules);
            assert!(model.tier_index() >= last_tier);
            assert!(model.tier_index() < tiers);
            assert!(model.progress_points() <= 100);
            if let AdvanceOutcome::Breakthrough { to, .. } = outcome {
                assert_eq!(to, last_tier + 1);
            }
            last_tier = model.tier_index();
        }
        if fortune >= 200 {
            assert_eq!(model.tier_index(), tiers - 1);
        }
    }
}

#[test]
fn breakthroughs_unlock_tier_achievements() {
    let rules = ProgressionRules::default();
    let mut achievement = quest("qi_refiner", &[], &[]);
    achievement.condition = Some("tier_min:1".into());
    let mut tracker = AchievementTracker::new(vec![achievement]).unwrap();

    let mut model = StatModel::new("Tester").with_position(0, 99);
    model.set_attribute(Attribute::Fortune, 19);
    assert!(tracker.check(&model).is_empty());

    let outcome = advance_with_draw(&mut model, 5, DEFAULT_TIERS.len(), &rules);
    assert!(outcome.is_breakthrough());
    assert_eq!(tracker.check(&model).len(), 1);
    assert!(tracker.check(&model).is_empty());
}

#[test]
fn success_rate_stays_in_band_over_grid() {
    for base in [-1.0, 0.0, 0.3, 0.8, 2.0] {
        for difficulty in [0.0, 3.0, 12.0, 100.0] {
            for skill in [0.0, 50.0, 100.0] {
                for luck in [0.0, 5.0, 50.0] {
                    for quality in [0.0, 1.0, 5.0, 25.0] {
                        let rate = success_rate(base, difficulty, skill, luck, quality);
                        assert!((0.05..=0.95).contains(&rate));
                    }
                }
            }
        }
    }
}
