//! Ascension Headless Simulation Harness
//!
//! Validates the pure rules and the built-in content, then plays seeded
//! sessions on worker threads that share one world. Runs entirely
//! in-process: no terminal UI, no network, saves kept in memory.
//!
//! Usage:
//!   cargo run -p ascension-simtest
//!   cargo run -p ascension-simtest -- --verbose --sessions 8 --turns 400

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use ascension_core::engine::{ActionResult, EndReason};
use ascension_core::persistence::encode_snapshot;
use ascension_core::prelude::*;
use ascension_core::systems::read_world;
use ascension_logic::condition::{evaluate_expr, Condition};
use ascension_logic::constants::{resources, MAX_PROGRESS};
use ascension_logic::graph::{GraphError, NodeState};
use ascension_logic::probability::{self, MAX_RATE, MIN_RATE};
use ascension_logic::progression::{advance_with_draw, AdvanceOutcome, GATE_DRAW};
use ascension_logic::stats::{Attribute, StatModel};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "ascension-simtest")]
#[command(about = "Validate cultivation rules and play seeded sessions headlessly")]
struct Args {
    /// Print every check, not just failures
    #[arg(short, long)]
    verbose: bool,

    /// Turns each session plays
    #[arg(short, long, default_value = "300")]
    turns: u64,

    /// Base seed; session `n` uses `seed + n`
    #[arg(short, long, default_value = "7")]
    seed: u64,

    /// Concurrent sessions sharing one world
    #[arg(long, default_value = "4")]
    sessions: u64,

    /// JSON config file (defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    println!("=== Ascension Simulation Harness ===\n");

    let config = match &args.config {
        Some(path) => match SimConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config {} rejected: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => SimConfig::default(),
    };

    let mut results = Vec::new();

    // 1. Built-in content
    let content = match Content::builtin() {
        Ok(content) => Arc::new(content),
        Err(e) => {
            println!("  ✗ content_parse: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_content(&content));

    // 2. Gate and bucket rules
    results.extend(validate_progression(&config));

    // 3. Condition grammar
    results.extend(validate_conditions());

    // 4. Quest dependency graph
    results.extend(validate_quest_graph(&content));

    // 5. Probability bands
    results.extend(validate_probability());

    // 6. Save round trip
    results.extend(validate_persistence(&config, &content, args.seed));

    // 7. Concurrent sessions on one world
    results.extend(validate_sessions(&config, &content, &args));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed,
        results.len(),
        failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Content ──────────────────────────────────────────────────────────

fn validate_content(content: &Content) -> Vec<TestResult> {
    println!("--- Content ---");
    let mut results = Vec::new();

    results.push(check(
        "content_tiers",
        content.tier_count() >= 2,
        format!(
            "{} tiers, {} .. {}",
            content.tier_count(),
            content.tier_name(0),
            content.tier_name(content.tier_count().saturating_sub(1))
        ),
    ));

    let bad_conditions: Vec<&str> = content
        .achievements
        .iter()
        .filter(|a| match &a.condition {
            Some(expr) => Condition::parse(expr).is_err(),
            None => true,
        })
        .map(|a| a.id.as_str())
        .collect();
    results.push(check(
        "achievement_conditions_parse",
        bad_conditions.is_empty(),
        format!(
            "{} achievements, rejected: {:?}",
            content.achievements.len(),
            bad_conditions
        ),
    ));

    let formulas_ok = content
        .formulas
        .iter()
        .all(|f| !f.ingredients.is_empty() && f.base_success > 0.0);
    results.push(check(
        "formulas_have_ingredients",
        formulas_ok,
        format!("{} formulas", content.formulas.len()),
    ));

    let unreachable: Vec<&str> = content
        .locations
        .iter()
        .filter(|l| l.discoveries.is_empty())
        .map(|l| l.id.as_str())
        .collect();
    results.push(check(
        "locations_have_discoveries",
        unreachable.is_empty(),
        format!("{} locations, empty: {:?}", content.locations.len(), unreachable),
    ));

    let stray_crops: Vec<&str> = content
        .crops
        .iter()
        .filter(|c| !content.ingredients.contains_key(&c.yields))
        .map(|c| c.id.as_str())
        .collect();
    results.push(check(
        "crops_yield_ingredients",
        stray_crops.is_empty(),
        format!("{} crops, uncatalogued: {:?}", content.crops.len(), stray_crops),
    ));

    let exchange_ok = !content.sects.is_empty() && content.sect_exchange.iter().all(|o| o.cost > 0);
    results.push(check(
        "sect_exchange_priced",
        exchange_ok,
        format!(
            "{} sects, {} offers",
            content.sects.len(),
            content.sect_exchange.len()
        ),
    ));

    results
}

// ── 2. Progression ──────────────────────────────────────────────────────

fn validate_progression(config: &SimConfig) -> Vec<TestResult> {
    println!("--- Progression ---");
    let rules = &config.progression;
    let tiers = 9;
    let mut results = Vec::new();

    // Default Fortune can never beat the first gate
    let mut model = StatModel::new("Gatekeeper").with_position(0, MAX_PROGRESS - 3);
    let outcome = advance_with_draw(&mut model, *GATE_DRAW.end(), tiers, rules);
    results.push(check(
        "gate_failure_clamps",
        matches!(outcome, AdvanceOutcome::GateFailed { .. })
            && model.progress_points() == rules.penalty_floor
            && model.tier_index() == 0,
        format!("{:?}, progress {}", outcome, model.progress_points()),
    ));

    let mut model = StatModel::new("Fortunate").with_position(0, MAX_PROGRESS - 1);
    model.set_attribute(Attribute::Fortune, 15);
    let stones = model.resource(resources::SPIRIT_STONES);
    let outcome = advance_with_draw(&mut model, *GATE_DRAW.end(), tiers, rules);
    results.push(check(
        "breakthrough_promotes",
        outcome.is_breakthrough()
            && model.tier_index() == 1
            && model.progress_points() == 0
            && model.resource(resources::SPIRIT_STONES) == stones + rules.breakthrough_stones,
        format!("{:?}", outcome),
    ));

    let mut model = StatModel::new("Peak").with_position(tiers - 1, MAX_PROGRESS);
    let outcome = advance_with_draw(&mut model, *GATE_DRAW.start(), tiers, rules);
    results.push(check(
        "final_tier_terminal",
        outcome == AdvanceOutcome::Terminal && model.validate(tiers).is_ok(),
        format!("{:?}", outcome),
    ));

    // Every draw keeps the model in bounds
    let mut violations = 0;
    let mut rng = StdRng::seed_from_u64(99);
    let mut model = StatModel::new("Sweep");
    model.set_attribute(Attribute::Fortune, 20);
    for _ in 0..5_000 {
        let tier = model.tier_index();
        advance_with_draw(&mut model, rng.gen_range(GATE_DRAW), tiers, rules);
        if model.tier_index() < tier || model.validate(tiers).is_err() {
            violations += 1;
        }
    }
    results.push(check(
        "progression_bounds_sweep",
        violations == 0,
        format!(
            "5000 calls, final tier {}, {} violations",
            model.tier_index(),
            violations
        ),
    ));

    results
}

// ── 3. Conditions ───────────────────────────────────────────────────────

fn validate_conditions() -> Vec<TestResult> {
    println!("--- Conditions ---");
    let mut results = Vec::new();

    let fresh = StatModel::new("Novice");
    let risen = StatModel::new("Adept").with_position(1, 0);
    let expr = "tier_min:1,resource:spirit_stones:100";
    results.push(check(
        "conjunction_evaluates",
        !evaluate_expr(expr, &fresh) && evaluate_expr(expr, &risen),
        expr,
    ));

    let malformed = ["", "tier:", "tier_min:x", "nonsense:3", "resource:5"];
    let leaked: Vec<&str> = malformed
        .iter()
        .copied()
        .filter(|e| evaluate_expr(e, &risen))
        .collect();
    results.push(check(
        "malformed_is_false",
        leaked.is_empty(),
        format!("{} malformed inputs, leaked {:?}", malformed.len(), leaked),
    ));

    let roundtrip = Condition::parse(expr).map(|c| c.to_string());
    results.push(check(
        "condition_display",
        roundtrip.as_deref() == Ok(expr),
        format!("{:?}", roundtrip),
    ));

    results
}

// ── 4. Quest graph ──────────────────────────────────────────────────────

fn validate_quest_graph(content: &Content) -> Vec<TestResult> {
    println!("--- Quest Graph ---");
    let mut results = Vec::new();

    let mut graph = match content.quest_graph() {
        Ok(graph) => graph,
        Err(e) => {
            results.push(check("quest_graph_builds", false, e.to_string()));
            return results;
        }
    };
    results.push(check(
        "quest_graph_builds",
        true,
        format!("{} quests", graph.len()),
    ));

    let roots = graph.ids_in_state(NodeState::Available).len();
    results.push(check(
        "quest_graph_has_roots",
        roots > 0,
        format!("{} available at start", roots),
    ));

    // Every locked node must name at least one prerequisite
    let locked: Vec<String> = graph
        .ids_in_state(NodeState::Locked)
        .into_iter()
        .map(String::from)
        .collect();
    let refused = locked.iter().all(|id| {
        matches!(
            graph.start(id),
            Err(GraphError::PrerequisitesUnmet { .. })
        )
    });
    results.push(check(
        "locked_quests_refuse_start",
        refused,
        format!("{} locked", locked.len()),
    ));

    results
}

// ── 5. Probability ──────────────────────────────────────────────────────

fn validate_probability() -> Vec<TestResult> {
    println!("--- Probability ---");
    let mut results = Vec::new();

    let mut out_of_band = 0;
    let mut non_monotonic = 0;
    for difficulty in 0..=10 {
        let mut last = 0.0;
        for skill in (0..=100).step_by(5) {
            let rate = probability::success_rate(0.6, difficulty as f64, skill as f64, 5.0, 1.0);
            if !(MIN_RATE..=MAX_RATE).contains(&rate) {
                out_of_band += 1;
            }
            if rate < last {
                non_monotonic += 1;
            }
            last = rate;
        }
    }
    results.push(check(
        "success_rate_band",
        out_of_band == 0 && non_monotonic == 0,
        format!("{} out of band, {} decreasing steps", out_of_band, non_monotonic),
    ));

    let mut rng = StdRng::seed_from_u64(3);
    let rate = 0.3;
    let trials = 20_000;
    let hits = (0..trials)
        .filter(|_| probability::attempt(rate, rng.gen::<f64>()))
        .count();
    let observed = hits as f64 / trials as f64;
    results.push(check(
        "attempt_frequency",
        (observed - rate).abs() < 0.02,
        format!("expected {:.2}, observed {:.3}", rate, observed),
    ));

    results
}

// ── 6. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(config: &SimConfig, content: &Arc<Content>, seed: u64) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let store = MemorySaveStore::new();
    let mut session = match GameSession::new(
        "Archivist",
        config.clone().with_seed(seed),
        Arc::clone(content),
        shared_world(),
        Box::new(store.clone()),
    ) {
        Ok(session) => session,
        Err(e) => {
            results.push(check("persistence_session", false, e.to_string()));
            return results;
        }
    };
    for _ in 0..30 {
        if session.run_turn(Action::Cultivate).is_err() {
            break;
        }
    }
    let saved = session.save().is_ok();
    let snapshot = session.snapshot();
    let loaded = store.load(&config.save_slot).ok().flatten();
    results.push(check(
        "save_roundtrip",
        saved && loaded.as_ref() == Some(&snapshot),
        format!("committed turn {}", snapshot.committed_turn),
    ));

    let stable = match (encode_snapshot(&snapshot), encode_snapshot(&snapshot)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    results.push(check("save_bytes_stable", stable, "same state, same bytes"));

    results
}

// ── 7. Sessions ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SessionSummary {
    elapsed: u64,
    tier: usize,
    rejected: u64,
    events: u64,
    quests: BTreeSet<String>,
    achievements: BTreeSet<String>,
    end: Option<EndReason>,
    error: Option<String>,
}

/// Random pick among the offered actions; never quits.
fn autoplay(session: &mut GameSession, seed: u64, turns: u64) -> SessionSummary {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut summary = SessionSummary::default();
    let mut attempts = 0;
    while session.is_running() && session.model().elapsed_turns() < turns && attempts < turns * 4 {
        attempts += 1;
        let offered: Vec<Action> = session
            .available_actions()
            .into_iter()
            .filter(|a| !matches!(a, Action::Quit | Action::Consult(_)))
            .collect();
        let action = if offered.is_empty() || rng.gen_bool(0.4) {
            Action::Cultivate
        } else {
            offered[rng.gen_range(0..offered.len())].clone()
        };
        match session.run_turn(action) {
            Ok(report) => {
                if matches!(report.result, ActionResult::Rejected(_)) {
                    summary.rejected += 1;
                }
                summary.events += report.events.len() as u64;
                summary.quests.extend(report.completed_quests);
                summary.achievements.extend(report.unlocked_achievements);
            }
            Err(e) => {
                summary.error = Some(e.to_string());
                break;
            }
        }
    }
    summary.elapsed = session.model().elapsed_turns();
    summary.tier = session.model().tier_index();
    summary.end = session.end_reason();
    summary
}

fn validate_sessions(config: &SimConfig, content: &Arc<Content>, args: &Args) -> Vec<TestResult> {
    println!("--- Sessions ---");
    let mut results = Vec::new();
    let world = shared_world();

    let mut allocation = config.starting_attributes.clone();
    if allocation.is_empty() {
        allocation = BTreeMap::from([
            (Attribute::Fortune, 12),
            (Attribute::SpiritRoot, 4),
            (Attribute::Constitution, 2),
            (Attribute::Insight, 2),
        ]);
    }

    let handles: Vec<_> = (0..args.sessions)
        .map(|n| {
            let seed = args.seed + n;
            let config = config
                .clone()
                .with_seed(seed)
                .with_starting_attributes(allocation.clone());
            let content = Arc::clone(content);
            let world = world.clone();
            let turns = args.turns;
            thread::spawn(move || {
                let store = Box::new(MemorySaveStore::new());
                match GameSession::new(&format!("Disciple {n}"), config, content, world, store) {
                    Ok(mut session) => autoplay(&mut session, seed, turns),
                    Err(e) => SessionSummary {
                        error: Some(e.to_string()),
                        ..SessionSummary::default()
                    },
                }
            })
        })
        .collect();

    let mut summaries = Vec::new();
    for (n, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(summary) => summaries.push(summary),
            Err(_) => results.push(check(&format!("session_{n}_thread"), false, "panicked")),
        }
    }

    for (n, s) in summaries.iter().enumerate() {
        log::info!("Session {}: {:?}", n, s);
        let finished = s.elapsed == args.turns || s.end.is_some();
        results.push(check(
            &format!("session_{n}"),
            s.error.is_none() && finished,
            format!(
                "{} turns, tier {}, {} events, {} rejected, {} quests, {} achievements, end {:?}{}",
                s.elapsed,
                s.tier,
                s.events,
                s.rejected,
                s.quests.len(),
                s.achievements.len(),
                s.end,
                s.error.as_deref().map(|e| format!(", error: {e}")).unwrap_or_default()
            ),
        ));
    }

    let furthest = summaries.iter().map(|s| s.elapsed).max().unwrap_or(0);
    let expected_cycle = furthest.saturating_sub(1) / config.world_refresh_interval;
    let cycle = read_world(&world).cycle;
    results.push(check(
        "world_refreshed_once_per_cycle",
        cycle == expected_cycle,
        format!("cycle {} after {} turns (expected {})", cycle, furthest, expected_cycle),
    ));

    let advanced = summaries.iter().filter(|s| s.tier > 0).count();
    results.push(check(
        "sessions_break_through",
        args.turns < 100 || advanced > 0,
        format!("{}/{} sessions past the first tier", advanced, summaries.len()),
    ));

    results
}
