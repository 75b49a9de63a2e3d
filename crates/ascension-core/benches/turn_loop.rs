use std::sync::Arc;

use ascension_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn play(content: &Arc<Content>, turns: u64) -> u64 {
    let mut session = GameSession::new(
        "Bench",
        SimConfig::default().with_seed(1),
        Arc::clone(content),
        shared_world(),
        Box::new(MemorySaveStore::new()),
    )
    .expect("session starts");
    for turn in 0..turns {
        let action = match turn % 3 {
            0 => Action::Explore("azure_cloud_mountains".into()),
            1 => Action::Rest,
            _ => Action::Cultivate,
        };
        if session.run_turn(action).is_err() {
            break;
        }
    }
    session.model().elapsed_turns()
}

fn turn_loop(c: &mut Criterion) {
    let content = Arc::new(Content::builtin().expect("built-in content loads"));
    c.bench_function("100 turns", |b| b.iter(|| play(&content, black_box(100))));
    c.bench_function("full lifespan", |b| b.iter(|| play(&content, black_box(1_000))));
}

criterion_group!(benches, turn_loop);
criterion_main!(benches);
