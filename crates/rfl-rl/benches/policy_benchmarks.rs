//! Policy Benchmarks
//!
//! Hot paths of one sensing step:
//! 1. classify() - power reading to occupancy state
//! 2. ChannelPolicy::select() - epsilon-greedy / random choice
//! 3. ChannelPolicy::update() - Bellman update + history append
//! 4. snapshot::save()/load() - value table persistence
//!
//! ## Performance Targets
//! - Classification: < 100ns for 5 channels
//! - Select + update: < 2µs per step
//! - Snapshot of a full 5-channel table: < 1ms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rfl_core::AgentConfig;
use rfl_rl::{classify, snapshot, ChannelPolicy, Comparison, OccupancyState, QLearning, RandomBaseline};

fn readings(count: usize, num_channels: usize) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| (0..num_channels).map(|_| rng.gen_range(-80.0..-40.0)).collect())
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    for channels in [5, 16, 64] {
        let reading = readings(1, channels).remove(0);
        group.throughput(Throughput::Elements(channels as u64));
        group.bench_with_input(BenchmarkId::from_parameter(channels), &reading, |b, r| {
            b.iter(|| classify(black_box(r), -60.0, channels));
        });
    }
    group.finish();
}

fn bench_select_update(c: &mut Criterion) {
    let config = AgentConfig::default();
    let states: Vec<OccupancyState> = readings(256, 5)
        .iter()
        .filter_map(|r| classify(r, config.power_threshold_db, 5).ok())
        .collect();

    let mut group = c.benchmark_group("select_update");

    group.bench_function("q_learning", |b| {
        let mut policy = QLearning::with_seed(config.clone(), 1).unwrap();
        let mut i = 0;
        b.iter(|| {
            let state = &states[i % states.len()];
            let next = &states[(i + 1) % states.len()];
            let action = policy.select(black_box(state)).unwrap();
            policy.update(next, 1.0, false).unwrap();
            i += 1;
            action
        });
    });

    group.bench_function("random", |b| {
        let mut policy = RandomBaseline::with_seed(&config, 1).unwrap();
        let mut i = 0;
        b.iter(|| {
            let state = &states[i % states.len()];
            let action = policy.select(black_box(state)).unwrap();
            policy.update(state, 0.0, false).unwrap();
            i += 1;
            action
        });
    });

    group.finish();
}

fn bench_comparison_step(c: &mut Criterion) {
    let data = readings(256, 5);
    c.bench_function("comparison_step", |b| {
        let mut comparison = Comparison::with_config(AgentConfig::default(), Some(3)).unwrap();
        let mut i = 0;
        b.iter(|| {
            let step = comparison.step(black_box(&data[i % data.len()])).unwrap();
            i += 1;
            step.learner_action
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let config = AgentConfig::default();
    let mut policy = QLearning::with_seed(config.clone(), 5).unwrap();
    for reading in readings(5000, 5) {
        let state = classify(&reading, config.power_threshold_db, 5).unwrap();
        policy.select(&state).unwrap();
        policy.update(&state, 1.0, false).unwrap();
    }
    let table = policy.table().clone();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q_table.json");

    c.bench_function("snapshot_save", |b| {
        b.iter(|| snapshot::save(black_box(&table), 5, &path).unwrap());
    });

    snapshot::save(&table, 5, &path).unwrap();
    c.bench_function("snapshot_load", |b| {
        b.iter(|| snapshot::load(black_box(&path), 5).unwrap());
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_select_update,
    bench_comparison_step,
    bench_snapshot
);
criterion_main!(benches);
