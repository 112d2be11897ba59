//! Criterion benchmarks for MarketLab hot paths.
//!
//! Benchmarks:
//! 1. Single crossover backtest at several series lengths
//! 2. Full IS/OS grid search over the default candidate grid
//! 3. Signal scoring of one price history

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use marketlab_core::data::synthetic::random_walk;
use marketlab_core::optimizer::{optimize_sma_grid, GridSpec};
use marketlab_core::signals::{score_prices, SignalWeights};
use marketlab_core::backtest_sma_cross;

// ── 1. Backtest ──────────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_sma_cross");
    for n in [500usize, 1260, 2520] {
        let series = random_walk("BENCH", n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| backtest_sma_cross(black_box(s), 50, 200))
        });
    }
    group.finish();
}

// ── 2. Grid search ───────────────────────────────────────────────────

fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_sma_grid");
    let series = random_walk("BENCH", 1260);

    group.bench_function("default_grid_1260_bars", |b| {
        let grid = GridSpec::default();
        b.iter(|| optimize_sma_grid(black_box(&series), &grid))
    });

    group.bench_function("8x8_grid_1260_bars", |b| {
        let grid = GridSpec {
            fast_values: vec![5, 10, 15, 20, 30, 40, 50, 60],
            slow_values: vec![80, 100, 120, 150, 180, 200, 250, 300],
            ..GridSpec::default()
        };
        b.iter(|| optimize_sma_grid(black_box(&series), &grid))
    });

    group.finish();
}

// ── 3. Signal scoring ────────────────────────────────────────────────

fn bench_scoring(c: &mut Criterion) {
    let prices = random_walk("BENCH", 252).prices();
    let weights = SignalWeights::default();
    c.bench_function("score_prices_252_bars", |b| {
        b.iter(|| score_prices(black_box(&prices), 0.1, &weights))
    });
}

criterion_group!(benches, bench_backtest, bench_optimizer, bench_scoring);
criterion_main!(benches);
