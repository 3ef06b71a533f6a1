//! Criterion benchmarks for glidepath_core
//!
//! Run with: cargo bench -p glidepath_core

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glidepath_core::analysis::{Goal, RiskConfig, StreamingOptions, analyze_run, analyze_streaming};
use glidepath_core::config::{AssumptionSetBuilder, SimulationBuilder, SimulationConfig};
use glidepath_core::model::{AllocationWeights, Periodicity, RegimeModel};
use glidepath_core::optimization::{compute_efficient_frontier, max_sharpe_portfolio};
use glidepath_core::{CapitalMarketModel, SimulationEngine};

fn baseline(periodicity: Periodicity) -> CapitalMarketModel {
    let set = AssumptionSetBuilder::us_baseline().build().unwrap();
    CapitalMarketModel::new(Arc::new(set), periodicity).unwrap()
}

fn regime_model() -> CapitalMarketModel {
    let set = AssumptionSetBuilder::us_baseline()
        .regimes(RegimeModel::bull_bear_crisis_monthly())
        .build()
        .unwrap();
    CapitalMarketModel::new(Arc::new(set), Periodicity::Monthly).unwrap()
}

fn retirement_config(paths: usize, years: usize) -> SimulationConfig {
    SimulationBuilder::new()
        .allocation(
            AllocationWeights::from_pairs([
                ("us_equity", 0.35),
                ("intl_equity", 0.25),
                ("us_bonds", 0.30),
                ("tips", 0.10),
            ])
            .unwrap(),
        )
        .years(years)
        .paths(paths)
        .seed(42)
        .initial_balance(750_000.0)
        .withdraw_real(3_000.0, 0..years * 12)
        .build()
        .unwrap()
}

fn bench_single_path(c: &mut Criterion) {
    let model = baseline(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = retirement_config(1, 30);

    c.bench_function("single_path_30yr_monthly", |b| {
        b.iter(|| engine.simulate_path(black_box(&config), black_box(0)))
    });
}

fn bench_monte_carlo(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    let model = baseline(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);

    for paths in [1_000, 5_000, 10_000].iter() {
        let config = retirement_config(*paths, 30);
        group.bench_with_input(BenchmarkId::new("paths", paths), paths, |b, _| {
            b.iter(|| engine.run(black_box(&config), None))
        });
    }

    group.finish();
}

fn bench_regimes(c: &mut Criterion) {
    let mut group = c.benchmark_group("regimes");
    let config = retirement_config(1_000, 30);

    let plain = baseline(Periodicity::Monthly);
    group.bench_function("without_regimes", |b| {
        b.iter(|| SimulationEngine::new(&plain).run(black_box(&config), None))
    });

    let switching = regime_model();
    group.bench_function("bull_bear_crisis", |b| {
        b.iter(|| SimulationEngine::new(&switching).run(black_box(&config), None))
    });

    group.finish();
}

fn bench_analytics(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");
    let model = baseline(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = retirement_config(5_000, 30);
    let goal = Goal::NeverDeplete;
    let risk = RiskConfig::default();

    let run = engine.run(&config, None).unwrap();
    group.bench_function("exact_from_run", |b| {
        b.iter(|| analyze_run(black_box(&run), &goal, &risk))
    });

    let options = StreamingOptions::default();
    group.bench_function("streaming_with_simulation", |b| {
        b.iter(|| analyze_streaming(&engine, black_box(&config), &goal, &risk, &options, None))
    });

    group.finish();
}

fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");
    let model = baseline(Periodicity::Annual);

    for points in [10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("frontier_points", points), points, |b, n| {
            b.iter(|| compute_efficient_frontier(black_box(&model), *n))
        });
    }

    group.bench_function("max_sharpe", |b| {
        b.iter(|| max_sharpe_portfolio(black_box(&model), black_box(0.03)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_path,
    bench_monte_carlo,
    bench_regimes,
    bench_analytics,
    bench_optimizer,
);
criterion_main!(benches);
