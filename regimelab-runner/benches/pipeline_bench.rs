//! Criterion benchmarks for the per-instrument hot paths.
//!
//! Run with: `cargo bench -p regimelab-runner`
//!
//! - Strategy-bank position backtests over one instrument
//! - Portfolio allocation across a growing universe
//! - A full single-instrument pipeline run

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regimelab_core::domain::Instrument;
use regimelab_core::hmm::HmmPrediction;
use regimelab_core::indicators::{compute_indicators, IndicatorConfig};
use regimelab_core::strategy::{default_strategies, StrategyParams};
use regimelab_runner::allocation::{allocate_portfolio, AllocationConfig};
use regimelab_runner::backtest::backtest_multiple_strategies;
use regimelab_runner::data_loader::synthetic_series;
use regimelab_runner::metrics::MetricsConfig;
use regimelab_runner::pipeline::Pipeline;
use regimelab_runner::regime::RegimeTrack;
use regimelab_runner::PipelineConfig;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()
}

fn prediction() -> HmmPrediction {
    HmmPrediction {
        states: vec![0, 1, 2],
        state_probs: vec![0.2, 0.3, 0.5],
        current_state: 2,
        prev_state: Some(1),
        next_state: 2,
        next_observation: 5,
    }
}

fn bench_strategy_backtests(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_backtests");

    for bars in [250usize, 970] {
        let series = synthetic_series(Instrument::new(0, "BENCH"), start(), bars).unwrap();
        let closes = series.closes();
        let indicators = compute_indicators(&closes, &IndicatorConfig::default());
        let track = RegimeTrack::Static(prediction());
        let metrics = MetricsConfig::default();

        group.bench_with_input(BenchmarkId::from_parameter(bars), &bars, |b, _| {
            b.iter(|| {
                let mut strategies = default_strategies(&StrategyParams::default());
                backtest_multiple_strategies(
                    &mut strategies,
                    black_box(&closes),
                    &indicators,
                    &track,
                    1.0,
                    &metrics,
                )
            });
        });
    }

    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_portfolio");
    let config = AllocationConfig::default();

    let series = synthetic_series(Instrument::new(0, "BENCH"), start(), 250).unwrap();
    let closes = series.closes();
    let indicators = compute_indicators(&closes, &IndicatorConfig::default());
    let mut strategies = default_strategies(&StrategyParams::default());
    let results = backtest_multiple_strategies(
        &mut strategies,
        &closes,
        &indicators,
        &RegimeTrack::Static(prediction()),
        1.0,
        &MetricsConfig::default(),
    );

    for n in [10usize, 100, 1000] {
        let instruments: Vec<Instrument> =
            (0..n).map(|i| Instrument::new(i as u32, format!("S{i}"))).collect();
        let per_instrument = vec![results.clone(); n];
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| allocate_portfolio(black_box(&instruments), &per_instrument, &config));
        });
    }

    group.finish();
}

fn bench_single_instrument_pipeline(c: &mut Criterion) {
    let pipeline = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .with_parallelism(false);
    let series = synthetic_series(Instrument::new(0, "BENCH"), start(), 500).unwrap();

    c.bench_function("pipeline_single_instrument", |b| {
        b.iter(|| pipeline.run(vec![black_box(series.clone())]).unwrap());
    });
}

criterion_group!(
    benches,
    bench_strategy_backtests,
    bench_allocation,
    bench_single_instrument_pipeline
);
criterion_main!(benches);
