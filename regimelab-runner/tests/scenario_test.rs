//! Reference scenarios checked through the public pipeline surface.

use chrono::NaiveDate;
use regimelab_core::domain::{Bar, Instrument, PriceSeries};
use regimelab_runner::backtest::{TradeAction, Winner};
use regimelab_runner::pipeline::Pipeline;
use regimelab_runner::reporting::generate_comparison_report;
use regimelab_runner::PipelineConfig;

fn series(symbol: &str, closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10_000,
        })
        .collect();
    PriceSeries::new(Instrument::new(7, symbol), bars).unwrap()
}

#[test]
fn buy_and_hold_doubles_capital() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let outcome = pipeline
        .filter_instrument(&series("REF", &[100.0, 90.0, 80.0, 70.0, 200.0]))
        .unwrap();

    let hold = &outcome.buy_and_hold;
    assert_eq!(hold.final_capital, 2_000_000.0);
    assert_eq!(hold.total_return_pct, 100.0);
    assert_eq!(hold.ledger[0].action, TradeAction::Buy);
    assert_eq!(hold.ledger[0].shares, 10_000);
    assert_eq!(hold.ledger[4].action, TradeAction::Sell);

    assert_eq!(outcome.comparison.hold_final_capital, 2_000_000.0);
    assert_eq!(outcome.values.len(), 5);
    assert_eq!(outcome.signals.len(), 5);
}

#[test]
fn flat_prices_tie() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let closes = vec![50.0; 30];
    let flat = series("FLAT", &closes);
    let outcome = pipeline.filter_instrument(&flat).unwrap();

    assert_eq!(outcome.buy_and_hold.final_capital, 1_000_000.0);
    assert_eq!(outcome.signal_backtest.final_capital, 1_000_000.0);
    assert_eq!(outcome.comparison.winner, Winner::Tie);

    let report = generate_comparison_report([(&flat.instrument, &outcome)]);
    assert!(report.contains("| FLAT | "));
    assert!(report.contains("| tie |"));
}
