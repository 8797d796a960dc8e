//! Property tests for allocation and share-backtest invariants.
//!
//! 1. Portfolio weights hit `min(total, n × cap)` and respect the cap and floor
//! 2. Final positions never exceed the cap or fall below the drop threshold
//! 3. Share ledgers conserve value and never overspend

use chrono::NaiveDate;
use proptest::prelude::*;
use regimelab_core::domain::Instrument;
use regimelab_core::filter::TradingSignal;
use regimelab_runner::allocation::{allocate_portfolio, final_positions, AllocationConfig};
use regimelab_runner::backtest::{
    backtest_buy_and_hold, backtest_signal_strategy, PositionBacktest, PricePoint,
    StrategyBacktest, TradeAction,
};
use regimelab_runner::metrics::PerformanceMetrics;

// ── Strategies (proptest) ────────────────────────────────────────────

fn backtest_with_sharpe(sharpe: f64) -> StrategyBacktest {
    StrategyBacktest {
        strategy: "Fixed".into(),
        result: Some(PositionBacktest {
            positions: vec![0.5],
            portfolio_returns: vec![0.0],
            equity_curve: vec![1.0],
            rebalances: vec![],
            metrics: PerformanceMetrics {
                cumulative_return: 0.0,
                annualized_return: 0.0,
                max_drawdown: 0.1,
                volatility: 0.2,
                sharpe_ratio: sharpe,
                sortino_ratio: 0.0,
                win_rate: 0.5,
                profit_loss_ratio: 1.0,
                calmar_ratio: 0.0,
                information_ratio: None,
            },
            final_capital: 1.0,
        }),
        error: None,
    }
}

fn arb_sharpes() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-3.0..3.0_f64, 1..4), 1..40)
}

fn arb_market() -> impl Strategy<Value = (Vec<f64>, Vec<TradingSignal>)> {
    (2usize..80).prop_flat_map(|n| {
        (
            prop::collection::vec(1.0..500.0_f64, n),
            prop::collection::vec(
                prop_oneof![
                    Just(TradingSignal::Flat),
                    Just(TradingSignal::Buy),
                    Just(TradingSignal::Hold),
                    Just(TradingSignal::Sell),
                ],
                n,
            ),
        )
    })
}

fn points(prices: &[f64]) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &price)| PricePoint {
            date: start + chrono::Duration::days(i as i64),
            price,
        })
        .collect()
}

// ── 1–2. Allocation ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn portfolio_weights_fill_target_within_bounds(sharpes in arb_sharpes()) {
        let config = AllocationConfig::default();
        let n = sharpes.len();
        let instruments: Vec<Instrument> =
            (0..n).map(|i| Instrument::new(i as u32, format!("S{i}"))).collect();
        let results: Vec<Vec<StrategyBacktest>> = sharpes
            .iter()
            .map(|row| row.iter().map(|&s| backtest_with_sharpe(s)).collect())
            .collect();

        let allocation = allocate_portfolio(&instruments, &results, &config);
        prop_assert_eq!(allocation.len(), n);

        let target = config.total_equity_weight.min(n as f64 * config.max_single_stock_weight);
        let total: f64 = allocation.iter().map(|p| p.weight).sum();
        prop_assert!((total - target).abs() < 1e-6, "total {total} target {target}");
        for p in &allocation {
            prop_assert!(p.weight <= config.max_single_stock_weight + 1e-9);
            // the floor always fits: 40 x 1% < 80%
            prop_assert!(p.weight >= config.min_stock_weight - 1e-9);
        }
    }

    #[test]
    fn final_positions_respect_cap_and_threshold(sharpes in arb_sharpes()) {
        let config = AllocationConfig {
            min_stock_weight: 0.0,
            ..AllocationConfig::default()
        };
        let instruments: Vec<Instrument> =
            (0..sharpes.len()).map(|i| Instrument::new(i as u32, format!("S{i}"))).collect();
        let results: Vec<Vec<StrategyBacktest>> = sharpes
            .iter()
            .map(|row| row.iter().map(|&s| backtest_with_sharpe(s)).collect())
            .collect();
        let allocation = allocate_portfolio(&instruments, &results, &config);
        let before: f64 = allocation.iter().map(|p| p.weight).sum();

        let finals = final_positions(&allocation, &config);
        prop_assert_eq!(finals.num_positions, finals.positions.len());
        prop_assert!(finals.effective_weight <= before + 1e-9);
        for p in &finals.positions {
            prop_assert!(p.weight >= config.min_final_weight);
            prop_assert!(p.weight <= config.max_single_stock_weight + 1e-9);
        }
    }
}

// ── 3. Share ledgers ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn signal_ledger_conserves_value((prices, signals) in arb_market()) {
        let pts = points(&prices);
        let result = backtest_signal_strategy(&pts, &signals, 100_000.0).unwrap();
        prop_assert_eq!(result.ledger.len(), prices.len());

        for row in &result.ledger {
            prop_assert!(row.cash >= -1e-6, "cash {} on {}", row.cash, row.date);
            let marked = row.cash + row.shares as f64 * row.price;
            prop_assert!((row.asset - marked).abs() < 1e-6);
            if row.action == TradeAction::Buy {
                // whole shares only: the remainder cannot buy another
                prop_assert!(row.cash < row.price);
            }
        }
        let last = result.ledger.last().unwrap();
        prop_assert_eq!(result.final_capital, last.asset);
        // the final day never executes a freshly scheduled action
        prop_assert!(result.trades.len() <= prices.len() - 1);
    }

    #[test]
    fn buy_and_hold_tracks_price_ratio(prices in prop::collection::vec(1.0..500.0_f64, 1..80)) {
        let pts = points(&prices);
        let result = backtest_buy_and_hold(&pts, 100_000.0);
        let shares = (100_000.0 / prices[0]).floor();
        let leftover = 100_000.0 - shares * prices[0];
        let expected = leftover + shares * prices[prices.len() - 1];
        prop_assert!((result.final_capital - expected).abs() < 1e-6);
        prop_assert_eq!(result.ledger.last().unwrap().shares, 0);
    }
}
