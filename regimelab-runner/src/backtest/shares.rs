//! Whole-share simulations: filter-signal driven and buy-and-hold.
//!
//! Both buy `floor(cash / price)` shares and keep the remainder as cash.
//! A signal seen on day `t` executes at day `t + 1`'s price, and the final
//! day never schedules an action since nothing follows it. Bars whose
//! price is not a positive finite number are left out of the simulation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use regimelab_core::filter::TradingSignal;

use super::BacktestError;
use crate::metrics::{returns_from_equity, MetricsConfig, PerformanceMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    None,
    Buy,
    Sell,
}

/// Account state at the close of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<TradingSignal>,
    pub action: TradeAction,
    pub cash: f64,
    pub shares: u64,
    /// Cash plus the marked value of held shares.
    pub asset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareBacktest {
    pub ledger: Vec<LedgerRow>,
    /// Days on which a buy or sell executed.
    pub trades: Vec<LedgerRow>,
    pub equity_curve: Vec<f64>,
    pub metrics: PerformanceMetrics,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Percent, e.g. 100.0 for a doubling.
    pub total_return_pct: f64,
}

impl ShareBacktest {
    fn finish(ledger: Vec<LedgerRow>, initial_capital: f64, final_capital: f64) -> Self {
        let trades = ledger
            .iter()
            .filter(|row| row.action != TradeAction::None)
            .cloned()
            .collect();
        let equity_curve: Vec<f64> = ledger.iter().map(|row| row.asset).collect();
        let daily = returns_from_equity(&equity_curve);
        Self {
            ledger,
            trades,
            metrics: PerformanceMetrics::compute(&daily, None, &MetricsConfig::default()),
            equity_curve,
            initial_capital,
            final_capital,
            total_return_pct: if initial_capital > 0.0 {
                (final_capital - initial_capital) / initial_capital * 100.0
            } else {
                0.0
            },
        }
    }

    fn empty(initial_capital: f64) -> Self {
        Self::finish(Vec::new(), initial_capital, initial_capital)
    }
}

impl PricePoint {
    /// A positive finite price.
    pub fn is_tradable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Indices of tradable `points` in ascending date order; ties keep input order.
fn date_order(points: &[PricePoint]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).filter(|&i| points[i].is_tradable()).collect();
    order.sort_by_key(|&i| points[i].date);
    if order.len() < points.len() {
        debug!(
            skipped = points.len() - order.len(),
            "bars without a positive finite price left out"
        );
    }
    order
}

fn shares_for(cash: f64, price: f64) -> u64 {
    (cash / price).floor() as u64
}

/// Full-position trading on `Buy`/`Sell` signals with next-day execution.
///
/// At most one action is pending at a time: a `Buy` is only scheduled while
/// flat and a `Sell` only while holding. A position still open on the last
/// day is marked to that day's price.
pub fn backtest_signal_strategy(
    points: &[PricePoint],
    signals: &[TradingSignal],
    initial_capital: f64,
) -> Result<ShareBacktest, BacktestError> {
    if points.len() != signals.len() {
        return Err(BacktestError::LengthMismatch {
            prices: points.len(),
            signals: signals.len(),
        });
    }
    let order = date_order(points);
    if order.is_empty() {
        return Ok(ShareBacktest::empty(initial_capital));
    }
    let last = order.len() - 1;
    let mut ledger = Vec::with_capacity(order.len());
    let mut cash = initial_capital;
    let mut shares: u64 = 0;
    let mut holding = false;
    let mut pending = TradeAction::None;

    for (day, &i) in order.iter().enumerate() {
        let point = &points[i];
        let signal = signals[i];
        let mut action = TradeAction::None;

        match pending {
            TradeAction::Buy if !holding => {
                shares = shares_for(cash, point.price);
                cash -= shares as f64 * point.price;
                holding = true;
                action = TradeAction::Buy;
            }
            TradeAction::Sell if holding => {
                cash += shares as f64 * point.price;
                shares = 0;
                holding = false;
                action = TradeAction::Sell;
            }
            _ => {}
        }

        pending = TradeAction::None;
        if day < last {
            pending = match signal {
                TradingSignal::Buy if !holding => TradeAction::Buy,
                TradingSignal::Sell if holding => TradeAction::Sell,
                _ => TradeAction::None,
            };
        }

        ledger.push(LedgerRow {
            date: point.date,
            price: point.price,
            signal: Some(signal),
            action,
            cash,
            shares,
            asset: cash + shares as f64 * point.price,
        });
    }

    let final_capital = ledger.last().map_or(initial_capital, |row| row.asset);
    Ok(ShareBacktest::finish(ledger, initial_capital, final_capital))
}

/// Buy on the first day, sell on the last.
pub fn backtest_buy_and_hold(points: &[PricePoint], initial_capital: f64) -> ShareBacktest {
    let order = date_order(points);
    if order.is_empty() {
        return ShareBacktest::empty(initial_capital);
    }
    let last = order.len() - 1;
    let mut ledger = Vec::with_capacity(order.len());
    let mut cash = initial_capital;
    let mut shares: u64 = 0;

    for (day, &i) in order.iter().enumerate() {
        let point = &points[i];
        let mut action = TradeAction::None;
        if day == 0 {
            shares = shares_for(cash, point.price);
            cash -= shares as f64 * point.price;
            action = TradeAction::Buy;
        }
        let mut asset = cash + shares as f64 * point.price;
        if day == last {
            cash += shares as f64 * point.price;
            shares = 0;
            asset = cash;
            action = TradeAction::Sell;
        }
        ledger.push(LedgerRow {
            date: point.date,
            price: point.price,
            signal: None,
            action,
            cash,
            shares,
            asset,
        });
    }

    let final_capital = ledger.last().map_or(initial_capital, |row| row.asset);
    ShareBacktest::finish(ledger, initial_capital, final_capital)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Signal,
    BuyAndHold,
    Tie,
}

/// Signal-driven result measured against the buy-and-hold baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub signal_final_capital: f64,
    pub hold_final_capital: f64,
    pub difference: f64,
    /// Difference as a percentage of the buy-and-hold result.
    pub difference_pct: f64,
    pub winner: Winner,
}

pub fn compare_strategies(signal: &ShareBacktest, hold: &ShareBacktest) -> StrategyComparison {
    let difference = signal.final_capital - hold.final_capital;
    let winner = if difference > 0.0 {
        Winner::Signal
    } else if difference < 0.0 {
        Winner::BuyAndHold
    } else {
        Winner::Tie
    };
    StrategyComparison {
        signal_final_capital: signal.final_capital,
        hold_final_capital: hold.final_capital,
        difference,
        difference_pct: if hold.final_capital != 0.0 {
            difference / hold.final_capital * 100.0
        } else {
            0.0
        },
        winner,
    }
}
