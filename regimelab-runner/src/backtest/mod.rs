//! Backtest simulations.
//!
//! - [`shares`]: whole-share simulations driven by the filter's trading
//!   signals, plus the buy-and-hold baseline and their comparison.
//! - [`position`]: fractional-position backtests of the strategy bank.

pub mod position;
pub mod shares;

pub use position::{
    backtest_multiple_strategies, backtest_strategy, PositionBacktest, Rebalance,
    StrategyBacktest, INITIAL_POSITION,
};
pub use shares::{
    backtest_buy_and_hold, backtest_signal_strategy, compare_strategies, LedgerRow, PricePoint,
    ShareBacktest, StrategyComparison, TradeAction, Winner,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BacktestError {
    #[error("{prices} prices but {signals} signals")]
    LengthMismatch { prices: usize, signals: usize },
}
