//! CSV tables: final positions and per-instrument share ledgers.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;

use regimelab_core::filter::TradingSignal;

use crate::allocation::PositionAllocation;
use crate::backtest::{LedgerRow, TradeAction};

#[derive(Serialize)]
struct PositionCsvRow<'a> {
    symbol: &'a str,
    sector: &'a str,
    fund: &'a str,
    weight: f64,
    sharpe_ratio: f64,
}

// Flat copy of `LedgerRow`: an absent signal becomes an empty cell.
#[derive(Serialize)]
struct LedgerCsvRow {
    date: NaiveDate,
    price: f64,
    signal: Option<TradingSignal>,
    action: TradeAction,
    cash: f64,
    shares: u64,
    asset: f64,
}

pub fn write_positions_csv(path: &Path, positions: &[PositionAllocation]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create positions CSV {}", path.display()))?;
    for p in positions {
        writer.serialize(PositionCsvRow {
            symbol: &p.instrument.symbol,
            sector: &p.instrument.sector,
            fund: &p.instrument.fund,
            weight: p.weight,
            sharpe_ratio: p.sharpe_ratio,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ledger_csv(path: &Path, ledger: &[LedgerRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create ledger CSV {}", path.display()))?;
    for row in ledger {
        writer.serialize(LedgerCsvRow {
            date: row.date,
            price: row.price,
            signal: row.signal,
            action: row.action,
            cash: row.cash,
            shares: row.shares,
            asset: row.asset,
        })?;
    }
    writer.flush()?;
    Ok(())
}
