//! Per-instrument regime analysis and portfolio assembly.
//!
//! Each instrument runs independently: indicators, discretized features,
//! best-of-N HMM training, the strategy bank with its position backtests,
//! and the adaptive-filter trading simulation. Instruments fan out across
//! rayon workers with no shared mutable state; allocation then runs once
//! over the collected results.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use regimelab_core::domain::{Instrument, PriceSeries};
use regimelab_core::features::{extract_features, label_of, quantile_thresholds};
use regimelab_core::filter::{classify_shapes, trading_signals, AdaptiveFilter, TradingSignal};
use regimelab_core::hmm::{
    predict_with_hmm, train_best_of_runs, HmmError, HmmModel, HmmParameters, HmmPrediction,
};
use regimelab_core::indicators::{compute_indicators, IndicatorSet};
use regimelab_core::strategy::{apply_all_strategies, default_strategies, MarketView, NamedSignal};

use crate::allocation::{
    allocate_portfolio, final_positions, strategy_weights, FinalPositions, PortfolioMetrics,
    PositionAllocation, StrategyWeight,
};
use crate::backtest::{
    backtest_buy_and_hold, backtest_multiple_strategies, backtest_signal_strategy,
    compare_strategies, BacktestError, PricePoint, ShareBacktest, StrategyBacktest,
    StrategyComparison,
};
use crate::config::{ConfigError, PipelineConfig, RegimeMode};
use crate::data_loader::{dataset_hash, LoadError};
use crate::metrics::{monthly_returns, returns_from_equity, MetricsConfig, MonthlyReturn};
use crate::regime::{rolling_track, RegimeTrack};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("{symbol}: HMM error: {source}")]
    Hmm {
        symbol: String,
        #[source]
        source: HmmError,
    },
    #[error("{symbol}: backtest error: {source}")]
    Backtest {
        symbol: String,
        #[source]
        source: BacktestError,
    },
}

// ─── Report types ────────────────────────────────────────────────────

/// The trained regime model of one instrument and its decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeModel {
    pub instrument: Instrument,
    pub observations: usize,
    /// Quantile thresholds that map feature values to symbols.
    pub thresholds: Vec<f64>,
    pub log_likelihood: f64,
    pub seed: u64,
    pub valid_runs: u32,
    /// The model is an untrained fallback.
    pub fallback: bool,
    pub model: HmmParameters,
    /// Decoding of the full training sequence.
    pub prediction: HmmPrediction,
}

/// Adaptive-filter trading against buy-and-hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub values: Vec<f64>,
    pub signals: Vec<TradingSignal>,
    pub signal_backtest: ShareBacktest,
    pub buy_and_hold: ShareBacktest,
    pub comparison: StrategyComparison,
    /// Monthly sums of the signal strategy's daily returns.
    pub monthly_returns: Vec<MonthlyReturn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub instrument: Instrument,
    pub bars: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub regime: RegimeModel,
    /// Strategy signals at the latest bar.
    pub current_signals: Vec<NamedSignal>,
    pub backtests: Vec<StrategyBacktest>,
    pub strategy_weights: Vec<StrategyWeight>,
    pub filter: FilterOutcome,
}

/// An instrument left out of the run: too short to yield training
/// observations, or its analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedInstrument {
    pub instrument: Instrument,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub schema_version: u32,
    pub config_hash: String,
    pub dataset_hash: String,
    pub instruments: Vec<InstrumentReport>,
    pub skipped: Vec<SkippedInstrument>,
    pub allocation: Vec<PositionAllocation>,
    pub portfolio_metrics: PortfolioMetrics,
    pub final_positions: FinalPositions,
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// Everything derived from the raw series before training.
struct Prepared {
    series: PriceSeries,
    closes: Vec<f64>,
    dates: Vec<NaiveDate>,
    indicators: IndicatorSet,
    thresholds: Vec<f64>,
    observations: Vec<usize>,
}

enum Analysis {
    Complete(Box<InstrumentReport>),
    Skipped(SkippedInstrument),
}

pub struct Pipeline {
    config: PipelineConfig,
    parallel: bool,
}

impl Pipeline {
    /// Validates `config` up front so a bad value fails before any training.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            parallel: true,
        })
    }

    /// Enables or disables parallel execution across instruments.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze every instrument, then allocate the portfolio.
    ///
    /// Output order follows input order regardless of parallelism. An
    /// instrument whose analysis fails is reported as skipped and the rest
    /// of the batch carries on.
    pub fn run(&self, universe: Vec<PriceSeries>) -> Result<PipelineReport, PipelineError> {
        let config_hash = self.config.config_hash()?;
        let dataset_hash = dataset_hash(&universe);
        info!(
            instruments = universe.len(),
            config_hash = %&config_hash[..12],
            dataset_hash = %&dataset_hash[..12],
            "starting pipeline"
        );

        let analyses: Vec<Analysis> = if self.parallel {
            universe
                .into_par_iter()
                .map(|series| self.analyze_or_skip(series))
                .collect()
        } else {
            universe
                .into_iter()
                .map(|series| self.analyze_or_skip(series))
                .collect()
        };

        let mut instruments = Vec::new();
        let mut skipped = Vec::new();
        for analysis in analyses {
            match analysis {
                Analysis::Complete(report) => instruments.push(*report),
                Analysis::Skipped(s) => skipped.push(s),
            }
        }

        let allocation_config = &self.config.allocation;
        let names: Vec<Instrument> = instruments.iter().map(|r| r.instrument.clone()).collect();
        let results: Vec<&[StrategyBacktest]> =
            instruments.iter().map(|r| r.backtests.as_slice()).collect();
        let allocation = allocate_portfolio(&names, &results, allocation_config);
        let portfolio_metrics = PortfolioMetrics::compute(&allocation);
        let final_positions = final_positions(&allocation, allocation_config);
        info!(
            analyzed = instruments.len(),
            skipped = skipped.len(),
            positions = final_positions.num_positions,
            total_weight = portfolio_metrics.total_weight,
            weighted_sharpe = portfolio_metrics.weighted_sharpe,
            concentration = %portfolio_metrics.concentration,
            "portfolio allocated"
        );

        Ok(PipelineReport {
            schema_version: SCHEMA_VERSION,
            config_hash,
            dataset_hash,
            instruments,
            skipped,
            allocation,
            portfolio_metrics,
            final_positions,
        })
    }

    /// Train the regime model of one instrument.
    ///
    /// `Ok(None)` when the series is too short to yield any observation.
    pub fn train_instrument(&self, series: PriceSeries) -> Result<Option<RegimeModel>, PipelineError> {
        let prepared = self.prepare(series);
        if prepared.observations.is_empty() {
            warn!(symbol = %prepared.series.instrument.symbol, "no observations, skipping");
            return Ok(None);
        }
        Ok(Some(self.train(&prepared)?.0))
    }

    /// Run the adaptive filter's trading signals against buy-and-hold.
    pub fn filter_instrument(&self, series: &PriceSeries) -> Result<FilterOutcome, PipelineError> {
        let closes = series.closes();
        let dates = series.dates();
        let backtest = &self.config.backtest;

        let values = AdaptiveFilter::new(self.config.filter.clone()).compute_series(&closes);
        let shapes = classify_shapes(&values);
        let signals = trading_signals(&dates, &shapes, backtest.min_hold_days);
        let points: Vec<PricePoint> = dates
            .iter()
            .zip(&closes)
            .map(|(&date, &price)| PricePoint { date, price })
            .collect();

        let wrap = |source| PipelineError::Backtest {
            symbol: series.instrument.symbol.clone(),
            source,
        };
        let signal_backtest =
            backtest_signal_strategy(&points, &signals, backtest.initial_capital).map_err(wrap)?;
        let buy_and_hold = backtest_buy_and_hold(&points, backtest.initial_capital);
        let comparison = compare_strategies(&signal_backtest, &buy_and_hold);

        let daily = returns_from_equity(&signal_backtest.equity_curve);
        let monthly = monthly_returns(&daily, dates.get(1..).unwrap_or(&[]));
        debug!(
            symbol = %series.instrument.symbol,
            trades = signal_backtest.trades.len(),
            signal_final = signal_backtest.final_capital,
            hold_final = buy_and_hold.final_capital,
            "filter backtest finished"
        );

        Ok(FilterOutcome {
            values,
            signals,
            signal_backtest,
            buy_and_hold,
            comparison,
            monthly_returns: monthly,
        })
    }

    fn prepare(&self, mut series: PriceSeries) -> Prepared {
        series.truncate_to_recent(self.config.features.max_history);
        let closes = series.closes();
        let dates = series.dates();
        let indicators = compute_indicators(&closes, &self.config.features.indicators);
        let features = extract_features(&indicators);
        let thresholds = quantile_thresholds(&features, self.config.hmm.model.num_observations);
        let observations = features.iter().map(|&f| label_of(f, &thresholds)).collect();
        Prepared {
            series,
            closes,
            dates,
            indicators,
            thresholds,
            observations,
        }
    }

    fn train(&self, prepared: &Prepared) -> Result<(RegimeModel, HmmModel), PipelineError> {
        let instrument = &prepared.series.instrument;
        let wrap = |source| PipelineError::Hmm {
            symbol: instrument.symbol.clone(),
            source,
        };
        info!(
            symbol = %instrument.symbol,
            bars = prepared.closes.len(),
            observations = prepared.observations.len(),
            "training regime model"
        );
        let trained =
            train_best_of_runs(&prepared.observations, instrument.id, &self.config.hmm.model)
                .map_err(wrap)?;
        let prediction = predict_with_hmm(&trained.model, &prepared.observations).map_err(wrap)?;
        info!(
            symbol = %instrument.symbol,
            log_likelihood = trained.log_likelihood,
            valid_runs = trained.valid_runs,
            fallback = trained.fallback,
            current_state = prediction.current_state,
            "regime model trained"
        );

        let regime = RegimeModel {
            instrument: instrument.clone(),
            observations: prepared.observations.len(),
            thresholds: prepared.thresholds.clone(),
            log_likelihood: trained.log_likelihood,
            seed: trained.seed,
            valid_runs: trained.valid_runs,
            fallback: trained.fallback,
            model: trained.model.parameters(),
            prediction,
        };
        Ok((regime, trained.model))
    }

    fn regime_track(
        &self,
        prepared: &Prepared,
        regime: &RegimeModel,
        model: &HmmModel,
    ) -> Result<RegimeTrack, PipelineError> {
        match self.config.hmm.regime_mode {
            RegimeMode::Static => Ok(RegimeTrack::Static(regime.prediction.clone())),
            RegimeMode::Rolling => {
                rolling_track(
                    model,
                    &regime.thresholds,
                    prepared.indicators.returns.values(),
                    prepared.closes.len(),
                    self.config.hmm.rolling_window,
                    regime.prediction.clone(),
                )
                .map_err(|source| PipelineError::Hmm {
                    symbol: regime.instrument.symbol.clone(),
                    source,
                })
            }
        }
    }

    fn analyze_or_skip(&self, series: PriceSeries) -> Analysis {
        let instrument = series.instrument.clone();
        self.analyze(series).unwrap_or_else(|err| {
            warn!(symbol = %instrument.symbol, error = %err, "analysis failed, skipping");
            Analysis::Skipped(SkippedInstrument {
                instrument,
                reason: err.to_string(),
            })
        })
    }

    fn analyze(&self, series: PriceSeries) -> Result<Analysis, PipelineError> {
        let prepared = self.prepare(series);
        let instrument = prepared.series.instrument.clone();
        if prepared.observations.is_empty() {
            warn!(symbol = %instrument.symbol, bars = prepared.closes.len(), "no observations, skipping");
            return Ok(Analysis::Skipped(SkippedInstrument {
                instrument,
                reason: format!("{} bars yield no observations", prepared.closes.len()),
            }));
        }

        let (regime, model) = self.train(&prepared)?;
        let track = self.regime_track(&prepared, &regime, &model)?;

        let mut strategies = default_strategies(&self.config.strategies);
        let last = prepared.closes.len() - 1;
        let current_signals = apply_all_strategies(
            &mut strategies,
            &MarketView::new(&prepared.closes, &prepared.indicators),
            track.at(last),
        );
        let metrics = MetricsConfig::from(&self.config.backtest);
        let backtests = backtest_multiple_strategies(
            &mut strategies,
            &prepared.closes,
            &prepared.indicators,
            &track,
            self.config.backtest.strategy_initial_capital,
            &metrics,
        );
        let weights = strategy_weights(&backtests, &self.config.allocation);
        let filter = self.filter_instrument(&prepared.series)?;

        Ok(Analysis::Complete(Box::new(InstrumentReport {
            bars: prepared.closes.len(),
            start_date: prepared.dates.first().copied(),
            end_date: prepared.dates.last().copied(),
            instrument,
            regime,
            current_signals,
            backtests,
            strategy_weights: weights,
            filter,
        })))
    }
}
