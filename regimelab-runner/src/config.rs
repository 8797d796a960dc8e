//! Pipeline configuration loaded from TOML.
//!
//! Every section carries `#[serde(default)]`, so a partial file (or an empty
//! one) yields the reference defaults for whatever it leaves out.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regimelab_core::domain::Instrument;
use regimelab_core::filter::{FilterParams, DEFAULT_MIN_HOLD_DAYS};
use regimelab_core::hmm::HmmConfig;
use regimelab_core::indicators::IndicatorConfig;
use regimelab_core::strategy::StrategyParams;

use crate::allocation::AllocationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to encode config for hashing: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Indicator windows plus how much history feeds the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    #[serde(flatten)]
    pub indicators: IndicatorConfig,
    /// Only the most recent `max_history` bars of each series are used.
    pub max_history: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(),
            max_history: 970,
        }
    }
}

/// How strategies see the regime during a position backtest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeMode {
    /// One prediction over the full training sequence, shared by every step.
    #[default]
    Static,
    /// Per-step decoding over a trailing window of return labels.
    Rolling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmSection {
    #[serde(flatten)]
    pub model: HmmConfig,
    pub regime_mode: RegimeMode,
    /// Window length for [`RegimeMode::Rolling`].
    pub rolling_window: usize,
}

impl Default for HmmSection {
    fn default() -> Self {
        Self {
            model: HmmConfig::default(),
            regime_mode: RegimeMode::Static,
            rolling_window: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Cash for the share-based signal and buy-and-hold simulations.
    pub initial_capital: f64,
    /// Starting equity for position-weighted strategy backtests.
    pub strategy_initial_capital: f64,
    /// Annual rate subtracted in Sharpe and Sortino.
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
    /// Calendar days a filter-driven position is held before it may be sold.
    pub min_hold_days: i64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            strategy_initial_capital: 1.0,
            risk_free_rate: 0.03,
            trading_days_per_year: 252.0,
            min_hold_days: DEFAULT_MIN_HOLD_DAYS,
        }
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterParams,
    pub features: FeaturesConfig,
    pub hmm: HmmSection,
    pub strategies: StrategyParams,
    pub backtest: BacktestConfig,
    pub allocation: AllocationConfig,
    /// Optional instrument metadata; when empty, instruments are discovered
    /// from the data directory.
    pub instruments: Vec<Instrument>,
}

impl PipelineConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// BLAKE3 hex digest of the canonical JSON encoding.
    ///
    /// Two configs with the same digest drive identical runs over the same data.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;
        let ind = &f.indicators;
        for (field, window) in [
            ("features.sma_window", ind.sma_window),
            ("features.ema_window", ind.ema_window),
            ("features.volatility_window", ind.volatility_window),
            ("features.rsi_period", ind.rsi_period),
            ("features.bollinger", ind.bollinger.0),
        ] {
            if window == 0 {
                return Err(invalid(field, "window must be at least 1"));
            }
        }
        let (fast, slow, signal) = ind.macd;
        if fast == 0 || signal == 0 || fast >= slow {
            return Err(invalid(
                "features.macd",
                format!("need 0 < fast < slow and signal > 0, got ({fast}, {slow}, {signal})"),
            ));
        }
        if !(ind.bollinger.1.is_finite() && ind.bollinger.1 > 0.0) {
            return Err(invalid("features.bollinger", "multiplier must be positive"));
        }
        if f.max_history < 2 {
            return Err(invalid("features.max_history", "need at least 2 bars"));
        }

        let h = &self.hmm;
        if h.model.num_states == 0 {
            return Err(invalid("hmm.num_states", "must be at least 1"));
        }
        if h.model.num_observations == 0 {
            return Err(invalid("hmm.num_observations", "must be at least 1"));
        }
        if h.model.num_runs == 0 {
            return Err(invalid("hmm.num_runs", "must be at least 1"));
        }
        if !(h.model.tolerance.is_finite() && h.model.tolerance >= 0.0) {
            return Err(invalid("hmm.tolerance", "must be a non-negative number"));
        }
        if h.rolling_window == 0 {
            return Err(invalid("hmm.rolling_window", "must be at least 1"));
        }

        let b = &self.backtest;
        for (field, value) in [
            ("backtest.initial_capital", b.initial_capital),
            ("backtest.strategy_initial_capital", b.strategy_initial_capital),
            ("backtest.trading_days_per_year", b.trading_days_per_year),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be positive, got {value}")));
            }
        }
        if !b.risk_free_rate.is_finite() {
            return Err(invalid("backtest.risk_free_rate", "must be finite"));
        }
        if b.min_hold_days < 0 {
            return Err(invalid("backtest.min_hold_days", "must not be negative"));
        }

        self.allocation.validate()
    }
}
