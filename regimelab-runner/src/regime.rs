//! Regime views handed to strategies at each backtest step.

use serde::{Deserialize, Serialize};

use regimelab_core::features::label_of;
use regimelab_core::hmm::{predict_with_hmm, HmmError, HmmModel, HmmPrediction};

/// The regime prediction a strategy sees at each step of a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegimeTrack {
    /// One prediction for every step.
    Static(HmmPrediction),
    /// A prediction per step; steps without one fall back to `fallback`.
    Rolling {
        fallback: HmmPrediction,
        per_step: Vec<Option<HmmPrediction>>,
    },
}

impl RegimeTrack {
    pub fn at(&self, step: usize) -> &HmmPrediction {
        match self {
            RegimeTrack::Static(prediction) => prediction,
            RegimeTrack::Rolling { fallback, per_step } => per_step
                .get(step)
                .and_then(Option::as_ref)
                .unwrap_or(fallback),
        }
    }
}

/// Decode a trailing window of time-aligned observations at every step.
///
/// `returns[j]` is the return into price `j + 1`, so after `t + 1` prices
/// the first `t` returns are known. Each is labeled with the training
/// `thresholds` so symbols mean the same thing as during training; step 0
/// has no returns and uses `fallback`.
pub fn rolling_track(
    model: &HmmModel,
    thresholds: &[f64],
    returns: &[f64],
    price_count: usize,
    window: usize,
    fallback: HmmPrediction,
) -> Result<RegimeTrack, HmmError> {
    let labels: Vec<usize> = returns.iter().map(|&r| label_of(r, thresholds)).collect();
    let window = window.max(1);
    let mut per_step = Vec::with_capacity(price_count);
    for step in 0..price_count {
        let known = step.min(labels.len());
        if known == 0 {
            per_step.push(None);
            continue;
        }
        let recent = &labels[known.saturating_sub(window)..known];
        per_step.push(Some(predict_with_hmm(model, recent)?));
    }
    Ok(RegimeTrack::Rolling { fallback, per_step })
}
