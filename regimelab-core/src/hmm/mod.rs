//! Discrete hidden Markov model: the regime engine.
//!
//! - [`HmmModel`] holds π, A and B and validates observation sequences.
//! - `inference` provides forward/backward (plain and scaled), Viterbi and
//!   next-step predictions.
//! - `training` runs Baum-Welch re-estimation.
//! - [`train_best_of_runs`] trains several seeded initializations and keeps
//!   the best one, falling back to an untrained model if every run fails.
//!
//! Hidden states are conventionally read as bullish = 0, ranging = 1,
//! bearish = 2. Nothing here enforces that reading; the strategies do.

pub mod inference;
pub mod model;
pub mod predict;
pub mod training;

pub use inference::ScaledForward;
pub use model::{HmmModel, HmmParameters};
pub use predict::{predict_with_hmm, HmmPrediction};
pub use training::{train_best_of_runs, HmmConfig, TrainReport, TrainedModel};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Additive floor inside every `ln` of the Viterbi recursion.
pub const LOG_FLOOR: f64 = 1e-10;

/// Below this sequence probability the `+1e-10` floor in the unscaled
/// formulas distorts results by more than one part in a million.
pub const AUTO_SCALING_THRESHOLD: f64 = 1e-4;

/// Which forward/backward recursion the E-step and posteriors use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Unscaled while `P(O) >= AUTO_SCALING_THRESHOLD`, scaled below it.
    #[default]
    Auto,
    /// Raw joint probabilities with the `+1e-10` log floor.
    Unscaled,
    /// Per-step normalized recursion; log-likelihood is `Σ ln c_t`.
    Scaled,
}

impl Scaling {
    /// Whether the unscaled path applies given the sequence probability.
    pub fn use_unscaled(self, p_obs: f64) -> bool {
        match self {
            Scaling::Auto => p_obs.is_finite() && p_obs >= AUTO_SCALING_THRESHOLD,
            Scaling::Unscaled => true,
            Scaling::Scaled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    #[error("an HMM needs at least one hidden state")]
    NoStates,
    #[error("an HMM needs at least one observation symbol")]
    NoSymbols,
    #[error("observation {symbol} at step {step} is outside [0, {num_observations})")]
    SymbolOutOfRange {
        symbol: usize,
        step: usize,
        num_observations: usize,
    },
    #[error("observation sequence is empty")]
    EmptyObservations,
    #[error("parameter shape mismatch in {field}: expected {expected}, found {found}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}
