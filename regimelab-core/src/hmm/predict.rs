//! The regime view handed to strategies.

use serde::{Deserialize, Serialize};

use super::{HmmError, HmmModel};

/// Decoded regime information for one observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmPrediction {
    /// Viterbi path over the window.
    pub states: Vec<usize>,
    /// Posterior over states at the last step.
    pub state_probs: Vec<f64>,
    pub current_state: usize,
    /// Penultimate Viterbi state; `None` for a one-step window.
    pub prev_state: Option<usize>,
    pub next_state: usize,
    pub next_observation: usize,
}

impl HmmPrediction {
    /// Posterior of `state`, 0 when out of range.
    pub fn probability_of(&self, state: usize) -> f64 {
        self.state_probs.get(state).copied().unwrap_or(0.0)
    }

    /// Whether the last step moved from `from` into `to`.
    pub fn switched(&self, from: usize, to: usize) -> bool {
        self.prev_state == Some(from) && self.current_state == to
    }
}

/// Decode `observations` and bundle the state path, final posterior and
/// one-step-ahead predictions.
pub fn predict_with_hmm(model: &HmmModel, observations: &[usize]) -> Result<HmmPrediction, HmmError> {
    let states = model.viterbi(observations)?;
    let state_probs = model.state_probabilities(observations)?;
    let current_state = states[states.len() - 1];
    let prev_state = states.len().checked_sub(2).map(|i| states[i]);
    Ok(HmmPrediction {
        next_state: model.most_likely_successor(current_state),
        next_observation: model.most_likely_emission(current_state),
        current_state,
        prev_state,
        state_probs,
        states,
    })
}
