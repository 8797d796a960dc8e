//! HMM parameters and construction.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::HmmError;
use crate::rng::unit_interval;

/// Serializable snapshot of a model's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmmParameters {
    pub num_states: usize,
    pub num_observations: usize,
    pub initial_prob: Vec<f64>,
    pub transition_prob: Vec<Vec<f64>>,
    pub emission_prob: Vec<Vec<f64>>,
}

/// A discrete HMM with `num_states` hidden states and `num_observations`
/// symbols. Every probability row sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmModel {
    pub(crate) num_states: usize,
    pub(crate) num_observations: usize,
    pub(crate) initial: Vec<f64>,
    pub(crate) transition: Vec<Vec<f64>>,
    pub(crate) emission: Vec<Vec<f64>>,
}

impl HmmModel {
    /// Uniform model. Zero states or zero symbols is a programmer error.
    pub fn new(num_states: usize, num_observations: usize) -> Result<Self, HmmError> {
        if num_states == 0 {
            return Err(HmmError::NoStates);
        }
        if num_observations == 0 {
            return Err(HmmError::NoSymbols);
        }
        let n = num_states as f64;
        let m = num_observations as f64;
        Ok(Self {
            num_states,
            num_observations,
            initial: vec![1.0 / n; num_states],
            transition: vec![vec![1.0 / n; num_states]; num_states],
            emission: vec![vec![1.0 / m; num_observations]; num_states],
        })
    }

    /// Uniform model re-drawn from `rng`, see [`HmmModel::randomize`].
    pub fn random<R: RngCore + ?Sized>(
        num_states: usize,
        num_observations: usize,
        rng: &mut R,
    ) -> Result<Self, HmmError> {
        let mut model = Self::new(num_states, num_observations)?;
        model.randomize(rng);
        Ok(model)
    }

    /// Redraw every row from `rng` and normalize it.
    ///
    /// Draw order is fixed: π, then A row by row, then B row by row.
    pub fn randomize<R: RngCore + ?Sized>(&mut self, rng: &mut R) {
        fill_normalized(&mut self.initial, rng);
        for row in &mut self.transition {
            fill_normalized(row, rng);
        }
        for row in &mut self.emission {
            fill_normalized(row, rng);
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_observations(&self) -> usize {
        self.num_observations
    }

    pub fn initial_prob(&self) -> &[f64] {
        &self.initial
    }

    pub fn transition_prob(&self) -> &[Vec<f64>] {
        &self.transition
    }

    pub fn emission_prob(&self) -> &[Vec<f64>] {
        &self.emission
    }

    pub fn parameters(&self) -> HmmParameters {
        HmmParameters {
            num_states: self.num_states,
            num_observations: self.num_observations,
            initial_prob: self.initial.clone(),
            transition_prob: self.transition.clone(),
            emission_prob: self.emission.clone(),
        }
    }

    /// Restore a model, checking every vector against the declared shape.
    pub fn from_parameters(params: HmmParameters) -> Result<Self, HmmError> {
        let (n, m) = (params.num_states, params.num_observations);
        Self::new(n, m)?;
        check_len("initial_prob", n, params.initial_prob.len())?;
        check_len("transition_prob", n, params.transition_prob.len())?;
        check_len("emission_prob", n, params.emission_prob.len())?;
        for row in &params.transition_prob {
            check_len("transition_prob row", n, row.len())?;
        }
        for row in &params.emission_prob {
            check_len("emission_prob row", m, row.len())?;
        }
        Ok(Self {
            num_states: n,
            num_observations: m,
            initial: params.initial_prob,
            transition: params.transition_prob,
            emission: params.emission_prob,
        })
    }

    /// Reject sequences containing symbols outside `[0, num_observations)`.
    pub fn check_observations(&self, observations: &[usize]) -> Result<(), HmmError> {
        match observations
            .iter()
            .enumerate()
            .find(|(_, &o)| o >= self.num_observations)
        {
            Some((step, &symbol)) => Err(HmmError::SymbolOutOfRange {
                symbol,
                step,
                num_observations: self.num_observations,
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn check_non_empty(&self, observations: &[usize]) -> Result<(), HmmError> {
        if observations.is_empty() {
            return Err(HmmError::EmptyObservations);
        }
        self.check_observations(observations)
    }
}

fn fill_normalized<R: RngCore + ?Sized>(row: &mut [f64], rng: &mut R) {
    for v in row.iter_mut() {
        *v = unit_interval(rng);
    }
    let sum: f64 = row.iter().sum();
    if sum > 0.0 {
        for v in row.iter_mut() {
            *v /= sum;
        }
    } else {
        let uniform = 1.0 / row.len() as f64;
        row.iter_mut().for_each(|v| *v = uniform);
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), HmmError> {
    if expected == found {
        Ok(())
    } else {
        Err(HmmError::ShapeMismatch {
            field,
            expected,
            found,
        })
    }
}
