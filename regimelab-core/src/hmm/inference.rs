//! Forward/backward recursions, Viterbi decoding and next-step prediction.
//!
//! The plain recursions carry raw joint probabilities and underflow on long
//! sequences. The scaled variants normalize each forward step to sum to 1
//! and divide the backward step by the same coefficient, so
//! `ln P(O) = Σ ln c_t` stays representable.

use super::{HmmError, HmmModel, Scaling, LOG_FLOOR};

/// Output of the scaled forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledForward {
    /// `alpha[t]` normalized to sum to 1 (all zeros after a degenerate step).
    pub alpha: Vec<Vec<f64>>,
    /// Per-step scaling coefficients `c_t`.
    pub scales: Vec<f64>,
}

impl ScaledForward {
    /// `Σ ln c_t`, or `-inf` when some step had zero probability mass.
    pub fn log_likelihood(&self) -> f64 {
        if self.is_degenerate() {
            return f64::NEG_INFINITY;
        }
        self.scales.iter().map(|c| c.ln()).sum()
    }

    pub fn is_degenerate(&self) -> bool {
        self.scales.iter().any(|&c| c <= 0.0 || !c.is_finite())
    }
}

impl HmmModel {
    /// `alpha[t][j] = P(o_0..o_t, q_t = j)`. Empty input gives an empty table.
    pub fn forward(&self, observations: &[usize]) -> Result<Vec<Vec<f64>>, HmmError> {
        self.check_observations(observations)?;
        let mut alpha: Vec<Vec<f64>> = Vec::with_capacity(observations.len());
        for &obs in observations {
            let row = match alpha.last() {
                None => (0..self.num_states)
                    .map(|i| self.initial[i] * self.emission[i][obs])
                    .collect(),
                Some(prev) => self.propagate(prev, obs),
            };
            alpha.push(row);
        }
        Ok(alpha)
    }

    /// `beta[t][i] = P(o_{t+1}..o_{T-1} | q_t = i)`, with `beta[T-1] = 1`.
    pub fn backward(&self, observations: &[usize]) -> Result<Vec<Vec<f64>>, HmmError> {
        self.check_observations(observations)?;
        let n = self.num_states;
        let len = observations.len();
        let mut beta = vec![vec![0.0; n]; len];
        if len == 0 {
            return Ok(beta);
        }
        beta[len - 1] = vec![1.0; n];
        for t in (0..len - 1).rev() {
            let next = observations[t + 1];
            for i in 0..n {
                beta[t][i] = (0..n)
                    .map(|j| self.transition[i][j] * self.emission[j][next] * beta[t + 1][j])
                    .sum();
            }
        }
        Ok(beta)
    }

    pub fn forward_scaled(&self, observations: &[usize]) -> Result<ScaledForward, HmmError> {
        self.check_observations(observations)?;
        let mut alpha: Vec<Vec<f64>> = Vec::with_capacity(observations.len());
        let mut scales = Vec::with_capacity(observations.len());
        for &obs in observations {
            let mut row: Vec<f64> = match alpha.last() {
                None => (0..self.num_states)
                    .map(|i| self.initial[i] * self.emission[i][obs])
                    .collect(),
                Some(prev) => self.propagate(prev, obs),
            };
            let c: f64 = row.iter().sum();
            if c > 0.0 {
                row.iter_mut().for_each(|v| *v /= c);
            }
            scales.push(c);
            alpha.push(row);
        }
        Ok(ScaledForward { alpha, scales })
    }

    /// Backward pass scaled by the forward coefficients, so that
    /// `alpha_hat[t][i] * beta_hat[t][i]` is the posterior of state `i`.
    pub fn backward_scaled(
        &self,
        observations: &[usize],
        scales: &[f64],
    ) -> Result<Vec<Vec<f64>>, HmmError> {
        self.check_observations(observations)?;
        let n = self.num_states;
        let len = observations.len();
        let mut beta = vec![vec![0.0; n]; len];
        if len == 0 {
            return Ok(beta);
        }
        beta[len - 1] = vec![1.0; n];
        for t in (0..len - 1).rev() {
            let next = observations[t + 1];
            let c = scales.get(t + 1).copied().unwrap_or(0.0);
            for i in 0..n {
                let sum: f64 = (0..n)
                    .map(|j| self.transition[i][j] * self.emission[j][next] * beta[t + 1][j])
                    .sum();
                beta[t][i] = if c > 0.0 { sum / c } else { 0.0 };
            }
        }
        Ok(beta)
    }

    /// `ln P(O)` through the scaled recursion; `-inf` if the sequence is impossible.
    pub fn log_likelihood(&self, observations: &[usize]) -> Result<f64, HmmError> {
        self.check_non_empty(observations)?;
        Ok(self.forward_scaled(observations)?.log_likelihood())
    }

    /// Most likely state path (log domain, `ln(p + 1e-10)` everywhere).
    ///
    /// Ties resolve to the lowest state index.
    pub fn viterbi(&self, observations: &[usize]) -> Result<Vec<usize>, HmmError> {
        self.check_non_empty(observations)?;
        let n = self.num_states;
        let len = observations.len();
        let ln = |p: f64| (p + LOG_FLOOR).ln();

        let mut delta: Vec<f64> = (0..n)
            .map(|i| ln(self.initial[i]) + ln(self.emission[i][observations[0]]))
            .collect();
        let mut psi = vec![vec![0usize; n]; len];

        for t in 1..len {
            let mut next = vec![0.0; n];
            for j in 0..n {
                let mut best = f64::NEG_INFINITY;
                let mut best_i = 0;
                for (i, d) in delta.iter().enumerate() {
                    let v = d + ln(self.transition[i][j]);
                    if v > best {
                        best = v;
                        best_i = i;
                    }
                }
                next[j] = best + ln(self.emission[j][observations[t]]);
                psi[t][j] = best_i;
            }
            delta = next;
        }

        let mut last = 0;
        for i in 1..n {
            if delta[i] > delta[last] {
                last = i;
            }
        }
        let mut path = vec![0usize; len];
        path[len - 1] = last;
        for t in (0..len - 1).rev() {
            path[t] = psi[t + 1][path[t + 1]];
        }
        Ok(path)
    }

    /// Posterior over states at the final step, with [`Scaling::Auto`].
    pub fn state_probabilities(&self, observations: &[usize]) -> Result<Vec<f64>, HmmError> {
        self.state_probabilities_with(observations, Scaling::Auto)
    }

    /// Posterior over states at the final step.
    ///
    /// The unscaled form is `alpha·beta / (P(O) + 1e-10)`; the scaled form is
    /// the normalized final forward row.
    pub fn state_probabilities_with(
        &self,
        observations: &[usize],
        scaling: Scaling,
    ) -> Result<Vec<f64>, HmmError> {
        self.check_non_empty(observations)?;
        let alpha = self.forward(observations)?;
        let last = alpha.len() - 1;
        let p_obs: f64 = alpha[last].iter().sum();
        if scaling.use_unscaled(p_obs) {
            // beta at the final step is all ones
            return Ok(alpha[last].iter().map(|a| a / (p_obs + LOG_FLOOR)).collect());
        }
        let scaled = self.forward_scaled(observations)?;
        Ok(scaled.alpha[last].clone())
    }

    pub fn predict_next_state(&self, observations: &[usize]) -> Result<usize, HmmError> {
        let path = self.viterbi(observations)?;
        Ok(self.most_likely_successor(path[path.len() - 1]))
    }

    pub fn predict_next_observation(&self, observations: &[usize]) -> Result<usize, HmmError> {
        let path = self.viterbi(observations)?;
        Ok(self.most_likely_emission(path[path.len() - 1]))
    }

    /// Argmax of `A[state]`; first index wins ties.
    pub fn most_likely_successor(&self, state: usize) -> usize {
        self.transition.get(state).map_or(0, |row| first_argmax(row))
    }

    /// Argmax of `B[state]`; first index wins ties.
    pub fn most_likely_emission(&self, state: usize) -> usize {
        self.emission.get(state).map_or(0, |row| first_argmax(row))
    }

    /// One forward step: `(Σ_i prev[i]·A[i][j])·B[j][obs]`.
    fn propagate(&self, prev: &[f64], obs: usize) -> Vec<f64> {
        (0..self.num_states)
            .map(|j| {
                let into: f64 = prev
                    .iter()
                    .enumerate()
                    .map(|(i, a)| a * self.transition[i][j])
                    .sum();
                into * self.emission[j][obs]
            })
            .collect()
    }
}

fn first_argmax(row: &[f64]) -> usize {
    let mut best = 0.0;
    let mut idx = 0;
    for (j, &p) in row.iter().enumerate() {
        if p > best {
            best = p;
            idx = j;
        }
    }
    idx
}
