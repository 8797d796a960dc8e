//! Baum-Welch re-estimation and best-of-N seeded training.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{HmmError, HmmModel, Scaling, LOG_FLOOR};
use crate::rng::{training_seed, Lcg};

/// Expected occupancy below which a state's rows are left as they are.
/// Smaller sums are built from subnormal terms and lose precision.
const MIN_OCCUPANCY: f64 = 1e-300;

/// Training configuration for one instrument's regime model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmConfig {
    pub num_states: usize,
    pub num_observations: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub base_seed: u64,
    pub num_runs: u32,
    pub scaling: Scaling,
}

impl Default for HmmConfig {
    fn default() -> Self {
        Self {
            num_states: 3,
            num_observations: 10,
            max_iterations: 50,
            tolerance: 1e-6,
            base_seed: 12345,
            num_runs: 3,
            scaling: Scaling::Auto,
        }
    }
}

/// Outcome of one Baum-Welch run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    /// Log-likelihood of the last iteration that did not converge;
    /// `-inf` if every iteration was skipped.
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
    /// `Unscaled` or `Scaled`, never `Auto`.
    pub scaling: Scaling,
}

/// Accumulated expectations from one E-step.
struct Expectations {
    log_likelihood: f64,
    initial: Vec<f64>,
    /// Σ_{t<T-1} ξ_t(i, j)
    transitions: Vec<Vec<f64>>,
    /// Σ_{t<T-1} γ_t(i)
    from_state: Vec<f64>,
    /// Σ_{t: o_t = k} γ_t(i)
    emissions: Vec<Vec<f64>>,
    /// Σ_t γ_t(i)
    in_state: Vec<f64>,
}

impl HmmModel {
    /// Run Baum-Welch for at most `max_iterations` iterations.
    ///
    /// An iteration whose sequence probability is zero changes nothing but
    /// still counts. Training stops once the log-likelihood moves by less
    /// than `tolerance`. With [`Scaling::Auto`] the recursion is picked once,
    /// from the probability of the sequence under the initial parameters.
    pub fn train(
        &mut self,
        observations: &[usize],
        max_iterations: usize,
        tolerance: f64,
        scaling: Scaling,
    ) -> Result<TrainReport, HmmError> {
        self.check_non_empty(observations)?;
        let scaled = match scaling {
            Scaling::Auto => {
                let p_obs: f64 = self.forward(observations)?.last().map_or(0.0, |r| r.iter().sum());
                !scaling.use_unscaled(p_obs)
            }
            other => other == Scaling::Scaled,
        };

        let mut prev = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..max_iterations {
            iterations += 1;
            let expected = if scaled {
                self.expectations_scaled(observations)?
            } else {
                self.expectations_unscaled(observations)?
            };
            let Some(expected) = expected else {
                continue;
            };
            self.maximize(&expected);
            if (expected.log_likelihood - prev).abs() < tolerance {
                converged = true;
                break;
            }
            prev = expected.log_likelihood;
        }

        Ok(TrainReport {
            log_likelihood: prev,
            iterations,
            converged,
            scaling: if scaled { Scaling::Scaled } else { Scaling::Unscaled },
        })
    }

    fn expectations_unscaled(&self, observations: &[usize]) -> Result<Option<Expectations>, HmmError> {
        let alpha = self.forward(observations)?;
        let beta = self.backward(observations)?;
        let p_obs: f64 = alpha[alpha.len() - 1].iter().sum();
        if p_obs == 0.0 || !p_obs.is_finite() {
            return Ok(None);
        }
        let xi_norm = vec![p_obs; observations.len()];
        Ok(Some(self.accumulate(
            observations,
            &alpha,
            &beta,
            p_obs,
            &xi_norm,
            (p_obs + LOG_FLOOR).ln(),
        )))
    }

    fn expectations_scaled(&self, observations: &[usize]) -> Result<Option<Expectations>, HmmError> {
        let forward = self.forward_scaled(observations)?;
        if forward.is_degenerate() {
            return Ok(None);
        }
        let beta = self.backward_scaled(observations, &forward.scales)?;
        Ok(Some(self.accumulate(
            observations,
            &forward.alpha,
            &beta,
            1.0,
            &forward.scales,
            forward.log_likelihood(),
        )))
    }

    /// γ_t(i) = α·β / `gamma_norm`; ξ_t(i,j) = α_t(i)·A·B·β_{t+1}(j) / `xi_norm[t+1]`.
    fn accumulate(
        &self,
        observations: &[usize],
        alpha: &[Vec<f64>],
        beta: &[Vec<f64>],
        gamma_norm: f64,
        xi_norm: &[f64],
        log_likelihood: f64,
    ) -> Expectations {
        let n = self.num_states;
        let len = observations.len();
        let mut e = Expectations {
            log_likelihood,
            initial: vec![0.0; n],
            transitions: vec![vec![0.0; n]; n],
            from_state: vec![0.0; n],
            emissions: vec![vec![0.0; self.num_observations]; n],
            in_state: vec![0.0; n],
        };

        for (t, &obs) in observations.iter().enumerate() {
            for i in 0..n {
                let gamma = alpha[t][i] * beta[t][i] / gamma_norm;
                if t == 0 {
                    e.initial[i] = gamma;
                }
                e.in_state[i] += gamma;
                e.emissions[i][obs] += gamma;
                if t + 1 < len {
                    e.from_state[i] += gamma;
                }
            }
            if t + 1 < len {
                let next = observations[t + 1];
                for i in 0..n {
                    for j in 0..n {
                        e.transitions[i][j] += alpha[t][i]
                            * self.transition[i][j]
                            * self.emission[j][next]
                            * beta[t + 1][j]
                            / xi_norm[t + 1];
                    }
                }
            }
        }
        e
    }

    /// M-step. A row whose state (almost) never occurs keeps its previous
    /// values so every row stays stochastic.
    fn maximize(&mut self, e: &Expectations) {
        self.initial.clone_from(&e.initial);
        for i in 0..self.num_states {
            if e.from_state[i] > MIN_OCCUPANCY {
                for j in 0..self.num_states {
                    self.transition[i][j] = e.transitions[i][j] / e.from_state[i];
                }
            }
            if e.in_state[i] > MIN_OCCUPANCY {
                for k in 0..self.num_observations {
                    self.emission[i][k] = e.emissions[i][k] / e.in_state[i];
                }
            }
        }
    }
}

/// The model kept for one instrument after best-of-N training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub model: HmmModel,
    pub log_likelihood: f64,
    pub seed: u64,
    /// Runs that produced a finite log-likelihood.
    pub valid_runs: u32,
    /// True when every run failed and the model is untrained.
    pub fallback: bool,
}

/// Train `config.num_runs` seeded models and keep the highest log-likelihood.
///
/// Run `r` is seeded with `base_seed + instrument_id * 1000 + r` on its own
/// generator. If no run yields a finite log-likelihood, the result is an
/// untrained model drawn from the run-0 seed with log-likelihood 0.
pub fn train_best_of_runs(
    observations: &[usize],
    instrument_id: u32,
    config: &HmmConfig,
) -> Result<TrainedModel, HmmError> {
    HmmModel::new(config.num_states, config.num_observations)?.check_non_empty(observations)?;

    let mut best: Option<TrainedModel> = None;
    let mut valid_runs = 0;
    for run in 0..config.num_runs {
        let seed = training_seed(config.base_seed, instrument_id, run);
        let mut model = HmmModel::random(
            config.num_states,
            config.num_observations,
            &mut Lcg::new(seed),
        )?;
        let report = model.train(
            observations,
            config.max_iterations,
            config.tolerance,
            config.scaling,
        )?;

        if !report.log_likelihood.is_finite() {
            warn!(
                instrument_id,
                run, seed, log_likelihood = report.log_likelihood, "HMM training run failed"
            );
            continue;
        }
        valid_runs += 1;
        debug!(
            instrument_id,
            run,
            seed,
            log_likelihood = report.log_likelihood,
            iterations = report.iterations,
            converged = report.converged,
            "HMM training run finished"
        );
        if best
            .as_ref()
            .map_or(true, |b| report.log_likelihood > b.log_likelihood)
        {
            best = Some(TrainedModel {
                model,
                log_likelihood: report.log_likelihood,
                seed,
                valid_runs: 0,
                fallback: false,
            });
        }
    }

    match best {
        Some(mut trained) => {
            trained.valid_runs = valid_runs;
            Ok(trained)
        }
        None => {
            let seed = training_seed(config.base_seed, instrument_id, 0);
            warn!(
                instrument_id,
                runs = config.num_runs,
                seed,
                "all HMM training runs failed, using untrained model"
            );
            Ok(TrainedModel {
                model: HmmModel::random(
                    config.num_states,
                    config.num_observations,
                    &mut Lcg::new(seed),
                )?,
                log_likelihood: 0.0,
                seed,
                valid_runs: 0,
                fallback: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::HmmParameters;
    use crate::indicators::assert_approx;

    const RUNS: [usize; 12] = [0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1];

    fn assert_stochastic(m: &HmmModel) {
        assert_approx(m.initial_prob().iter().sum::<f64>(), 1.0, 1e-9);
        for row in m.transition_prob().iter().chain(m.emission_prob()) {
            assert_approx(row.iter().sum::<f64>(), 1.0, 1e-9);
        }
    }

    #[test]
    fn persistent_runs_learn_sticky_transitions() {
        let mut m = HmmModel::random(2, 2, &mut Lcg::new(42)).unwrap();
        let report = m.train(&RUNS, 50, 1e-6, Scaling::Auto).unwrap();
        let a = m.transition_prob();
        assert!(a[0][0] > a[0][1]);
        assert!(a[1][1] > a[1][0]);
        assert_approx(a[0][0], 2.0 / 3.0, 1e-4);
        assert_approx(a[1][1], 0.8, 1e-4);
        assert_approx(report.log_likelihood, -6.3211, 1e-3);
        assert!(report.converged);
        assert_eq!(m.viterbi(&RUNS).unwrap(), RUNS.to_vec());
        assert_stochastic(&m);
    }

    #[test]
    fn other_seed_also_prefers_self_transitions() {
        let mut m = HmmModel::random(2, 2, &mut Lcg::new(12345)).unwrap();
        m.train(&RUNS, 50, 1e-6, Scaling::Auto).unwrap();
        let a = m.transition_prob();
        assert!(a[0][0] > a[0][1] && a[1][1] > a[1][0]);
        assert_stochastic(&m);
    }

    #[test]
    fn scaled_and_unscaled_agree_on_short_sequences() {
        let mut plain = HmmModel::random(2, 2, &mut Lcg::new(7)).unwrap();
        let mut scaled = plain.clone();
        plain.train(&RUNS, 10, 0.0, Scaling::Unscaled).unwrap();
        scaled.train(&RUNS, 10, 0.0, Scaling::Scaled).unwrap();
        for (a, b) in plain.transition_prob().iter().zip(scaled.transition_prob()) {
            for (x, y) in a.iter().zip(b) {
                assert_approx(*x, *y, 1e-9);
            }
        }
    }

    #[test]
    fn long_sequence_trains_with_scaling() {
        let obs: Vec<usize> = (0..2000).map(|t| (t / 25) % 3).collect();
        let mut m = HmmModel::random(3, 3, &mut Lcg::new(99)).unwrap();
        let report = m.train(&obs, 20, 1e-6, Scaling::Auto).unwrap();
        assert_eq!(report.scaling, Scaling::Scaled);
        assert!(report.log_likelihood.is_finite());
        assert_stochastic(&m);
    }

    #[test]
    fn rows_stay_stochastic_after_every_iteration() {
        let short: Vec<usize> = (0..60).map(|t| (t * 7 + t / 5) % 10).collect();
        let long: Vec<usize> = (0..1500).map(|t| (t * 3 + t / 11) % 10).collect();
        for (obs, scaling) in [(&short, Scaling::Unscaled), (&long, Scaling::Scaled)] {
            let mut m = HmmModel::random(3, 10, &mut Lcg::new(12345)).unwrap();
            assert_stochastic(&m);
            for _ in 0..25 {
                m.train(obs, 1, 0.0, scaling).unwrap();
                assert_stochastic(&m);
            }
        }
    }

    #[test]
    fn impossible_sequence_skips_every_iteration() {
        // symbol 1 can never be emitted
        let mut m = HmmModel::from_parameters(HmmParameters {
            num_states: 1,
            num_observations: 2,
            initial_prob: vec![1.0],
            transition_prob: vec![vec![1.0]],
            emission_prob: vec![vec![1.0, 0.0]],
        })
        .unwrap();
        let before = m.clone();
        let report = m.train(&[0, 1], 5, 1e-6, Scaling::Unscaled).unwrap();
        assert_eq!(report.log_likelihood, f64::NEG_INFINITY);
        assert_eq!(report.iterations, 5);
        assert!(!report.converged);
        assert_eq!(m, before);
    }

    #[test]
    fn training_is_reproducible() {
        let obs: Vec<usize> = (0..80).map(|t| (t * 7 + t / 9) % 4).collect();
        let config = HmmConfig {
            num_states: 3,
            num_observations: 4,
            ..HmmConfig::default()
        };
        let a = train_best_of_runs(&obs, 5, &config).unwrap();
        let b = train_best_of_runs(&obs, 5, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.log_likelihood.to_bits(), b.log_likelihood.to_bits());
        assert!(!a.fallback);
        assert_eq!(a.valid_runs, 3);
        assert!((12345 + 5000..12345 + 5003).contains(&a.seed));
    }

    #[test]
    fn best_run_has_highest_likelihood() {
        let obs: Vec<usize> = (0..60).map(|t| (t / 4) % 3).collect();
        let config = HmmConfig {
            num_states: 2,
            num_observations: 3,
            num_runs: 4,
            ..HmmConfig::default()
        };
        let best = train_best_of_runs(&obs, 1, &config).unwrap();
        for run in 0..4 {
            let mut m = HmmModel::random(2, 3, &mut Lcg::new(training_seed(12345, 1, run))).unwrap();
            let report = m.train(&obs, 50, 1e-6, Scaling::Auto).unwrap();
            assert!(report.log_likelihood <= best.log_likelihood);
        }
    }

    #[test]
    fn all_runs_failing_falls_back_to_untrained_model() {
        let config = HmmConfig {
            num_states: 2,
            num_observations: 2,
            max_iterations: 0,
            ..HmmConfig::default()
        };
        let trained = train_best_of_runs(&[0, 1, 0], 2, &config).unwrap();
        assert!(trained.fallback);
        assert_eq!(trained.log_likelihood, 0.0);
        assert_eq!(trained.seed, 14345);
        let expected = HmmModel::random(2, 2, &mut Lcg::new(14345)).unwrap();
        assert_eq!(trained.model, expected);
    }

    #[test]
    fn empty_observations_are_rejected() {
        assert_eq!(
            train_best_of_runs(&[], 0, &HmmConfig::default()),
            Err(HmmError::EmptyObservations)
        );
        assert_eq!(HmmModel::new(0, 2).map(|_| ()), Err(HmmError::NoStates));
    }
}
