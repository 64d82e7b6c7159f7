//! Baum-Welch re-estimation.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::likelihoods::log_likelihoods;
use super::messages::{forward_backward, messages_backwards_log, messages_forwards_log, posteriors_log};
use crate::emissions::EmissionModel;
use crate::errors::{HmmError, Result};
use crate::hmm::HMM;

/// Relative slack allowed before a log-likelihood drop is reported.
const DECREASE_TOLERANCE: f64 = 1e-9;

/// One EM step. Returns the re-estimated model and the log-likelihood of the
/// observations under the *input* model.
///
/// The new initial distribution is `gamma[0, .]`, transition rows are the
/// normalized expected transition counts (a state never left keeps its row),
/// and each emission model is refit on its column of `gamma`.
pub fn mle_step<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(HMM<E>, f64)> {
    let nstates = hmm.nstates();
    let log_l = log_likelihoods(hmm, observations)?;
    let (log_alphas, ll) = messages_forwards_log(hmm.pi().view(), hmm.a().view(), log_l.view())?;
    if !ll.is_finite() {
        return Err(HmmError::NumericInstability(format!("total log-likelihood {}", ll)));
    }
    let log_betas = messages_backwards_log(hmm.a().view(), log_l.view())?;
    let gammas = posteriors_log(log_alphas.view(), log_betas.view())?;

    // Expected transition counts, sum over t of xi[t, i, j].
    let log_a = hmm.a().mapv(f64::ln);
    let mut xi_sum = Array2::<f64>::zeros((nstates, nstates));
    for t in 0..observations.nrows() - 1 {
        let tmp = &log_l.row(t + 1) + &log_betas.row(t + 1);
        for state_from in 0..nstates {
            let log_alpha = log_alphas[[t, state_from]];
            for state_to in 0..nstates {
                xi_sum[[state_from, state_to]] += (log_alpha + log_a[[state_from, state_to]] + tmp[state_to] - ll).exp();
            }
        }
    }

    let mut a = hmm.a().clone();
    for (counts, mut row) in xi_sum.rows().into_iter().zip(a.rows_mut()) {
        let s = counts.sum();
        if !s.is_finite() {
            return Err(HmmError::NumericInstability(format!("expected transition count {}", s)));
        }
        if s > 0.0 {
            row.assign(&(&counts / s));
        }
    }
    let pi = gammas.row(0).to_owned();

    let b = hmm
        .b()
        .iter()
        .enumerate()
        .map(|(state, model)| {
            model
                .reestimate(observations, gammas.column(state))
                .map_err(|e| e.for_state(state))
        })
        .collect::<Result<Vec<E>>>()?;

    Ok((HMM::new(pi, a, b)?, ll))
}

/// Terminal state of [`fit`].
#[derive(Debug, Clone, PartialEq)]
pub enum FitState {
    /// Two consecutive log-likelihoods differ by less than `eps`.
    Converged,
    MaxIterationsReached,
    /// An iteration failed; the returned model is the last one obtained.
    Failed(HmmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub eps: f64,
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { eps: 1e-3, max_iterations: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult<E> {
    pub model: HMM<E>,
    /// Last log-likelihood computed, i.e. the one of the model that entered
    /// the last successful iteration (`-inf` if none succeeded).
    pub log_likelihood: f64,
    pub iterations: usize,
    pub state: FitState,
    /// Log-likelihood of every successful iteration, in order.
    pub history: Vec<f64>,
    /// Number of iterations whose log-likelihood was lower than the previous one.
    pub decreases: usize,
}

impl<E> FitResult<E> {
    pub fn converged(&self) -> bool {
        self.state == FitState::Converged
    }
}

/// Runs [`mle_step`] until the log-likelihood changes by less than `eps` or
/// `max_iterations` steps were done.
pub fn fit<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>, eps: f64, max_iterations: usize) -> FitResult<E> {
    fit_with(hmm, observations, &FitOptions { eps, max_iterations })
}

pub fn fit_with<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>, options: &FitOptions) -> FitResult<E> {
    let mut result = FitResult {
        model: hmm.clone(),
        log_likelihood: f64::NEG_INFINITY,
        iterations: 0,
        state: FitState::MaxIterationsReached,
        history: Vec::new(),
        decreases: 0,
    };

    if let Err(e) = hmm.validate() {
        result.state = FitState::Failed(e);
        return result;
    }

    if options.max_iterations == 0 {
        match forward_backward(hmm, observations) {
            Ok((_, ll)) => result.log_likelihood = ll,
            Err(e) => result.state = FitState::Failed(e),
        }
        return result;
    }

    let mut previous_log_likelihood = f64::NEG_INFINITY;
    loop {
        let (updated, ll) = match mle_step(&result.model, observations) {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(iteration = result.iterations + 1, error = %e, "baum-welch iteration failed");
                result.state = FitState::Failed(e);
                return result;
            }
        };
        result.iterations += 1;
        tracing::debug!(iteration = result.iterations, log_likelihood = ll, "baum-welch iteration");

        if ll < previous_log_likelihood - DECREASE_TOLERANCE * previous_log_likelihood.abs().max(1.0) {
            tracing::warn!(
                iteration = result.iterations,
                previous = previous_log_likelihood,
                current = ll,
                "log-likelihood decreased"
            );
            result.decreases += 1;
        }

        let converged = (ll - previous_log_likelihood).abs() < options.eps;
        previous_log_likelihood = ll;
        result.history.push(ll);
        result.log_likelihood = ll;
        result.model = updated;

        if converged {
            result.state = FitState::Converged;
            return result;
        }
        if result.iterations == options.max_iterations {
            result.state = FitState::MaxIterationsReached;
            return result;
        }
    }
}
