//! Forward-backward recursions.
//!
//! The `*_log` functions work on log-likelihoods and are the ones to use for
//! anything but short sequences: plain-space messages are joint probabilities
//! of the whole prefix/suffix and underflow to 0 after a few hundred steps.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::likelihoods::{likelihoods, log_likelihoods};
use super::utils::{check_shapes, logsumexp};
use crate::emissions::EmissionModel;
use crate::errors::{HmmError, Result};
use crate::hmm::HMM;

/// Forward messages `alpha[t, k] = P(y_0..y_t, z_t = k)` and the total
/// log-likelihood `ln P(y_0..y_{T-1})`.
pub fn messages_forwards(pi: ArrayView1<f64>, a: ArrayView2<f64>, likelihoods: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    check_shapes(Some(pi), a, likelihoods)?;
    let mut alphas = Array2::<f64>::zeros(likelihoods.raw_dim());
    alphas.row_mut(0).assign(&(&pi * &likelihoods.row(0)));
    for t in 1..likelihoods.nrows() {
        let new_values = alphas.row(t - 1).dot(&a) * &likelihoods.row(t);
        alphas.row_mut(t).assign(&new_values);
    }
    let logtot = alphas.row(likelihoods.nrows() - 1).sum().ln();
    Ok((alphas, logtot))
}

/// Backward messages `beta[t, k] = P(y_{t+1}..y_{T-1} | z_t = k)`, with
/// `beta[T-1, k] = 1`.
pub fn messages_backwards(a: ArrayView2<f64>, likelihoods: ArrayView2<f64>) -> Result<Array2<f64>> {
    check_shapes(None, a, likelihoods)?;
    let nobs = likelihoods.nrows();
    let mut betas = Array2::<f64>::zeros(likelihoods.raw_dim());
    betas.row_mut(nobs - 1).fill(1.0);
    for t in (0..nobs - 1).rev() {
        let tmp = &betas.row(t + 1) * &likelihoods.row(t + 1);
        let new_values = a.dot(&tmp);
        betas.row_mut(t).assign(&new_values);
    }
    Ok(betas)
}

/// `gamma[t, k] = alpha[t, k] beta[t, k]`, renormalized per row.
pub fn posteriors(alphas: ArrayView2<f64>, betas: ArrayView2<f64>) -> Result<Array2<f64>> {
    let mut gammas = &alphas * &betas;
    for (t, mut row) in gammas.axis_iter_mut(Axis(0)).enumerate() {
        let s = row.sum();
        if !(s > 0.0) || !s.is_finite() {
            return Err(HmmError::NumericInstability(format!("posterior normalizer {} at t = {}", s, t)));
        }
        row /= s;
    }
    Ok(gammas)
}

/// Log-space [`messages_forwards`]: takes log-likelihoods, returns `ln alpha`.
pub fn messages_forwards_log(pi: ArrayView1<f64>, a: ArrayView2<f64>, log_likelihoods: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    check_shapes(Some(pi), a, log_likelihoods)?;
    let (nobs, nstates) = log_likelihoods.dim();
    let log_a = a.mapv(f64::ln);
    let mut log_alphas = Array2::<f64>::zeros((nobs, nstates));
    log_alphas.row_mut(0).assign(&(pi.mapv(f64::ln) + log_likelihoods.row(0)));
    let mut buffer = Array1::<f64>::zeros(nstates);
    for t in 1..nobs {
        for state_to in 0..nstates {
            buffer.assign(&log_alphas.row(t - 1));
            buffer += &log_a.column(state_to);
            log_alphas[[t, state_to]] = logsumexp(buffer.view()) + log_likelihoods[[t, state_to]];
        }
    }
    let logtot = logsumexp(log_alphas.row(nobs - 1));
    Ok((log_alphas, logtot))
}

/// Log-space [`messages_backwards`]: `ln beta`, with `ln beta[T-1, k] = 0`.
pub fn messages_backwards_log(a: ArrayView2<f64>, log_likelihoods: ArrayView2<f64>) -> Result<Array2<f64>> {
    check_shapes(None, a, log_likelihoods)?;
    let (nobs, nstates) = log_likelihoods.dim();
    let log_a = a.mapv(f64::ln);
    let mut log_betas = Array2::<f64>::zeros((nobs, nstates));
    let mut buffer = Array1::<f64>::zeros(nstates);
    for t in (0..nobs - 1).rev() {
        let tmp = &log_betas.row(t + 1) + &log_likelihoods.row(t + 1);
        for state_from in 0..nstates {
            buffer.assign(&log_a.row(state_from));
            buffer += &tmp;
            log_betas[[t, state_from]] = logsumexp(buffer.view());
        }
    }
    Ok(log_betas)
}

/// Log-space [`posteriors`]; the returned posteriors are plain probabilities.
pub fn posteriors_log(log_alphas: ArrayView2<f64>, log_betas: ArrayView2<f64>) -> Result<Array2<f64>> {
    let mut gammas = &log_alphas + &log_betas;
    for (t, mut row) in gammas.axis_iter_mut(Axis(0)).enumerate() {
        let s = logsumexp(row.view());
        if !s.is_finite() {
            return Err(HmmError::NumericInstability(format!("log posterior normalizer {} at t = {}", s, t)));
        }
        row.mapv_inplace(|x| (x - s).exp());
    }
    Ok(gammas)
}

fn check_total(logtot: f64) -> Result<f64> {
    if logtot.is_finite() {
        Ok(logtot)
    } else {
        Err(HmmError::NumericInstability(format!("total log-likelihood {}", logtot)))
    }
}

/// Posteriors `gamma` (`T x K`) and the total log-likelihood of
/// `observations`, computed in log space.
pub fn forward_backward<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    let log_l = log_likelihoods(hmm, observations)?;
    let (log_alphas, logtot) = messages_forwards_log(hmm.pi().view(), hmm.a().view(), log_l.view())?;
    let logtot = check_total(logtot)?;
    let log_betas = messages_backwards_log(hmm.a().view(), log_l.view())?;
    let gammas = posteriors_log(log_alphas.view(), log_betas.view())?;
    Ok((gammas, logtot))
}

/// Same as [`forward_backward`] but in probability space. Only meaningful for
/// sequences short enough not to underflow; kept as a reference for the log
/// space recursions.
pub fn forward_backward_plain<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    let l = likelihoods(hmm, observations)?;
    let (alphas, logtot) = messages_forwards(hmm.pi().view(), hmm.a().view(), l.view())?;
    let logtot = check_total(logtot)?;
    let betas = messages_backwards(hmm.a().view(), l.view())?;
    let gammas = posteriors(alphas.view(), betas.view())?;
    Ok((gammas, logtot))
}

/// Log forward messages of `observations` under `hmm`, with the total
/// log-likelihood.
pub fn forward_messages<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    let log_l = log_likelihoods(hmm, observations)?;
    messages_forwards_log(hmm.pi().view(), hmm.a().view(), log_l.view())
}

/// Log backward messages of `observations` under `hmm`. The total
/// log-likelihood is recovered from the first step,
/// `logsumexp(ln pi + ln L[0] + ln beta[0])`.
pub fn backward_messages<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(Array2<f64>, f64)> {
    let log_l = log_likelihoods(hmm, observations)?;
    let log_betas = messages_backwards_log(hmm.a().view(), log_l.view())?;
    let first = hmm.pi().mapv(f64::ln) + &log_l.row(0) + &log_betas.row(0);
    let logtot = logsumexp(first.view());
    Ok((log_betas, logtot))
}
