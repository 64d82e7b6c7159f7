use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::likelihoods::{likelihoods, log_likelihoods};
use super::utils::{argmax, check_shapes};
use crate::emissions::EmissionModel;
use crate::errors::{HmmError, Result};
use crate::hmm::HMM;

fn backtrack(viterbi_bt: &Array2<usize>, mut end_state: usize) -> Array1<usize> {
    let nobs = viterbi_bt.nrows();
    let mut predicted = Array1::zeros(nobs);
    predicted[nobs - 1] = end_state;
    for t in (0..nobs - 1).rev() {
        end_state = viterbi_bt[[t + 1, end_state]];
        predicted[t] = end_state;
    }
    predicted
}

/// Most likely state sequence and its log-probability, from a matrix of
/// log-likelihoods. Ties are broken towards the lowest state index.
pub fn viterbi_from_log_likelihoods(pi: ArrayView1<f64>, a: ArrayView2<f64>, log_likelihoods: ArrayView2<f64>) -> Result<(Array1<usize>, f64)> {
    check_shapes(Some(pi), a, log_likelihoods)?;
    let (nobs, nstates) = log_likelihoods.dim();
    let log_a = a.mapv(f64::ln);
    let mut viterbi_array = Array2::<f64>::zeros((nobs, nstates));
    let mut viterbi_bt = Array2::<usize>::zeros((nobs, nstates));

    viterbi_array.row_mut(0).assign(&(pi.mapv(f64::ln) + log_likelihoods.row(0)));
    for t in 1..nobs {
        for state_to in 0..nstates {
            let probs = &viterbi_array.row(t - 1) + &log_a.column(state_to);
            let state_from = argmax(probs.view())?;
            viterbi_array[[t, state_to]] = probs[state_from] + log_likelihoods[[t, state_to]];
            viterbi_bt[[t, state_to]] = state_from;
        }
    }

    let end_state = argmax(viterbi_array.row(nobs - 1))?;
    let log_prob = viterbi_array[[nobs - 1, end_state]];
    if !log_prob.is_finite() {
        return Err(HmmError::NumericInstability(format!("best path log-probability {}", log_prob)));
    }
    Ok((backtrack(&viterbi_bt, end_state), log_prob))
}

/// Probability-space counterpart of [`viterbi_from_log_likelihoods`]; returns
/// the path and its (plain) probability.
pub fn viterbi_from_likelihoods(pi: ArrayView1<f64>, a: ArrayView2<f64>, likelihoods: ArrayView2<f64>) -> Result<(Array1<usize>, f64)> {
    check_shapes(Some(pi), a, likelihoods)?;
    let (nobs, nstates) = likelihoods.dim();
    let mut viterbi_array = Array2::<f64>::zeros((nobs, nstates));
    let mut viterbi_bt = Array2::<usize>::zeros((nobs, nstates));

    viterbi_array.row_mut(0).assign(&(&pi * &likelihoods.row(0)));
    for t in 1..nobs {
        for state_to in 0..nstates {
            let probs = &viterbi_array.row(t - 1) * &a.column(state_to);
            let state_from = argmax(probs.view())?;
            viterbi_array[[t, state_to]] = probs[state_from] * likelihoods[[t, state_to]];
            viterbi_bt[[t, state_to]] = state_from;
        }
    }

    let end_state = argmax(viterbi_array.row(nobs - 1))?;
    let prob = viterbi_array[[nobs - 1, end_state]];
    if !(prob > 0.0) || !prob.is_finite() {
        return Err(HmmError::NumericInstability(format!("best path probability {}", prob)));
    }
    Ok((backtrack(&viterbi_bt, end_state), prob))
}

/// Most likely hidden state sequence for `observations` (log space).
pub fn viterbi<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<Array1<usize>> {
    viterbi_with_log_prob(hmm, observations).map(|(path, _)| path)
}

/// [`viterbi`] together with the joint log-probability of the path and the
/// observations.
pub fn viterbi_with_log_prob<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<(Array1<usize>, f64)> {
    let log_l = log_likelihoods(hmm, observations)?;
    viterbi_from_log_likelihoods(hmm.pi().view(), hmm.a().view(), log_l.view())
}

/// [`viterbi`] in probability space, for short sequences.
pub fn viterbi_plain<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<Array1<usize>> {
    let l = likelihoods(hmm, observations)?;
    viterbi_from_likelihoods(hmm.pi().view(), hmm.a().view(), l.view()).map(|(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::{Categorical, Emission, Normal};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn scenario_path() {
        let b: Vec<Emission> = vec![Normal::new(0.0, 1.0).unwrap().into(), Normal::new(10.0, 1.0).unwrap().into()];
        let hmm = HMM::new(array![0.6, 0.4], array![[0.7, 0.3], [0.4, 0.6]], b).unwrap();
        let obs = array![[0.1], [9.8], [0.3]];
        assert_eq!(viterbi(&hmm, obs.view()).unwrap(), array![0, 1, 0]);
        assert_eq!(viterbi_plain(&hmm, obs.view()).unwrap(), array![0, 1, 0]);
    }

    // Classic healthy/fever example: observations normal, cold, dizzy.
    #[test]
    fn wikipedia_example() {
        let b = vec![
            Categorical::new(array![0.5, 0.4, 0.1]).unwrap(),
            Categorical::new(array![0.1, 0.3, 0.6]).unwrap(),
        ];
        let hmm = HMM::new(array![0.6, 0.4], array![[0.7, 0.3], [0.4, 0.6]], b).unwrap();
        let obs = array![[0.0], [1.0], [2.0]];
        let (path, log_prob) = viterbi_with_log_prob(&hmm, obs.view()).unwrap();
        assert_eq!(path, array![0, 0, 1]);
        assert_abs_diff_eq!(log_prob, 0.01512f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn ties_pick_lowest_state() {
        let b = vec![Categorical::new(array![0.5, 0.5]).unwrap(), Categorical::new(array![0.5, 0.5]).unwrap()];
        let hmm = HMM::new(array![0.5, 0.5], array![[0.5, 0.5], [0.5, 0.5]], b).unwrap();
        let obs = array![[0.0], [1.0], [1.0], [0.0]];
        let first = viterbi(&hmm, obs.view()).unwrap();
        assert_eq!(first, array![0, 0, 0, 0]);
        assert_eq!(viterbi(&hmm, obs.view()).unwrap(), first);
    }

    #[test]
    fn impossible_observations() {
        let b = vec![Categorical::new(array![1.0, 0.0]).unwrap()];
        let hmm = HMM::new(array![1.0], array![[1.0]], b).unwrap();
        let obs = array![[0.0], [1.0]];
        assert!(matches!(viterbi(&hmm, obs.view()), Err(HmmError::NumericInstability(_))));
    }

    #[test]
    fn zero_transitions_are_respected() {
        let b = vec![Categorical::new(array![0.9, 0.1]).unwrap(), Categorical::new(array![0.1, 0.9]).unwrap()];
        // state 1 is absorbing and unreachable
        let hmm = HMM::new(array![1.0, 0.0], array![[1.0, 0.0], [0.0, 1.0]], b).unwrap();
        let obs = array![[1.0], [1.0], [1.0]];
        assert_eq!(viterbi(&hmm, obs.view()).unwrap(), array![0, 0, 0]);
    }
}
