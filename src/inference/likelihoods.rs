use ndarray::{Array2, ArrayView1, ArrayView2, Zip};

use crate::emissions::EmissionModel;
use crate::errors::{HmmError, Result};
use crate::hmm::HMM;

/// Checks that the sequence is non-empty and that every emission model
/// accepts observations of its width.
pub fn check_observations<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<()> {
    if observations.nrows() == 0 {
        return Err(HmmError::EmptySequence);
    }
    for (state, model) in hmm.b().iter().enumerate() {
        if model.dimension() != observations.ncols() {
            return Err(HmmError::DimensionMismatch {
                state,
                expected: model.dimension(),
                found: observations.ncols(),
            });
        }
    }
    Ok(())
}

/// `T x K` matrix of `b[k].likelihood(observations[t])`.
pub fn likelihoods<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<Array2<f64>> {
    let matrix = evaluate(hmm, observations, |model, x| model.likelihood(x))?;
    if let Some(v) = matrix.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(HmmError::NumericInstability(format!("emission likelihood {}", v)));
    }
    Ok(matrix)
}

/// `T x K` matrix of `b[k].log_likelihood(observations[t])`. Cells may be
/// `-inf` (observation outside the support) but never NaN or `+inf`.
pub fn log_likelihoods<E: EmissionModel>(hmm: &HMM<E>, observations: ArrayView2<f64>) -> Result<Array2<f64>> {
    let matrix = evaluate(hmm, observations, |model, x| model.log_likelihood(x))?;
    if let Some(v) = matrix.iter().find(|v| v.is_nan() || **v == f64::INFINITY) {
        return Err(HmmError::NumericInstability(format!("emission log-likelihood {}", v)));
    }
    Ok(matrix)
}

fn evaluate<E, F>(hmm: &HMM<E>, observations: ArrayView2<f64>, f: F) -> Result<Array2<f64>>
where
    E: EmissionModel,
    F: Fn(&E, ArrayView1<f64>) -> f64 + Sync + Send,
{
    check_observations(hmm, observations)?;
    let mut matrix = Array2::zeros((observations.nrows(), hmm.nstates()));
    let rows = Zip::from(matrix.rows_mut()).and(observations.rows());

    #[cfg(feature = "parallel")]
    rows.par_for_each(|mut row, x| {
        for (cell, model) in row.iter_mut().zip(hmm.b()) {
            *cell = f(model, x);
        }
    });

    #[cfg(not(feature = "parallel"))]
    rows.for_each(|mut row, x| {
        for (cell, model) in row.iter_mut().zip(hmm.b()) {
            *cell = f(model, x);
        }
    });

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::{Categorical, DiagNormal, Emission, Normal};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn hmm() -> HMM {
        let b: Vec<Emission> = vec![Normal::new(0.0, 1.0).unwrap().into(), Normal::new(10.0, 1.0).unwrap().into()];
        HMM::new(array![0.6, 0.4], array![[0.7, 0.3], [0.4, 0.6]], b).unwrap()
    }

    #[test]
    fn plain_and_log_agree() {
        let obs = array![[0.1], [9.8], [0.3]];
        let l = likelihoods(&hmm(), obs.view()).unwrap();
        let log_l = log_likelihoods(&hmm(), obs.view()).unwrap();
        assert_eq!(l.dim(), (3, 2));
        for (p, lp) in l.iter().zip(log_l.iter()) {
            assert_abs_diff_eq!(p.ln(), *lp, epsilon = 1e-9);
        }
    }

    #[test]
    fn empty_sequence() {
        let obs = Array2::<f64>::zeros((0, 1));
        assert_eq!(likelihoods(&hmm(), obs.view()), Err(HmmError::EmptySequence));
    }

    #[test]
    fn dimension_mismatch() {
        let obs = array![[0.1, 0.2]];
        assert_eq!(
            log_likelihoods(&hmm(), obs.view()),
            Err(HmmError::DimensionMismatch { state: 0, expected: 1, found: 2 })
        );
    }

    #[test]
    fn multivariate_mismatch() {
        let b = vec![
            DiagNormal::new(array![0.0, 0.0], array![1.0, 1.0]).unwrap(),
            DiagNormal::new(array![5.0, 5.0], array![1.0, 1.0]).unwrap(),
        ];
        let hmm = HMM::new(array![0.5, 0.5], array![[0.5, 0.5], [0.5, 0.5]], b).unwrap();
        let obs = array![[0.1, 0.2, 0.3]];
        assert!(matches!(
            likelihoods(&hmm, obs.view()),
            Err(HmmError::DimensionMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn zero_mass_is_neg_infinity() {
        let b = vec![Categorical::new(array![0.5, 0.5]).unwrap()];
        let hmm = HMM::new(array![1.0], array![[1.0]], b).unwrap();
        let log_l = log_likelihoods(&hmm, array![[0.0], [3.0]].view()).unwrap();
        assert_abs_diff_eq!(log_l[[0, 0]], 0.5f64.ln(), epsilon = 1e-12);
        assert_eq!(log_l[[1, 0]], f64::NEG_INFINITY);
    }
}
