use ndarray::{ArrayView1, ArrayView2};
use ndarray_stats::QuantileExt;

use crate::errors::{HmmError, Result};

/// `ln(sum(exp(values)))`, shifted by the maximum so that neither the
/// exponentials nor the sum leave the representable range.
///
/// An empty input or an input of only `-inf` gives `-inf`.
pub fn logsumexp(values: ArrayView1<f64>) -> f64 {
    let m = values.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if !m.is_finite() {
        return m;
    }
    m + values.iter().map(|v| (v - m).exp()).sum::<f64>().ln()
}

/// Index of the first maximum.
pub fn argmax(values: ArrayView1<f64>) -> Result<usize> {
    values
        .argmax()
        .map_err(|e| HmmError::NumericInstability(format!("no maximum in {:?}: {}", values, e)))
}

/// Shape checks shared by the matrix-level recursions.
pub(crate) fn check_shapes(pi: Option<ArrayView1<f64>>, a: ArrayView2<f64>, likelihoods: ArrayView2<f64>) -> Result<()> {
    if likelihoods.nrows() == 0 {
        return Err(HmmError::EmptySequence);
    }
    let nstates = likelihoods.ncols();
    if a.nrows() != nstates || a.ncols() != nstates {
        return Err(HmmError::InvalidModel(format!(
            "transition matrix is {}x{} but the likelihood matrix has {} states",
            a.nrows(),
            a.ncols(),
            nstates
        )));
    }
    if let Some(pi) = pi {
        if pi.len() != nstates {
            return Err(HmmError::InvalidModel(format!(
                "{} initial probabilities for {} states",
                pi.len(),
                nstates
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};

    #[test]
    fn logsumexp_matches_naive() {
        let v = array![0.1f64.ln(), 0.2f64.ln(), 0.7f64.ln()];
        assert_abs_diff_eq!(logsumexp(v.view()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn logsumexp_large_values() {
        let v = array![1000.0, 1000.0];
        assert_abs_diff_eq!(logsumexp(v.view()), 1000.0 + 2f64.ln(), epsilon = 1e-9);
        let v = array![-1000.0, -1000.0];
        assert_abs_diff_eq!(logsumexp(v.view()), -1000.0 + 2f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn logsumexp_neg_infinity() {
        let v = array![f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert_eq!(logsumexp(v.view()), f64::NEG_INFINITY);
        assert_eq!(logsumexp(Array1::<f64>::zeros(0).view()), f64::NEG_INFINITY);
        let v = array![f64::NEG_INFINITY, 0.0];
        assert_eq!(logsumexp(v.view()), 0.0);
    }

    #[test]
    fn argmax_first_on_ties() {
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()).unwrap(), 1);
        assert_eq!(argmax(array![f64::NEG_INFINITY, f64::NEG_INFINITY].view()).unwrap(), 0);
        assert!(argmax(array![1.0, f64::NAN].view()).is_err());
    }

    #[test]
    fn shapes() {
        let a = Array2::<f64>::eye(2);
        assert_eq!(check_shapes(None, a.view(), Array2::zeros((0, 2)).view()), Err(HmmError::EmptySequence));
        assert!(check_shapes(None, a.view(), Array2::zeros((3, 3)).view()).is_err());
        assert!(check_shapes(Some(array![1.0].view()), a.view(), Array2::zeros((3, 2)).view()).is_err());
        assert!(check_shapes(Some(array![0.5, 0.5].view()), a.view(), Array2::zeros((3, 2)).view()).is_ok());
    }
}
