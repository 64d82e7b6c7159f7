use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::f64::consts::PI;

use super::normal::MIN_VARIANCE;
use super::{weight_total, EmissionModel};
use crate::errors::{HmmError, Result};

/// Multivariate Gaussian with a diagonal covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DiagNormalParams")]
pub struct DiagNormal {
    means: Array1<f64>,
    stds: Array1<f64>,
}

#[derive(Deserialize)]
struct DiagNormalParams {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl TryFrom<DiagNormalParams> for DiagNormal {
    type Error = HmmError;

    fn try_from(params: DiagNormalParams) -> Result<Self> {
        DiagNormal::new(params.means, params.stds)
    }
}

impl DiagNormal {
    pub fn new(means: Array1<f64>, stds: Array1<f64>) -> Result<Self> {
        if means.is_empty() || means.len() != stds.len() {
            return Err(HmmError::InvalidModel(format!(
                "diagonal normal needs as many stds as means ({} vs {})",
                means.len(),
                stds.len()
            )));
        }
        if means.iter().any(|m| !m.is_finite()) || stds.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
            return Err(HmmError::InvalidModel(String::from("diagonal normal parameters must be finite, stds positive")));
        }
        Ok(Self { means, stds })
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn stds(&self) -> &Array1<f64> {
        &self.stds
    }
}

impl EmissionModel for DiagNormal {
    fn dimension(&self) -> usize {
        self.means.len()
    }

    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64 {
        let mut ll = -0.5 * self.dimension() as f64 * (2.0 * PI).ln();
        Zip::from(&x).and(&self.means).and(&self.stds).for_each(|&v, &m, &s| {
            let z = (v - m) / s;
            ll -= s.ln() + 0.5 * z * z;
        });
        ll
    }

    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self> {
        let total = weight_total(observations, weights)?;
        let means = observations.t().dot(&weights) / total;
        let mut vars = Array1::<f64>::zeros(means.len());
        for (row, w) in observations.rows().into_iter().zip(weights.iter()) {
            let diff = &row - &means;
            vars.scaled_add(*w, &(&diff * &diff));
        }
        let stds = vars.mapv(|v| (v / total).max(MIN_VARIANCE).sqrt());
        DiagNormal::new(means, stds)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        Ok(Zip::from(&self.means).and(&self.stds).map_collect(|&m, &s| {
            let z: f64 = rng.sample(StandardNormal);
            m + s * z
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(DiagNormal::new(array![0.0, 1.0], array![1.0]).is_err());
        assert!(DiagNormal::new(Array1::zeros(0), Array1::zeros(0)).is_err());
        assert!(DiagNormal::new(array![0.0], array![0.0]).is_err());
    }

    #[test]
    fn matches_product_of_normals() {
        let d = DiagNormal::new(array![0.0, 5.0], array![1.0, 2.0]).unwrap();
        let a = super::super::Normal::new(0.0, 1.0).unwrap();
        let b = super::super::Normal::new(5.0, 2.0).unwrap();
        let x = array![0.3, 4.0];
        let expected = a.log_likelihood(x.slice(ndarray::s![0..1])) + b.log_likelihood(x.slice(ndarray::s![1..2]));
        assert_abs_diff_eq!(d.log_likelihood(x.view()), expected, epsilon = 1e-12);
    }

    #[test]
    fn weighted_fit() {
        let obs = Array2::from_shape_vec((3, 2), vec![0.0, 1.0, 2.0, 3.0, 50.0, 50.0]).unwrap();
        let w = array![1.0, 1.0, 0.0];
        let d = DiagNormal::new(array![0.0, 0.0], array![1.0, 1.0])
            .unwrap()
            .reestimate(obs.view(), w.view())
            .unwrap();
        assert_abs_diff_eq!(d.means()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.means()[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.stds()[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.stds()[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn deserializing_checks_lengths() {
        let ok = r#"{"means":{"v":1,"dim":[2],"data":[0.0,1.0]},"stds":{"v":1,"dim":[2],"data":[1.0,2.0]}}"#;
        assert_eq!(serde_json::from_str::<DiagNormal>(ok).unwrap().dimension(), 2);
        let mismatched = r#"{"means":{"v":1,"dim":[2],"data":[0.0,1.0]},"stds":{"v":1,"dim":[1],"data":[1.0]}}"#;
        let err = serde_json::from_str::<DiagNormal>(mismatched).unwrap_err();
        assert!(err.to_string().contains("as many stds as means"));
    }
}
