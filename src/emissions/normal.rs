use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::f64::consts::PI;

use super::{weight_total, EmissionModel};
use crate::errors::{HmmError, Result};

/// Lower bound on a re-estimated variance, keeps a state from collapsing on a
/// single observation.
pub const MIN_VARIANCE: f64 = 1e-6;

/// Univariate Gaussian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NormalParams")]
pub struct Normal {
    mean: f64,
    std: f64,
}

#[derive(Deserialize)]
struct NormalParams {
    mean: f64,
    std: f64,
}

impl TryFrom<NormalParams> for Normal {
    type Error = HmmError;

    fn try_from(params: NormalParams) -> Result<Self> {
        Normal::new(params.mean, params.std)
    }
}

impl Normal {
    pub fn new(mean: f64, std: f64) -> Result<Self> {
        if !mean.is_finite() || !(std > 0.0) || !std.is_finite() {
            return Err(HmmError::InvalidModel(format!("invalid normal parameters ({}, {})", mean, std)));
        }
        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }
}

impl EmissionModel for Normal {
    fn dimension(&self) -> usize {
        1
    }

    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64 {
        let z = (x[0] - self.mean) / self.std;
        -0.5 * (2.0 * PI).ln() - self.std.ln() - 0.5 * z * z
    }

    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self> {
        let total = weight_total(observations, weights)?;
        let values = observations.column(0);
        let mean = values.dot(&weights) / total;
        let var = values
            .iter()
            .zip(weights.iter())
            .map(|(x, w)| w * (x - mean) * (x - mean))
            .sum::<f64>()
            / total;
        Normal::new(mean, var.max(MIN_VARIANCE).sqrt())
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        let z: f64 = rng.sample(StandardNormal);
        Ok(Array1::from_elem(1, self.mean + self.std * z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_bad_std() {
        assert!(Normal::new(0.0, 0.0).is_err());
        assert!(Normal::new(0.0, -1.0).is_err());
        assert!(Normal::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn density_can_exceed_one() {
        let d = Normal::new(0.0, 0.1).unwrap();
        assert!(d.log_likelihood(array![0.0].view()) > 0.0);
        assert!(d.likelihood(array![0.0].view()) > 1.0);
    }

    #[test]
    fn weighted_fit() {
        let obs = Array2::from_shape_vec((4, 1), vec![1.0, 3.0, 100.0, -50.0]).unwrap();
        let w = array![1.0, 1.0, 0.0, 0.0];
        let d = Normal::new(0.0, 1.0).unwrap().reestimate(obs.view(), w.view()).unwrap();
        assert_abs_diff_eq!(d.mean(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.std(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn variance_is_floored() {
        let obs = Array2::from_shape_vec((2, 1), vec![5.0, 5.0]).unwrap();
        let w = array![0.5, 0.5];
        let d = Normal::new(0.0, 1.0).unwrap().reestimate(obs.view(), w.view()).unwrap();
        assert_abs_diff_eq!(d.std(), MIN_VARIANCE.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn degenerate() {
        let obs = Array2::from_shape_vec((2, 1), vec![5.0, 6.0]).unwrap();
        let w = array![0.0, 0.0];
        let res = Normal::new(0.0, 1.0).unwrap().reestimate(obs.view(), w.view());
        assert_eq!(res, Err(HmmError::DegenerateWeights { state: None }));
    }

    #[test]
    fn samples_around_mean() {
        let d = Normal::new(10.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 2000;
        let mean = (0..n).map(|_| d.sample(&mut rng).unwrap()[0]).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.2);
    }

    #[test]
    fn deserializing_checks_std() {
        assert_eq!(serde_json::from_str::<Normal>(r#"{"mean":1.0,"std":2.0}"#).unwrap(), Normal::new(1.0, 2.0).unwrap());
        assert!(serde_json::from_str::<Normal>(r#"{"mean":1.0,"std":-2.0}"#).is_err());
    }
}
