use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use statrs::function::factorial::ln_factorial;

use super::{as_index, weight_total, EmissionModel};
use crate::errors::{HmmError, Result};

/// Smallest rate kept after re-estimation, all-zero counts would otherwise give
/// a rate of 0.
pub const MIN_RATE: f64 = 1e-8;

/// Poisson distribution over counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PoissonParams")]
pub struct Poisson {
    rate: f64,
}

#[derive(Deserialize)]
struct PoissonParams {
    rate: f64,
}

impl TryFrom<PoissonParams> for Poisson {
    type Error = HmmError;

    fn try_from(params: PoissonParams) -> Result<Self> {
        Poisson::new(params.rate)
    }
}

impl Poisson {
    pub fn new(rate: f64) -> Result<Self> {
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(HmmError::InvalidModel(format!("invalid poisson rate {}", rate)));
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl EmissionModel for Poisson {
    fn dimension(&self) -> usize {
        1
    }

    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64 {
        match as_index(x[0]) {
            Some(k) => k as f64 * self.rate.ln() - self.rate - ln_factorial(k as u64),
            None => f64::NEG_INFINITY,
        }
    }

    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self> {
        let total = weight_total(observations, weights)?;
        let rate = observations.column(0).dot(&weights) / total;
        Poisson::new(rate.max(MIN_RATE))
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        let dist = rand_distr::Poisson::new(self.rate)
            .map_err(|e| HmmError::InvalidModel(format!("cannot sample poisson: {}", e)))?;
        let k: f64 = rng.sample(dist);
        Ok(Array1::from_elem(1, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn pmf() {
        let d = Poisson::new(2.0).unwrap();
        assert_abs_diff_eq!(d.likelihood(array![0.0].view()), (-2.0f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(d.likelihood(array![3.0].view()), 8.0 / 6.0 * (-2.0f64).exp(), epsilon = 1e-12);
        assert_eq!(d.likelihood(array![1.5].view()), 0.0);
    }

    #[test]
    fn weighted_rate() {
        let obs = Array2::from_shape_vec((3, 1), vec![2.0, 4.0, 100.0]).unwrap();
        let w = array![0.5, 0.5, 0.0];
        let d = Poisson::new(1.0).unwrap().reestimate(obs.view(), w.view()).unwrap();
        assert_abs_diff_eq!(d.rate(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn all_zero_counts_keep_a_positive_rate() {
        let obs = Array2::zeros((3, 1));
        let w = array![1.0, 1.0, 1.0];
        let d = Poisson::new(1.0).unwrap().reestimate(obs.view(), w.view()).unwrap();
        assert_eq!(d.rate(), MIN_RATE);
    }

    #[test]
    fn deserializing_checks_rate() {
        assert!(serde_json::from_str::<Poisson>(r#"{"rate":0.0}"#).is_err());
    }
}
