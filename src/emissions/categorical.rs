use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::distributions::WeightedIndex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use super::{as_index, weight_total, EmissionModel};
use crate::errors::{HmmError, Result};

/// Discrete distribution over the categories `0..probs.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CategoricalParams")]
pub struct Categorical {
    probs: Array1<f64>,
}

#[derive(Deserialize)]
struct CategoricalParams {
    probs: Array1<f64>,
}

impl TryFrom<CategoricalParams> for Categorical {
    type Error = HmmError;

    fn try_from(params: CategoricalParams) -> Result<Self> {
        Categorical::new(params.probs)
    }
}

impl Categorical {
    pub fn new(probs: Array1<f64>) -> Result<Self> {
        if probs.is_empty() || probs.iter().any(|p| !(*p >= 0.0)) {
            return Err(HmmError::InvalidModel(String::from("categorical probabilities must be non-negative")));
        }
        if (probs.sum() - 1.0).abs() > 1e-6 {
            return Err(HmmError::InvalidModel(format!(
                "categorical probabilities sum to {}",
                probs.sum()
            )));
        }
        Ok(Self { probs })
    }

    pub fn probs(&self) -> &Array1<f64> {
        &self.probs
    }

    pub fn ncategories(&self) -> usize {
        self.probs.len()
    }

    fn prob(&self, x: f64) -> f64 {
        match as_index(x) {
            Some(i) if i < self.probs.len() => self.probs[i],
            _ => 0.0,
        }
    }
}

impl EmissionModel for Categorical {
    fn dimension(&self) -> usize {
        1
    }

    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64 {
        self.prob(x[0]).ln()
    }

    fn likelihood(&self, x: ArrayView1<f64>) -> f64 {
        self.prob(x[0])
    }

    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self> {
        let mut counts = Array1::<f64>::zeros(self.probs.len());
        for (x, w) in observations.column(0).iter().zip(weights.iter()) {
            if let Some(i) = as_index(*x).filter(|i| *i < counts.len()) {
                counts[i] += w;
            }
        }
        weight_total(observations, weights)?;
        // Mass on values outside the support is dropped.
        let total = counts.sum();
        if !(total > 0.0) {
            return Err(HmmError::DegenerateWeights { state: None });
        }
        Categorical::new(counts / total)
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        let dist = WeightedIndex::new(self.probs.iter())
            .map_err(|e| HmmError::InvalidModel(format!("cannot sample categorical: {}", e)))?;
        Ok(Array1::from_elem(1, rng.sample(dist) as f64))
    }
}
