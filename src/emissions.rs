//! Per-state observation models.
//!
//! The inference engine only talks to [`EmissionModel`]. Observations are rows
//! of a `T x D` matrix: scalar families use `D = 1`, and discrete families
//! (categories, counts) read the integer value stored in the single column.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{HmmError, Result};

pub mod categorical;
pub mod diag_normal;
pub mod normal;
pub mod poisson;

pub use categorical::Categorical;
pub use diag_normal::DiagNormal;
pub use normal::Normal;
pub use poisson::Poisson;

/// Capability set required from the observation model of a state.
pub trait EmissionModel: Clone + Send + Sync {
    /// Size of a single observation (1 for univariate models).
    fn dimension(&self) -> usize;

    /// Log density (or log mass) of `x`.
    ///
    /// Continuous densities can exceed 1, so this value can be positive. It is
    /// never clamped. The caller guarantees `x.len() == self.dimension()`.
    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64;

    fn likelihood(&self, x: ArrayView1<f64>) -> f64 {
        self.log_likelihood(x).exp()
    }

    /// Weighted maximum likelihood fit, `weights[t]` being the responsibility of
    /// this state for row `t` of `observations`.
    ///
    /// Returns [`HmmError::DegenerateWeights`] when the weights carry no mass.
    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self>;

    /// Draw one observation.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>>;
}

/// Total responsibility mass, rejecting weights that cannot support a fit.
pub(crate) fn weight_total(observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<f64> {
    if observations.nrows() != weights.len() {
        return Err(HmmError::InvalidModel(format!(
            "{} observations but {} weights",
            observations.nrows(),
            weights.len()
        )));
    }
    let total = weights.sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(HmmError::DegenerateWeights { state: None });
    }
    Ok(total)
}

/// Reads a discrete observation, `None` when it is not a non-negative integer.
pub(crate) fn as_index(value: f64) -> Option<usize> {
    // `as` saturates, anything at or past usize::MAX would be clamped
    if value >= 0.0 && value.fract() == 0.0 && value < usize::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

/// Closed set of the shipped families, so that states of one model can mix
/// families without boxing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Emission {
    Normal(Normal),
    DiagNormal(DiagNormal),
    Categorical(Categorical),
    Poisson(Poisson),
}

impl EmissionModel for Emission {
    fn dimension(&self) -> usize {
        match self {
            Emission::Normal(d) => d.dimension(),
            Emission::DiagNormal(d) => d.dimension(),
            Emission::Categorical(d) => d.dimension(),
            Emission::Poisson(d) => d.dimension(),
        }
    }

    fn log_likelihood(&self, x: ArrayView1<f64>) -> f64 {
        match self {
            Emission::Normal(d) => d.log_likelihood(x),
            Emission::DiagNormal(d) => d.log_likelihood(x),
            Emission::Categorical(d) => d.log_likelihood(x),
            Emission::Poisson(d) => d.log_likelihood(x),
        }
    }

    fn likelihood(&self, x: ArrayView1<f64>) -> f64 {
        match self {
            Emission::Normal(d) => d.likelihood(x),
            Emission::DiagNormal(d) => d.likelihood(x),
            Emission::Categorical(d) => d.likelihood(x),
            Emission::Poisson(d) => d.likelihood(x),
        }
    }

    fn reestimate(&self, observations: ArrayView2<f64>, weights: ArrayView1<f64>) -> Result<Self> {
        Ok(match self {
            Emission::Normal(d) => Emission::Normal(d.reestimate(observations, weights)?),
            Emission::DiagNormal(d) => Emission::DiagNormal(d.reestimate(observations, weights)?),
            Emission::Categorical(d) => Emission::Categorical(d.reestimate(observations, weights)?),
            Emission::Poisson(d) => Emission::Poisson(d.reestimate(observations, weights)?),
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        match self {
            Emission::Normal(d) => d.sample(rng),
            Emission::DiagNormal(d) => d.sample(rng),
            Emission::Categorical(d) => d.sample(rng),
            Emission::Poisson(d) => d.sample(rng),
        }
    }
}

impl From<Normal> for Emission {
    fn from(d: Normal) -> Self {
        Emission::Normal(d)
    }
}

impl From<DiagNormal> for Emission {
    fn from(d: DiagNormal) -> Self {
        Emission::DiagNormal(d)
    }
}

impl From<Categorical> for Emission {
    fn from(d: Categorical) -> Self {
        Emission::Categorical(d)
    }
}

impl From<Poisson> for Emission {
    fn from(d: Poisson) -> Self {
        Emission::Poisson(d)
    }
}
