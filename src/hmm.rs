use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::emissions::{Emission, EmissionModel};
use crate::errors::{HmmError, Result};

/// Tolerance on the sum of a probability vector.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Hidden Markov model: initial distribution `pi`, transition matrix `a`
/// (row = current state) and one emission model per state in `b`.
///
/// A value of this type always satisfies the shape and stochasticity
/// invariants checked by [`HMM::validate`]; it is replaced, never mutated,
/// when parameters are re-estimated. Deserialization goes through
/// [`HMM::new`] as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HmmParams<E>", bound(deserialize = "E: EmissionModel + Deserialize<'de>"))]
pub struct HMM<E = Emission> {
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Vec<E>,
}

/// Unchecked parameters as they appear in a serialized model.
#[derive(Deserialize)]
struct HmmParams<E> {
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Vec<E>,
}

impl<E: EmissionModel> TryFrom<HmmParams<E>> for HMM<E> {
    type Error = HmmError;

    fn try_from(params: HmmParams<E>) -> Result<Self> {
        HMM::new(params.pi, params.a, params.b)
    }
}

impl<E: EmissionModel> HMM<E> {

    /// Builds a model from its initial distribution, transition matrix and
    /// emission models, failing with [`HmmError::InvalidModel`] when they do
    /// not pass [`HMM::validate`].
    pub fn new(pi: Array1<f64>, a: Array2<f64>, b: Vec<E>) -> Result<Self> {
        let hmm = Self { pi, a, b };
        hmm.validate()?;
        Ok(hmm)
    }

    /// Builds a model whose initial distribution is uniform over the states.
    pub fn with_uniform_init(a: Array2<f64>, b: Vec<E>) -> Result<Self> {
        let nstates = a.nrows();
        if nstates == 0 {
            return Err(HmmError::InvalidModel(String::from("a model needs at least one state")));
        }
        let pi = Array1::from_elem(nstates, 1.0 / nstates as f64);
        Self::new(pi, a, b)
    }

    fn check_row_sum(row: ArrayView1<f64>) -> bool {
        let d = row.sum() - 1.0;
        d.abs() <= SUM_TOLERANCE && row.iter().all(|p| *p >= 0.0 && p.is_finite())
    }

    /// Fails with [`HmmError::InvalidModel`] unless `pi` and every row of `a`
    /// are probability vectors, all shapes agree on the number of states and
    /// every emission model has the same dimension.
    pub fn validate(&self) -> Result<()> {
        let nstates = self.pi.len();
        if nstates == 0 {
            return Err(HmmError::InvalidModel(String::from("a model needs at least one state")));
        }
        if self.a.nrows() != self.a.ncols() {
            return Err(HmmError::InvalidModel(format!(
                "transition matrix is not square ({}x{})",
                self.a.nrows(),
                self.a.ncols()
            )));
        }
        if self.a.nrows() != nstates || self.b.len() != nstates {
            return Err(HmmError::InvalidModel(format!(
                "{} initial probabilities, {} transition rows and {} emission models",
                nstates,
                self.a.nrows(),
                self.b.len()
            )));
        }
        if !Self::check_row_sum(self.pi.view()) {
            return Err(HmmError::InvalidModel(format!(
                "initial distribution is not a probability vector (sum {})",
                self.pi.sum()
            )));
        }
        for (state, row) in self.a.rows().into_iter().enumerate() {
            if !Self::check_row_sum(row) {
                return Err(HmmError::InvalidModel(format!(
                    "transition row {} is not a probability vector (sum {})",
                    state,
                    row.sum()
                )));
            }
        }
        let dim = self.b[0].dimension();
        if let Some(state) = self.b.iter().position(|e| e.dimension() != dim) {
            return Err(HmmError::InvalidModel(format!(
                "emission model {} has dimension {}, expected {}",
                state,
                self.b[state].dimension(),
                dim
            )));
        }
        Ok(())
    }

    pub fn nstates(&self) -> usize {
        self.pi.len()
    }

    /// Dimension of a single observation.
    pub fn dimension(&self) -> usize {
        self.b[0].dimension()
    }

    /// `(number of states, observation dimension)`.
    pub fn size(&self) -> (usize, usize) {
        (self.nstates(), self.dimension())
    }

    pub fn pi(&self) -> &Array1<f64> {
        &self.pi
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn b(&self) -> &[E] {
        &self.b
    }

    pub fn emission(&self, state: usize) -> &E {
        &self.b[state]
    }

    pub fn into_parts(self) -> (Array1<f64>, Array2<f64>, Vec<E>) {
        (self.pi, self.a, self.b)
    }
}
