//! Random trajectories from a model.

use ndarray::{Array1, Array2, ArrayView1};
use rand::distributions::WeightedIndex;
use rand::Rng;

use crate::emissions::EmissionModel;
use crate::errors::{HmmError, Result};
use crate::hmm::HMM;

fn weighted(probs: ArrayView1<f64>) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(probs.iter()).map_err(|e| HmmError::InvalidModel(format!("cannot sample from {}: {}", probs, e)))
}

/// Draws a state sequence of length `len`, the first state taken from the
/// initial distribution, and one observation per state.
pub fn sample_path<E: EmissionModel, R: Rng + ?Sized>(hmm: &HMM<E>, len: usize, rng: &mut R) -> Result<(Array1<usize>, Array2<f64>)> {
    let initial_state = rng.sample(weighted(hmm.pi().view())?);
    sample_path_from(hmm, len, initial_state, rng)
}

/// [`sample_path`] starting from a fixed `initial_state`.
pub fn sample_path_from<E: EmissionModel, R: Rng + ?Sized>(
    hmm: &HMM<E>,
    len: usize,
    initial_state: usize,
    rng: &mut R,
) -> Result<(Array1<usize>, Array2<f64>)> {
    if len == 0 {
        return Err(HmmError::EmptySequence);
    }
    if initial_state >= hmm.nstates() {
        return Err(HmmError::InvalidModel(format!(
            "initial state {} for a model with {} states",
            initial_state,
            hmm.nstates()
        )));
    }
    let transitions = hmm
        .a()
        .rows()
        .into_iter()
        .map(weighted)
        .collect::<Result<Vec<_>>>()?;

    let mut states = Array1::zeros(len);
    states[0] = initial_state;
    for t in 1..len {
        states[t] = rng.sample(&transitions[states[t - 1]]);
    }
    let observations = sample_observations(hmm, states.view(), rng)?;
    Ok((states, observations))
}

/// Draws one observation per entry of `states`.
pub fn sample_observations<E: EmissionModel, R: Rng + ?Sized>(hmm: &HMM<E>, states: ArrayView1<usize>, rng: &mut R) -> Result<Array2<f64>> {
    let mut observations = Array2::zeros((states.len(), hmm.dimension()));
    for (mut row, &state) in observations.rows_mut().into_iter().zip(states.iter()) {
        if state >= hmm.nstates() {
            return Err(HmmError::InvalidModel(format!("state {} out of range", state)));
        }
        row.assign(&hmm.emission(state).sample(rng)?);
    }
    Ok(observations)
}
