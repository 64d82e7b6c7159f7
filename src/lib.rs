//! Hidden Markov models with arbitrary emission models.
//!
//! ```
//! use hmmbase::{forward_backward, viterbi, HMM};
//! use hmmbase::emissions::{Emission, Normal};
//! use ndarray::array;
//!
//! let b: Vec<Emission> = vec![Normal::new(0.0, 1.0)?.into(), Normal::new(10.0, 1.0)?.into()];
//! let hmm = HMM::new(array![0.6, 0.4], array![[0.7, 0.3], [0.4, 0.6]], b)?;
//! let observations = array![[0.1], [9.8], [0.3]];
//!
//! let path = viterbi(&hmm, observations.view())?;
//! assert_eq!(path, array![0, 1, 0]);
//! let (gammas, log_likelihood) = forward_backward(&hmm, observations.view())?;
//! assert_eq!(gammas.dim(), (3, 2));
//! assert!(log_likelihood.is_finite());
//! # Ok::<(), hmmbase::HmmError>(())
//! ```
//!
//! Observations are the rows of a `T x D` matrix. Inference runs in log space
//! by default; the `*_plain` variants work with probabilities and are only
//! suitable for short sequences.

pub mod emissions;
pub mod errors;
pub mod hmm;
pub mod inference;
pub mod sampling;

pub use crate::emissions::{Emission, EmissionModel};
pub use crate::errors::{HmmError, Result};
pub use crate::hmm::HMM;
pub use crate::inference::likelihoods::{likelihoods, log_likelihoods};
pub use crate::inference::messages::{
    backward_messages, forward_backward, forward_backward_plain, forward_messages, messages_backwards,
    messages_backwards_log, messages_forwards, messages_forwards_log, posteriors, posteriors_log,
};
pub use crate::inference::mle::{fit, fit_with, mle_step, FitOptions, FitResult, FitState};
pub use crate::inference::viterbi::{viterbi, viterbi_plain, viterbi_with_log_prob};
pub use crate::sampling::{sample_observations, sample_path, sample_path_from};
