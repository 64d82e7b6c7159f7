//! Inference over a fixed [`HMM`](crate::hmm::HMM): likelihood matrices,
//! forward-backward messages, Viterbi decoding and Baum-Welch re-estimation.
//!
//! Every call allocates its own buffers, so a model can be shared read-only
//! between threads decoding different sequences.

pub mod likelihoods;
pub mod messages;
pub mod mle;
pub mod utils;
pub mod viterbi;
