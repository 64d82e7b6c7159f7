use thiserror::Error;

/// Result alias for every fallible inference operation.
pub type Result<T> = std::result::Result<T, HmmError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HmmError {
    /// An observation does not have the size expected by an emission model.
    #[error("dimension mismatch for state {state}: model expects {expected}, observation has {found}")]
    DimensionMismatch {
        state: usize,
        expected: usize,
        found: usize,
    },

    /// The model parameters do not describe a valid HMM.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// An emission model was asked to fit all-zero responsibilities.
    #[error("degenerate weights{}", match .state { Some(s) => format!(" for state {}", s), None => String::new() })]
    DegenerateWeights { state: Option<usize> },

    /// A likelihood or log-likelihood that should be finite is not.
    #[error("numeric instability: {0}")]
    NumericInstability(String),

    #[error("empty observation sequence")]
    EmptySequence,
}

impl HmmError {
    /// Attach the state index to a `DegenerateWeights` raised by an emission model.
    pub fn for_state(self, state: usize) -> Self {
        match self {
            HmmError::DegenerateWeights { state: None } => HmmError::DegenerateWeights { state: Some(state) },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_weights_gets_state() {
        let err = HmmError::DegenerateWeights { state: None }.for_state(2);
        assert_eq!(err, HmmError::DegenerateWeights { state: Some(2) });
        assert_eq!(err.to_string(), "degenerate weights for state 2");
    }

    #[test]
    fn other_errors_are_untouched() {
        let err = HmmError::EmptySequence.for_state(1);
        assert_eq!(err, HmmError::EmptySequence);
    }
}
