/// Broad failure class of an [`Error`].
///
/// Every variant of [`Error`] belongs to exactly one class. Callers that only
/// care whether a failure came from bad configuration, a collapsed belief,
/// a numerical guard, or an exhausted sampler can match on this instead of
/// the individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or inconsistent construction arguments.
    Configuration,
    /// A probability distribution lost all of its mass.
    DegenerateDistribution,
    /// A computation was refused because it would divide by zero or produce NaN.
    NumericalGuard,
    /// Rejection sampling ran out of attempts.
    SamplingExhaustion,
}

/// Errors returned by estimator, belief and surrogate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when required construction arguments are missing or conflict.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Returned when a finite support and its probability vector disagree,
    /// or the probabilities are negative, non-finite, or sum to zero.
    #[error("invalid probabilities: {0}")]
    InvalidProbabilities(String),

    /// Returned when a vector has the wrong length for its role.
    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being checked.
        context: &'static str,
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// Returned when the surrogate has no observed outcomes to improve upon.
    #[error("surrogate has no observed outcomes")]
    NoObservedOutcomes,

    /// Returned when preference evidence rules out every hypothesis of a
    /// finite support. The belief is left as it was before the update.
    #[error(
        "preference evidence is inconsistent with every support hypothesis \
         ({n_records} records already accepted)"
    )]
    DegenerateDistribution {
        /// Number of preference records in the log when the update failed.
        n_records: usize,
    },

    /// Returned when the surrogate reports zero hyperparameter samples.
    #[error("no posterior samples available")]
    NoPosteriorSamples,

    /// Returned when the gradient needs to divide by a zero posterior
    /// standard deviation at a point whose variance gradient is non-zero.
    #[error("zero posterior standard deviation at point {point}, attribute {attribute}")]
    ZeroStandardDeviation {
        /// Index of the candidate point in the batch.
        point: usize,
        /// Index of the outcome attribute.
        attribute: usize,
    },

    /// Returned when the surrogate produces NaN or infinite moments.
    #[error("surrogate returned non-finite moments at point {point}")]
    NonFiniteMoments {
        /// Index of the candidate point in the batch.
        point: usize,
    },

    /// Returned when a GP kernel matrix is not positive definite.
    #[cfg(feature = "gp")]
    #[error("cholesky decomposition failed for hyperparameter sample {0}")]
    CholeskyFailed(usize),

    /// Returned when rejection sampling cannot gather enough parameters
    /// consistent with the recorded preferences.
    #[error(
        "preference evidence is infeasible or acceptance rate too low: \
         accepted {accepted} of {requested} samples after {attempts} attempts"
    )]
    SamplingExhausted {
        /// Number of samples requested.
        requested: usize,
        /// Number of samples accepted before giving up.
        accepted: usize,
        /// Number of prior draws made.
        attempts: usize,
    },
}

impl Error {
    /// Returns the broad failure class this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_)
            | Self::InvalidProbabilities(_)
            | Self::DimensionMismatch { .. }
            | Self::NoObservedOutcomes => ErrorCategory::Configuration,
            Self::DegenerateDistribution { .. } => ErrorCategory::DegenerateDistribution,
            Self::NoPosteriorSamples
            | Self::ZeroStandardDeviation { .. }
            | Self::NonFiniteMoments { .. } => ErrorCategory::NumericalGuard,
            #[cfg(feature = "gp")]
            Self::CholeskyFailed(_) => ErrorCategory::NumericalGuard,
            Self::SamplingExhausted { .. } => ErrorCategory::SamplingExhaustion,
        }
    }
}

/// A `Result` alias where the error type is [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
