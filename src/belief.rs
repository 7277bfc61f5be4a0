//! Belief over the unknown utility parameter, conditioned on pairwise preferences.
//!
//! A [`UtilityBelief`] is specified in one of two ways:
//!
//! - **Finite support**: an explicit list of parameter hypotheses with prior
//!   probabilities. Each preference record removes the hypotheses whose induced
//!   preference disagrees with it, and the remaining probabilities are
//!   renormalized. Small supports (fewer than 20 hypotheses by default) are
//!   integrated exactly by the acquisition estimator ("full-support mode").
//! - **Prior generator**: a closure drawing parameters from the prior.
//!   Posterior samples are obtained by rejection: prior draws are kept only
//!   if they reproduce every recorded preference.
//!
//! # Examples
//!
//! ```
//! use uei::belief::UtilityBelief;
//! use uei::utility::LinearUtility;
//! use uei::{Preference, PreferenceRecord};
//!
//! let mut belief = UtilityBelief::builder()
//!     .finite_support(
//!         vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
//!         vec![0.2, 0.3, 0.5],
//!     )
//!     .utility(LinearUtility)
//!     .build()
//!     .unwrap();
//! assert!(belief.use_full_support());
//!
//! // The decision maker prefers attribute 0.
//! belief
//!     .add_preference(PreferenceRecord::new(vec![1.0, 0.0], vec![0.0, 1.0], Preference::First))
//!     .unwrap();
//! assert_eq!(belief.support().unwrap(), &[vec![1.0, 0.0]]);
//! assert_eq!(belief.probabilities().unwrap(), &[1.0]);
//! ```

use std::sync::Arc;

use crate::elicitation::ElicitationStrategy;
use crate::error::{Error, Result};
use crate::preference::{PreferenceRecord, encode_preference};
use crate::rng_util;
use crate::utility::UtilityFunction;

/// Supports with fewer hypotheses than this are integrated exactly.
const DEFAULT_FULL_SUPPORT_THRESHOLD: usize = 20;
/// Default budget of prior draws for one call to [`UtilityBelief::sample`].
const DEFAULT_MAX_REJECTION_ATTEMPTS: usize = 10_000;

/// Draws `n` parameter vectors from the prior.
pub type PriorGenerator = Arc<dyn Fn(usize, &mut fastrand::Rng) -> Vec<Vec<f64>> + Send + Sync>;

/// Parameter hypotheses with their probabilities.
#[derive(Clone, Debug, PartialEq)]
struct WeightedSupport {
    parameters: Vec<Vec<f64>>,
    probabilities: Vec<f64>,
}

impl WeightedSupport {
    /// Keep the hypotheses selected by `keep` and renormalize.
    ///
    /// Returns `None` when nothing with positive mass survives.
    fn filtered(&self, mut keep: impl FnMut(&[f64]) -> bool) -> Option<Self> {
        let mut parameters = Vec::new();
        let mut probabilities = Vec::new();
        for (param, &p) in self.parameters.iter().zip(&self.probabilities) {
            if keep(param.as_slice()) {
                parameters.push(param.clone());
                probabilities.push(p);
            }
        }
        let total: f64 = probabilities.iter().sum();
        if parameters.is_empty() || total <= 0.0 {
            return None;
        }
        for p in &mut probabilities {
            *p /= total;
        }
        Some(Self {
            parameters,
            probabilities,
        })
    }

    fn sample(&self, n: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
        (0..n)
            .map(|_| self.parameters[rng_util::categorical(rng, &self.probabilities)].clone())
            .collect()
    }
}

/// The two ways a parameter distribution can be represented.
#[derive(Clone)]
enum Support {
    Finite {
        /// The support as constructed; used for prior sampling.
        prior: WeightedSupport,
        /// The support narrowed by the preference log.
        current: WeightedSupport,
    },
    Generated {
        generator: PriorGenerator,
    },
}

/// Distribution over the utility parameter, narrowed by preference evidence.
///
/// Construct with [`UtilityBelief::builder`].
#[derive(Clone)]
pub struct UtilityBelief {
    support: Support,
    utility: Arc<dyn UtilityFunction>,
    elicitation: Option<Arc<dyn ElicitationStrategy>>,
    preferences: Vec<PreferenceRecord>,
    use_full_support: bool,
    max_rejection_attempts: usize,
}

impl core::fmt::Debug for UtilityBelief {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("UtilityBelief");
        match &self.support {
            Support::Finite { current, .. } => {
                s.field("support", &current.parameters);
                s.field("probabilities", &current.probabilities);
            }
            Support::Generated { .. } => {
                s.field("support", &"<generator>");
            }
        }
        s.field("n_preferences", &self.preferences.len())
            .field("use_full_support", &self.use_full_support)
            .finish_non_exhaustive()
    }
}

impl UtilityBelief {
    /// Creates a builder for configuring a `UtilityBelief`.
    #[must_use]
    pub fn builder() -> UtilityBeliefBuilder {
        UtilityBeliefBuilder::new()
    }

    /// Whether the acquisition estimator should integrate exactly over the support.
    #[must_use]
    pub fn use_full_support(&self) -> bool {
        self.use_full_support
    }

    /// Whether the belief has an explicit finite support.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        matches!(self.support, Support::Finite { .. })
    }

    /// The current (possibly narrowed) support, if finite.
    #[must_use]
    pub fn support(&self) -> Option<&[Vec<f64>]> {
        match &self.support {
            Support::Finite { current, .. } => Some(&current.parameters),
            Support::Generated { .. } => None,
        }
    }

    /// The current probabilities, parallel to [`support`](Self::support).
    #[must_use]
    pub fn probabilities(&self) -> Option<&[f64]> {
        match &self.support {
            Support::Finite { current, .. } => Some(&current.probabilities),
            Support::Generated { .. } => None,
        }
    }

    /// The prior probabilities over the original support.
    #[must_use]
    pub fn prior_probabilities(&self) -> Option<&[f64]> {
        match &self.support {
            Support::Finite { prior, .. } => Some(&prior.probabilities),
            Support::Generated { .. } => None,
        }
    }

    /// All preference records incorporated so far, oldest first.
    #[must_use]
    pub fn preferences(&self) -> &[PreferenceRecord] {
        &self.preferences
    }

    /// The parametric utility the belief is over.
    #[must_use]
    pub fn utility(&self) -> &Arc<dyn UtilityFunction> {
        &self.utility
    }

    /// Draw `n` parameters from the prior, ignoring all preference evidence.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if a prior generator returns the
    /// wrong number of samples.
    pub fn sample_from_prior(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Vec<Vec<f64>>> {
        match &self.support {
            Support::Finite { prior, .. } => Ok(prior.sample(n, rng)),
            Support::Generated { generator } => {
                let samples = generator(n, rng);
                if samples.len() != n {
                    return Err(Error::DimensionMismatch {
                        context: "prior generator output",
                        expected: n,
                        got: samples.len(),
                    });
                }
                Ok(samples)
            }
        }
    }

    /// Draw `n` parameters from the posterior given the preference log.
    ///
    /// For a finite support this is a categorical draw with the current
    /// probabilities. For a prior generator with evidence, prior draws are
    /// accepted one at a time if [`is_consistent`](Self::is_consistent).
    ///
    /// # Errors
    ///
    /// Returns `Error::SamplingExhausted` if rejection sampling makes
    /// `max_rejection_attempts` prior draws without accepting `n` of them.
    pub fn sample(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Vec<Vec<f64>>> {
        match &self.support {
            Support::Finite { current, .. } => Ok(current.sample(n, rng)),
            Support::Generated { .. } if self.preferences.is_empty() => {
                self.sample_from_prior(n, rng)
            }
            Support::Generated { .. } => self.rejection_sample(n, rng),
        }
    }

    fn rejection_sample(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Vec<Vec<f64>>> {
        let mut accepted = Vec::with_capacity(n);
        let mut attempts = 0;
        while accepted.len() < n {
            if attempts >= self.max_rejection_attempts {
                return Err(Error::SamplingExhausted {
                    requested: n,
                    accepted: accepted.len(),
                    attempts,
                });
            }
            attempts += 1;
            let Some(candidate) = self.sample_from_prior(1, rng)?.pop() else {
                continue;
            };
            if self.is_consistent(&candidate) {
                accepted.push(candidate);
            }
        }
        trace_debug!(
            requested = n,
            attempts,
            "rejection sampling gathered posterior samples"
        );
        Ok(accepted)
    }

    /// Whether `parameter` reproduces the label of every recorded preference.
    #[must_use]
    pub fn is_consistent(&self, parameter: &[f64]) -> bool {
        self.preferences
            .iter()
            .all(|record| self.agrees_with(parameter, record))
    }

    fn agrees_with(&self, parameter: &[f64], record: &PreferenceRecord) -> bool {
        let u1 = self.utility.evaluate(&record.first, parameter);
        let u2 = self.utility.evaluate(&record.second, parameter);
        encode_preference(u1, u2) == record.label
    }

    /// Incorporate an externally elicited preference record.
    ///
    /// For a finite support the hypotheses that disagree with `record` are
    /// removed and the rest renormalized.
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDistribution` if no hypothesis with positive
    /// probability agrees with `record`. The belief is left unchanged.
    pub fn add_preference(&mut self, record: PreferenceRecord) -> Result<()> {
        self.extend_preferences(vec![record])
    }

    /// Elicit `n_comparisons` preferences from a simulated decision maker.
    ///
    /// Each round the configured elicitation strategy proposes two outcomes
    /// from `observed`, `true_utility` labels them, and the record is
    /// incorporated as in [`add_preference`](Self::add_preference). All
    /// rounds succeed or none is applied.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no elicitation strategy was set,
    /// any error the strategy returns, and `Error::DegenerateDistribution` if
    /// the evidence empties a finite support.
    pub fn add_preference_information<F>(
        &mut self,
        true_utility: F,
        observed: &[Vec<f64>],
        n_comparisons: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<()>
    where
        F: Fn(&[f64]) -> f64,
    {
        let strategy = self.elicitation.clone().ok_or_else(|| {
            Error::Configuration("adding preference information requires an elicitation strategy".into())
        })?;
        let mut records = Vec::with_capacity(n_comparisons);
        for _ in 0..n_comparisons {
            let (first, second) = strategy.propose_pair(observed, rng)?;
            records.push(PreferenceRecord::label_with(first, second, &true_utility));
        }
        self.extend_preferences(records)
    }

    /// Apply `records` in order, committing only if every one of them leaves a
    /// non-empty support.
    fn extend_preferences(&mut self, records: Vec<PreferenceRecord>) -> Result<()> {
        if let Support::Finite { current, .. } = &self.support {
            let mut narrowed = current.clone();
            for (i, record) in records.iter().enumerate() {
                narrowed = narrowed
                    .filtered(|param| self.agrees_with(param, record))
                    .ok_or(Error::DegenerateDistribution {
                        n_records: self.preferences.len() + i,
                    })?;
            }
            trace_info!(
                n_records = records.len(),
                retained = narrowed.parameters.len(),
                total = current.parameters.len(),
                "utility support narrowed by preference evidence"
            );
            if let Support::Finite { current, .. } = &mut self.support {
                *current = narrowed;
            }
        }
        self.preferences.extend(records);
        Ok(())
    }
}

/// Builder for configuring a [`UtilityBelief`].
///
/// Exactly one of [`finite_support`](Self::finite_support) or
/// [`prior_generator`](Self::prior_generator) must be given, together with
/// the [`utility`](Self::utility) the parameter belongs to. Defaults:
/// - `use_full_support`: finite support with fewer than `full_support_threshold` hypotheses
/// - `full_support_threshold`: 20
/// - `max_rejection_attempts`: 10 000
/// - `elicitation`: none
#[derive(Clone, Default)]
pub struct UtilityBeliefBuilder {
    support: Option<(Vec<Vec<f64>>, Vec<f64>)>,
    generator: Option<PriorGenerator>,
    utility: Option<Arc<dyn UtilityFunction>>,
    elicitation: Option<Arc<dyn ElicitationStrategy>>,
    use_full_support: Option<bool>,
    full_support_threshold: Option<usize>,
    max_rejection_attempts: Option<usize>,
}

impl UtilityBeliefBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a finite support with prior probabilities.
    ///
    /// Probabilities are normalized by [`build`](Self::build).
    #[must_use]
    pub fn finite_support(mut self, parameters: Vec<Vec<f64>>, probabilities: Vec<f64>) -> Self {
        self.support = Some((parameters, probabilities));
        self
    }

    /// Sets a finite support with a uniform prior.
    #[must_use]
    pub fn uniform_support(self, parameters: Vec<Vec<f64>>) -> Self {
        let probabilities = vec![1.0; parameters.len()];
        self.finite_support(parameters, probabilities)
    }

    /// Sets a generator that draws `n` parameters from the prior.
    #[must_use]
    pub fn prior_generator<G>(mut self, generator: G) -> Self
    where
        G: Fn(usize, &mut fastrand::Rng) -> Vec<Vec<f64>> + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Sets the parametric utility used to interpret preference evidence.
    #[must_use]
    pub fn utility<U: UtilityFunction + 'static>(mut self, utility: U) -> Self {
        self.utility = Some(Arc::new(utility));
        self
    }

    /// Sets the strategy used by
    /// [`add_preference_information`](UtilityBelief::add_preference_information).
    #[must_use]
    pub fn elicitation<E: ElicitationStrategy + 'static>(mut self, strategy: E) -> Self {
        self.elicitation = Some(Arc::new(strategy));
        self
    }

    /// Forces full-support integration on or off.
    ///
    /// Full-support mode has no meaning for a prior generator, so `true` is
    /// rejected there by [`build`](Self::build).
    #[must_use]
    pub fn use_full_support(mut self, enabled: bool) -> Self {
        self.use_full_support = Some(enabled);
        self
    }

    /// Sets the support size below which full-support mode is the default.
    ///
    /// Default: 20.
    #[must_use]
    pub fn full_support_threshold(mut self, threshold: usize) -> Self {
        self.full_support_threshold = Some(threshold);
        self
    }

    /// Sets the number of prior draws allowed per call to
    /// [`sample`](UtilityBelief::sample) once preference evidence exists.
    ///
    /// Default: 10 000.
    #[must_use]
    pub fn max_rejection_attempts(mut self, attempts: usize) -> Self {
        self.max_rejection_attempts = Some(attempts);
        self
    }

    /// Builds the configured [`UtilityBelief`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if neither or both of a finite support
    /// and a prior generator were given, if no utility was given, or if full
    /// support is forced on a generator. Returns `Error::InvalidProbabilities`
    /// for an empty support, mismatched lengths, or negative, non-finite or
    /// all-zero probabilities, and `Error::DimensionMismatch` if support
    /// parameters differ in length.
    pub fn build(self) -> Result<UtilityBelief> {
        let utility = self.utility.ok_or_else(|| {
            Error::Configuration("a utility function must be provided".into())
        })?;
        let threshold = self
            .full_support_threshold
            .unwrap_or(DEFAULT_FULL_SUPPORT_THRESHOLD);

        let (support, use_full_support) = match (self.support, self.generator) {
            (None, None) => {
                return Err(Error::Configuration(
                    "either a finite support or a prior sample generator has to be provided".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "a finite support and a prior sample generator are mutually exclusive".into(),
                ));
            }
            (Some((parameters, probabilities)), None) => {
                let support = validate_support(parameters, probabilities)?;
                let full = self
                    .use_full_support
                    .unwrap_or(support.parameters.len() < threshold);
                (
                    Support::Finite {
                        prior: support.clone(),
                        current: support,
                    },
                    full,
                )
            }
            (None, Some(generator)) => {
                if self.use_full_support == Some(true) {
                    return Err(Error::Configuration(
                        "full-support mode requires a finite support".into(),
                    ));
                }
                (Support::Generated { generator }, false)
            }
        };

        Ok(UtilityBelief {
            support,
            utility,
            elicitation: self.elicitation,
            preferences: Vec::new(),
            use_full_support,
            max_rejection_attempts: self
                .max_rejection_attempts
                .unwrap_or(DEFAULT_MAX_REJECTION_ATTEMPTS),
        })
    }
}

fn validate_support(parameters: Vec<Vec<f64>>, probabilities: Vec<f64>) -> Result<WeightedSupport> {
    if parameters.is_empty() {
        return Err(Error::InvalidProbabilities("support cannot be empty".into()));
    }
    if parameters.len() != probabilities.len() {
        return Err(Error::InvalidProbabilities(format!(
            "support has {} hypotheses but {} probabilities",
            parameters.len(),
            probabilities.len()
        )));
    }
    let dim = parameters[0].len();
    if let Some(bad) = parameters.iter().find(|p| p.len() != dim) {
        return Err(Error::DimensionMismatch {
            context: "support parameter",
            expected: dim,
            got: bad.len(),
        });
    }
    if let Some(&p) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(Error::InvalidProbabilities(format!(
            "probabilities must be finite and non-negative, got {p}"
        )));
    }
    let total: f64 = probabilities.iter().sum();
    if total <= 0.0 {
        return Err(Error::InvalidProbabilities(
            "probabilities sum to zero".into(),
        ));
    }
    Ok(WeightedSupport {
        parameters,
        probabilities: probabilities.into_iter().map(|p| p / total).collect(),
    })
}
