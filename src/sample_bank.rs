//! Fixed randomness reused across acquisition evaluations.
//!
//! A [`SampleBank`] holds the standard-normal outcome perturbations and the
//! utility-parameter samples. Reusing the same bank for every evaluation
//! during one inner optimization makes the acquisition surface deterministic
//! and smooth in the candidate point; the bank is replaced wholesale between
//! outer rounds.

use crate::belief::UtilityBelief;
use crate::error::{Error, Result};
use crate::rng_util;

/// Outcome perturbations plus utility-parameter samples with their weights.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBank {
    outcome_samples: Vec<Vec<f64>>,
    utility_parameters: Vec<Vec<f64>>,
    /// Probability of each utility parameter in full-support mode.
    weights: Option<Vec<f64>>,
}

impl SampleBank {
    /// Draw a fresh bank.
    ///
    /// If `belief` is in full-support mode the utility parameters are its
    /// whole current support, weighted by the current probabilities.
    /// Otherwise `n_utility_samples` parameters are drawn from the posterior
    /// and averaged uniformly.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if either bank would be empty, and
    /// propagates sampling errors from the belief.
    pub fn draw(
        belief: &UtilityBelief,
        n_outcome_samples: usize,
        n_attributes: usize,
        n_utility_samples: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<Self> {
        let outcome_samples = (0..n_outcome_samples)
            .map(|_| {
                (0..n_attributes)
                    .map(|_| rng_util::standard_normal(rng))
                    .collect()
            })
            .collect();

        let full_support = belief
            .support()
            .zip(belief.probabilities())
            .filter(|_| belief.use_full_support());
        let (utility_parameters, weights) = match full_support {
            Some((support, probs)) => (support.to_vec(), Some(probs.to_vec())),
            None => (belief.sample(n_utility_samples, rng)?, None),
        };

        Self::from_parts(outcome_samples, utility_parameters, weights)
    }

    /// Assemble a bank from explicit samples.
    ///
    /// `weights`, when given, switches the bank to probability-weighted
    /// reduction and must be parallel to `utility_parameters`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for empty banks,
    /// `Error::DimensionMismatch` for ragged outcome samples or mismatched
    /// weights, and `Error::InvalidProbabilities` for negative or
    /// non-finite weights.
    pub fn from_parts(
        outcome_samples: Vec<Vec<f64>>,
        utility_parameters: Vec<Vec<f64>>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self> {
        if outcome_samples.is_empty() {
            return Err(Error::Configuration(
                "sample bank needs at least one outcome sample".into(),
            ));
        }
        if utility_parameters.is_empty() {
            return Err(Error::Configuration(
                "sample bank needs at least one utility parameter".into(),
            ));
        }
        let n_attributes = outcome_samples[0].len();
        if let Some(bad) = outcome_samples.iter().find(|w| w.len() != n_attributes) {
            return Err(Error::DimensionMismatch {
                context: "outcome sample",
                expected: n_attributes,
                got: bad.len(),
            });
        }
        if let Some(w) = &weights {
            if w.len() != utility_parameters.len() {
                return Err(Error::DimensionMismatch {
                    context: "utility parameter weights",
                    expected: utility_parameters.len(),
                    got: w.len(),
                });
            }
            if w.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(Error::InvalidProbabilities(
                    "utility parameter weights must be finite and non-negative".into(),
                ));
            }
        }
        Ok(Self {
            outcome_samples,
            utility_parameters,
            weights,
        })
    }

    /// The standard-normal perturbation vectors.
    #[must_use]
    pub fn outcome_samples(&self) -> &[Vec<f64>] {
        &self.outcome_samples
    }

    /// The utility-parameter samples (or the full support).
    #[must_use]
    pub fn utility_parameters(&self) -> &[Vec<f64>] {
        &self.utility_parameters
    }

    /// Probabilities of the utility parameters, present in full-support mode.
    #[must_use]
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Length of each outcome perturbation.
    #[must_use]
    pub fn n_attributes(&self) -> usize {
        self.outcome_samples[0].len()
    }

    /// Weight of utility parameter `l` in the reduction over parameters.
    ///
    /// Both the value and the gradient are reduced with these weights.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn weight(&self, l: usize) -> f64 {
        match &self.weights {
            Some(w) => w[l],
            None => 1.0 / self.utility_parameters.len() as f64,
        }
    }

    /// Reduce one row of per-parameter marginals to a score.
    #[must_use]
    pub fn reduce(&self, marginal: &[f64]) -> f64 {
        marginal
            .iter()
            .enumerate()
            .map(|(l, m)| m * self.weight(l))
            .sum()
    }
}
