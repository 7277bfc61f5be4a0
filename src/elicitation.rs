//! Strategies for choosing which pair of outcomes to ask the decision maker about.

use crate::error::{Error, Result};

/// Proposes a pair of outcomes to compare.
///
/// Closures with the signature
/// `Fn(&[Vec<f64>], &mut fastrand::Rng) -> Result<(Vec<f64>, Vec<f64>)>`
/// implement this trait, so ad-hoc strategies need no wrapper type.
pub trait ElicitationStrategy: Send + Sync {
    /// Picks two outcomes, usually from `observed`.
    ///
    /// # Errors
    ///
    /// Implementations return an error when no pair can be proposed.
    fn propose_pair(
        &self,
        observed: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> Result<(Vec<f64>, Vec<f64>)>;
}

impl<F> ElicitationStrategy for F
where
    F: Fn(&[Vec<f64>], &mut fastrand::Rng) -> Result<(Vec<f64>, Vec<f64>)> + Send + Sync,
{
    fn propose_pair(
        &self,
        observed: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        self(observed, rng)
    }
}

/// Picks two distinct observed outcomes uniformly at random.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPairElicitation;

impl ElicitationStrategy for RandomPairElicitation {
    fn propose_pair(
        &self,
        observed: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let n = observed.len();
        if n < 2 {
            return Err(Error::Configuration(format!(
                "random pair elicitation needs at least two observed outcomes, got {n}"
            )));
        }
        let i = rng.usize(0..n);
        // Shift past `i` so the second index is uniform over the rest.
        let mut j = rng.usize(0..n - 1);
        if j >= i {
            j += 1;
        }
        Ok((observed[i].clone(), observed[j].clone()))
    }
}
