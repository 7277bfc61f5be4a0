//! Parametric utility functions of an outcome vector.
//!
//! A [`UtilityFunction`] maps an outcome vector `y` and a parameter `θ` to a
//! scalar. The acquisition estimator needs both the value and the gradient
//! with respect to `y`; the parameter is never differentiated.
//!
//! Two common families are provided:
//!
//! | Type | `u(y; θ)` | `∇_y u` |
//! |------|-----------|---------|
//! | [`LinearUtility`] | `Σ θ_k y_k` | `θ` |
//! | [`ChebyshevUtility`] | `min_k θ_k y_k` | `θ_k* e_k*` at the minimizing `k*` |
//!
//! Anything else can be plugged in with [`FnUtility`].

/// A scalar utility of an outcome vector, parameterized by `θ`.
pub trait UtilityFunction: Send + Sync {
    /// Evaluates `u(outcome; parameter)`.
    fn evaluate(&self, outcome: &[f64], parameter: &[f64]) -> f64;

    /// Gradient of `u` with respect to `outcome`, same length as `outcome`.
    fn gradient(&self, outcome: &[f64], parameter: &[f64]) -> Vec<f64>;
}

/// Weighted sum of the outcome attributes.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearUtility;

impl UtilityFunction for LinearUtility {
    fn evaluate(&self, outcome: &[f64], parameter: &[f64]) -> f64 {
        outcome.iter().zip(parameter).map(|(y, t)| y * t).sum()
    }

    fn gradient(&self, outcome: &[f64], parameter: &[f64]) -> Vec<f64> {
        (0..outcome.len())
            .map(|k| parameter.get(k).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Weighted Chebyshev scalarization: the worst weighted attribute.
///
/// Not differentiable where two weighted attributes tie for the minimum; the
/// gradient then points along the first minimizing attribute.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChebyshevUtility;

impl ChebyshevUtility {
    fn argmin(outcome: &[f64], parameter: &[f64]) -> Option<(usize, f64)> {
        outcome
            .iter()
            .zip(parameter)
            .map(|(y, t)| y * t)
            .enumerate()
            .fold(None, |best, (k, v)| match best {
                Some((_, bv)) if bv <= v => best,
                _ => Some((k, v)),
            })
    }
}

impl UtilityFunction for ChebyshevUtility {
    fn evaluate(&self, outcome: &[f64], parameter: &[f64]) -> f64 {
        Self::argmin(outcome, parameter).map_or(f64::NEG_INFINITY, |(_, v)| v)
    }

    fn gradient(&self, outcome: &[f64], parameter: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; outcome.len()];
        if let Some((k, _)) = Self::argmin(outcome, parameter) {
            grad[k] = parameter[k];
        }
        grad
    }
}

/// A utility defined by a pair of closures.
///
/// # Examples
///
/// ```
/// use uei::utility::{FnUtility, UtilityFunction};
///
/// // u(y; θ) = -(y - θ)²  for scalar outcomes
/// let u = FnUtility::new(
///     |y: &[f64], t: &[f64]| -(y[0] - t[0]).powi(2),
///     |y: &[f64], t: &[f64]| vec![-2.0 * (y[0] - t[0])],
/// );
/// assert_eq!(u.evaluate(&[1.0], &[1.0]), 0.0);
/// assert_eq!(u.gradient(&[2.0], &[1.0]), vec![-2.0]);
/// ```
pub struct FnUtility<F, G> {
    value: F,
    gradient: G,
}

impl<F, G> FnUtility<F, G>
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64], &[f64]) -> Vec<f64> + Send + Sync,
{
    /// Creates a utility from a value closure and a gradient closure.
    #[must_use]
    pub fn new(value: F, gradient: G) -> Self {
        Self { value, gradient }
    }
}

impl<F, G> UtilityFunction for FnUtility<F, G>
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64], &[f64]) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, outcome: &[f64], parameter: &[f64]) -> f64 {
        (self.value)(outcome, parameter)
    }

    fn gradient(&self, outcome: &[f64], parameter: &[f64]) -> Vec<f64> {
        (self.gradient)(outcome, parameter)
    }
}
