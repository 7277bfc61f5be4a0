//! The probabilistic surrogate model the acquisition estimator integrates over.
//!
//! A [`Surrogate`] exposes a finite bank of posterior hyperparameter samples.
//! Instead of switching a hidden "active" sample, every posterior query takes
//! a [`HyperparameterIndex`] obtained from [`Surrogate::activate`]. The
//! surrogate itself is never mutated during evaluation, so it can be shared
//! across worker threads.
//!
//! Shapes used throughout (row-major, one row per query point):
//!
//! | Query | Shape |
//! |-------|-------|
//! | [`posterior_mean`](Surrogate::posterior_mean) | `[n_points][output_dim]` |
//! | [`posterior_variance`](Surrogate::posterior_variance) | `[n_points][output_dim]` |
//! | [`posterior_mean_gradient`](Surrogate::posterior_mean_gradient) | `[n_points][output_dim][input_dim]` |
//! | [`posterior_variance_gradient`](Surrogate::posterior_variance_gradient) | `[n_points][output_dim][input_dim]` |
//! | [`posterior_mean_at_observed`](Surrogate::posterior_mean_at_observed) | `[n_observed][output_dim]` |

use crate::error::{Error, Result};

/// Identifies one of the surrogate's posterior hyperparameter samples.
///
/// Obtained from [`Surrogate::activate`], which checks the index is in range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HyperparameterIndex(usize);

impl HyperparameterIndex {
    /// The position of the sample in the surrogate's bank.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// A multi-output regressor with a bank of hyperparameter posterior samples.
pub trait Surrogate: Sync {
    /// Dimension of the query points.
    fn input_dim(&self) -> usize;

    /// Number of outcome attributes.
    fn output_dim(&self) -> usize;

    /// Number of hyperparameter posterior samples in the bank.
    fn n_hyperparameter_samples(&self) -> usize;

    /// Posterior mean at each point.
    ///
    /// # Errors
    ///
    /// Implementations may fail for malformed input.
    fn posterior_mean(&self, hyper: HyperparameterIndex, points: &[Vec<f64>])
    -> Result<Vec<Vec<f64>>>;

    /// Posterior variance at each point.
    ///
    /// # Errors
    ///
    /// Implementations may fail for malformed input.
    fn posterior_variance(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>>;

    /// Gradient of the posterior mean with respect to each point's coordinates.
    ///
    /// # Errors
    ///
    /// Implementations may fail for malformed input.
    fn posterior_mean_gradient(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>>;

    /// Gradient of the posterior variance with respect to each point's coordinates.
    ///
    /// # Errors
    ///
    /// Implementations may fail for malformed input.
    fn posterior_variance_gradient(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>>;

    /// Posterior mean at the already-observed inputs.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the model is in an invalid state.
    fn posterior_mean_at_observed(&self, hyper: HyperparameterIndex) -> Result<Vec<Vec<f64>>>;

    /// Select hyperparameter sample `index` for subsequent queries.
    ///
    /// Returns `None` if `index` is out of range.
    fn activate(&self, index: usize) -> Option<HyperparameterIndex> {
        (index < self.n_hyperparameter_samples()).then_some(HyperparameterIndex(index))
    }
}

/// Posterior moments for a batch of points under one hyperparameter sample.
#[derive(Clone, Debug)]
pub(crate) struct PosteriorMoments {
    pub(crate) mean: Vec<Vec<f64>>,
    pub(crate) std: Vec<Vec<f64>>,
    /// Present only when gradients were requested.
    pub(crate) gradients: Option<MomentGradients>,
}

#[derive(Clone, Debug)]
pub(crate) struct MomentGradients {
    pub(crate) mean: Vec<Vec<Vec<f64>>>,
    pub(crate) variance: Vec<Vec<Vec<f64>>>,
}

impl PosteriorMoments {
    /// Query and validate the posterior moments at `points`.
    ///
    /// Negative variances from round-off are clamped to zero.
    pub(crate) fn compute<S: Surrogate + ?Sized>(
        surrogate: &S,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
        with_gradients: bool,
    ) -> Result<Self> {
        let n_out = surrogate.output_dim();
        let mean = surrogate.posterior_mean(hyper, points)?;
        let variance = surrogate.posterior_variance(hyper, points)?;
        check_rows(&mean, points.len(), n_out, "posterior mean")?;
        check_rows(&variance, points.len(), n_out, "posterior variance")?;

        let mut std = Vec::with_capacity(points.len());
        for (i, (mu, var)) in mean.iter().zip(&variance).enumerate() {
            if mu.iter().chain(var).any(|v| !v.is_finite()) {
                return Err(Error::NonFiniteMoments { point: i });
            }
            std.push(var.iter().map(|v| v.max(0.0).sqrt()).collect());
        }

        let gradients = if with_gradients {
            let d = surrogate.input_dim();
            let mean_grad = surrogate.posterior_mean_gradient(hyper, points)?;
            let var_grad = surrogate.posterior_variance_gradient(hyper, points)?;
            check_tensor(&mean_grad, points.len(), n_out, d, "posterior mean gradient")?;
            check_tensor(&var_grad, points.len(), n_out, d, "posterior variance gradient")?;
            for (i, (gm, gv)) in mean_grad.iter().zip(&var_grad).enumerate() {
                if gm.iter().chain(gv).flatten().any(|v| !v.is_finite()) {
                    return Err(Error::NonFiniteMoments { point: i });
                }
            }
            Some(MomentGradients {
                mean: mean_grad,
                variance: var_grad,
            })
        } else {
            None
        };

        Ok(Self {
            mean,
            std,
            gradients,
        })
    }
}

fn check_rows(rows: &[Vec<f64>], n: usize, width: usize, context: &'static str) -> Result<()> {
    if rows.len() != n {
        return Err(Error::DimensionMismatch {
            context,
            expected: n,
            got: rows.len(),
        });
    }
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(Error::DimensionMismatch {
            context,
            expected: width,
            got: bad.len(),
        });
    }
    Ok(())
}

fn check_tensor(
    t: &[Vec<Vec<f64>>],
    n: usize,
    n_out: usize,
    d: usize,
    context: &'static str,
) -> Result<()> {
    if t.len() != n {
        return Err(Error::DimensionMismatch {
            context,
            expected: n,
            got: t.len(),
        });
    }
    for rows in t {
        check_rows(rows, n_out, d, context)?;
    }
    Ok(())
}
