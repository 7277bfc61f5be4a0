//! Expected improvement under utility uncertainty.
//!
//! [`UtilityExpectedImprovement`] scores candidate points by a nested
//! sample-average approximation of
//!
//! `E_h E_W E_θ [ max(u(μ_h(x) + σ_h(x)·W; θ) − max_j u(f_h(x_j); θ), 0) ]`
//!
//! where `h` ranges over the surrogate's hyperparameter samples, `W` over a
//! fixed bank of standard-normal outcome perturbations, `θ` over the
//! utility-parameter samples, and `f_h(x_j)` are the posterior means at the
//! already-observed inputs. The improvement threshold depends on `θ`, since
//! the best observed utility depends on which utility hypothesis is active.
//!
//! # Algorithm overview
//!
//! For every hyperparameter sample `h`:
//!
//! 1. Query the posterior mean and standard deviation at the batch.
//! 2. For every utility sample `θ_l`, compute the best observed utility.
//! 3. For every point, perturbation and utility sample, accumulate the
//!    positive part of the simulated improvement.
//!
//! The sums are divided by `H · |W|` and reduced over `θ` either with the
//! support probabilities (full-support mode) or uniformly. The gradient is
//! accumulated in the same loop from the chain rule through
//! `dμ/dx + ½ · W/σ · dσ²/dx`, only where the improvement is strictly
//! positive, and reduced with the same weights.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `n_outcome_samples` | 25 | Standard-normal perturbations in the bank |
//! | `n_utility_samples` | 10 | Posterior utility samples (ignored in full-support mode) |
//! | `max_hyperparameter_samples` | 10 | Cap on hyperparameter samples used |
//! | `parallel` | true | Distribute batches over a worker pool |
//! | `n_workers` | 4 | Worker threads for batch evaluation |
//! | `seed` | random | RNG seed for sample refreshes |
//!
//! # Examples
//!
//! ```
//! use uei::acquisition::UtilityExpectedImprovement;
//! use uei::belief::UtilityBelief;
//! use uei::gp::{GpHyperparameters, GpSurrogate};
//! use uei::utility::LinearUtility;
//!
//! let x = vec![vec![0.1], vec![0.5], vec![0.9]];
//! let y = vec![vec![0.2, 1.0], vec![0.8, 0.4], vec![0.3, 0.1]];
//! let gp = GpSurrogate::fit(x, y, vec![GpHyperparameters::isotropic(1, 0.3, 1.0, 1e-6)]).unwrap();
//!
//! let belief = UtilityBelief::builder()
//!     .uniform_support(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]])
//!     .utility(LinearUtility)
//!     .build()
//!     .unwrap();
//!
//! let acq = UtilityExpectedImprovement::builder()
//!     .seed(42)
//!     .build(gp, &belief)
//!     .unwrap();
//! let scores = acq.evaluate(&[vec![0.3], vec![0.7]]).unwrap();
//! assert!(scores.iter().all(|&s| s >= 0.0));
//! ```

pub mod parallel;

use core::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::belief::UtilityBelief;
use crate::error::{Error, Result};
use crate::sample_bank::SampleBank;
use crate::surrogate::{HyperparameterIndex, PosteriorMoments, Surrogate};
use crate::utility::UtilityFunction;

pub use parallel::ParallelEvaluation;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Default number of outcome perturbations.
const DEFAULT_N_OUTCOME_SAMPLES: usize = 25;
/// Default number of utility-parameter samples outside full-support mode.
const DEFAULT_N_UTILITY_SAMPLES: usize = 10;
/// Default cap on hyperparameter samples.
const DEFAULT_MAX_HYPERPARAMETER_SAMPLES: usize = 10;
/// Default worker pool size.
const DEFAULT_N_WORKERS: usize = 4;

/// Sizes and execution settings of a [`UtilityExpectedImprovement`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatorConfig {
    /// Number of standard-normal outcome perturbations.
    pub n_outcome_samples: usize,
    /// Number of posterior utility samples outside full-support mode.
    pub n_utility_samples: usize,
    /// Upper bound on the hyperparameter samples integrated over.
    pub max_hyperparameter_samples: usize,
    /// Whether batches of more than one point use the worker pool.
    pub parallel: bool,
    /// Size of the worker pool.
    pub n_workers: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_outcome_samples: DEFAULT_N_OUTCOME_SAMPLES,
            n_utility_samples: DEFAULT_N_UTILITY_SAMPLES,
            max_hyperparameter_samples: DEFAULT_MAX_HYPERPARAMETER_SAMPLES,
            parallel: true,
            n_workers: DEFAULT_N_WORKERS,
        }
    }
}

/// Monte-Carlo estimator of expected utility improvement and its gradient.
///
/// Evaluation takes `&self`: the sample bank sits behind a lock and is only
/// replaced by [`refresh_samples`](Self::refresh_samples), so an optimizer can
/// evaluate from several threads between refreshes.
pub struct UtilityExpectedImprovement<S> {
    surrogate: S,
    utility: Arc<dyn UtilityFunction>,
    bank: RwLock<Arc<SampleBank>>,
    rng: Mutex<fastrand::Rng>,
    config: EstimatorConfig,
}

impl<S: Surrogate> UtilityExpectedImprovement<S> {
    /// Creates a builder for configuring the estimator.
    #[must_use]
    pub fn builder() -> UtilityExpectedImprovementBuilder<S> {
        UtilityExpectedImprovementBuilder::new()
    }

    /// The estimator's configuration.
    #[must_use]
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// The surrogate model being integrated over.
    #[must_use]
    pub fn surrogate(&self) -> &S {
        &self.surrogate
    }

    /// Replace the surrogate, e.g. after new observations were added.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if the new surrogate's output
    /// dimension differs from the sample bank's.
    pub fn set_surrogate(&mut self, surrogate: S) -> Result<()> {
        check_attributes(&surrogate, &self.bank.read())?;
        self.surrogate = surrogate;
        Ok(())
    }

    /// A snapshot of the current sample bank.
    #[must_use]
    pub fn sample_bank(&self) -> Arc<SampleBank> {
        self.bank.read().clone()
    }

    /// Replace the sample bank with an explicit one.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if the bank's perturbations do not
    /// match the surrogate's output dimension.
    pub fn set_sample_bank(&self, bank: SampleBank) -> Result<()> {
        check_attributes(&self.surrogate, &bank)?;
        *self.bank.write() = Arc::new(bank);
        Ok(())
    }

    /// Redraw the outcome perturbations and utility-parameter samples.
    ///
    /// The bank keeps its shape. In full-support mode the utility
    /// parameters become `belief`'s current support and probabilities.
    ///
    /// # Errors
    ///
    /// Propagates sampling errors from `belief`.
    pub fn refresh_samples(&self, belief: &UtilityBelief) -> Result<()> {
        let n_attributes = self.surrogate.output_dim();
        let bank = {
            let mut rng = self.rng.lock();
            SampleBank::draw(
                belief,
                self.config.n_outcome_samples,
                n_attributes,
                self.config.n_utility_samples,
                &mut rng,
            )?
        };
        trace_info!(
            n_outcome_samples = bank.outcome_samples().len(),
            n_utility_parameters = bank.utility_parameters().len(),
            full_support = bank.weights().is_some(),
            "refreshed outcome and utility parameter samples"
        );
        *self.bank.write() = Arc::new(bank);
        Ok(())
    }

    /// Number of hyperparameter samples an evaluation integrates over.
    #[must_use]
    pub fn n_hyperparameter_samples(&self) -> usize {
        self.config
            .max_hyperparameter_samples
            .min(self.surrogate.n_hyperparameter_samples())
    }

    /// Acquisition value at each point.
    ///
    /// Batches of more than one point use the worker pool when `parallel`
    /// is enabled; the result is the same either way.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` for points of the wrong dimension,
    /// `Error::NoPosteriorSamples` if the surrogate has no hyperparameter
    /// samples, `Error::NoObservedOutcomes` if nothing has been observed, and
    /// propagates surrogate errors.
    pub fn evaluate(&self, points: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.use_pool(points) {
            self.evaluate_parallel(points)
        } else {
            self.evaluate_sequential(points)
        }
    }

    /// Acquisition value at each point, computed on the calling thread.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate).
    pub fn evaluate_sequential(&self, points: &[Vec<f64>]) -> Result<Vec<f64>> {
        let bank = self.sample_bank();
        let marginal = self.marginal_with(&bank, points, None)?;
        Ok(marginal.iter().map(|row| bank.reduce(row)).collect())
    }

    /// Acquisition value at each point, distributing points over the pool.
    ///
    /// A single point is evaluated on the calling thread.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate).
    pub fn evaluate_parallel(&self, points: &[Vec<f64>]) -> Result<Vec<f64>> {
        let bank = self.sample_bank();
        let pool = ParallelEvaluation::new(self.config.n_workers);
        let marginal = self.marginal_with(&bank, points, Some(&pool))?;
        Ok(marginal.iter().map(|row| bank.reduce(row)).collect())
    }

    /// Per-point, per-utility-sample marginal improvements.
    ///
    /// Row `i` holds one entry per utility parameter in
    /// [`sample_bank`](Self::sample_bank), already normalized by the number
    /// of hyperparameter and perturbation samples.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate).
    pub fn marginal(&self, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let bank = self.sample_bank();
        self.marginal_with(&bank, points, None)
    }

    /// Acquisition value and its gradient with respect to each point.
    ///
    /// Terms whose simulated improvement is not strictly positive contribute
    /// nothing to the gradient.
    ///
    /// # Errors
    ///
    /// See [`evaluate`](Self::evaluate). Additionally returns
    /// `Error::ZeroStandardDeviation` when a point has zero posterior
    /// standard deviation but a non-zero variance gradient.
    pub fn evaluate_with_gradient(&self, points: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
        let bank = self.sample_bank();
        let pool = ParallelEvaluation::new(self.config.n_workers);
        let pool = self.use_pool(points).then_some(&pool);
        let totals = self.accumulate(&bank, points, true, pool)?;

        let d = self.surrogate.input_dim();
        let mut scores = Vec::with_capacity(points.len());
        let mut gradients = Vec::with_capacity(points.len());
        for total in totals {
            scores.push(bank.reduce(&total.value));
            let mut grad = vec![0.0; d];
            for (l, g) in total.gradient.iter().flatten().enumerate() {
                let w = bank.weight(l);
                for (acc, gj) in grad.iter_mut().zip(g) {
                    *acc += w * gj;
                }
            }
            gradients.push(grad);
        }
        Ok((scores, gradients))
    }

    fn use_pool(&self, points: &[Vec<f64>]) -> bool {
        self.config.parallel && points.len() > 1
    }

    fn marginal_with(
        &self,
        bank: &SampleBank,
        points: &[Vec<f64>],
        pool: Option<&ParallelEvaluation>,
    ) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .accumulate(bank, points, false, pool)?
            .into_iter()
            .map(|total| total.value)
            .collect())
    }

    /// Sum the inner loops over hyperparameter samples and normalize.
    #[allow(clippy::cast_precision_loss)]
    fn accumulate(
        &self,
        bank: &SampleBank,
        points: &[Vec<f64>],
        with_gradients: bool,
        pool: Option<&ParallelEvaluation>,
    ) -> Result<Vec<PointTotals>> {
        let d = self.surrogate.input_dim();
        if let Some(bad) = points.iter().find(|p| p.len() != d) {
            return Err(Error::DimensionMismatch {
                context: "candidate point",
                expected: d,
                got: bad.len(),
            });
        }
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let n_hyper = self.n_hyperparameter_samples();
        if n_hyper == 0 {
            return Err(Error::NoPosteriorSamples);
        }
        check_attributes(&self.surrogate, bank)?;

        trace_debug!(
            n_points = points.len(),
            n_hyper,
            parallel = pool.is_some(),
            with_gradients,
            "evaluating utility expected improvement"
        );

        let n_params = bank.utility_parameters().len();
        let mut totals: Vec<PointTotals> = (0..points.len())
            .map(|_| PointTotals::zeros(n_params, with_gradients.then_some(d)))
            .collect();

        for h in 0..n_hyper {
            let hyper = self.surrogate.activate(h).ok_or(Error::NoPosteriorSamples)?;
            let moments = PosteriorMoments::compute(&self.surrogate, hyper, points, with_gradients)?;
            let best = self.best_observed(hyper, bank)?;
            let kernel = InnerLoop {
                utility: self.utility.as_ref(),
                bank,
                best: &best,
                moments: &moments,
                input_dim: d,
            };

            let partials = match pool {
                Some(pool) => pool.map_points(points.len(), |i| kernel.point(i))?,
                None => (0..points.len())
                    .map(|i| kernel.point(i))
                    .collect::<Result<Vec<_>>>()?,
            };
            for (total, partial) in totals.iter_mut().zip(&partials) {
                total.add(partial);
            }
        }

        let normalizer = (n_hyper * bank.outcome_samples().len()) as f64;
        for total in &mut totals {
            total.scale(1.0 / normalizer);
        }
        Ok(totals)
    }

    /// Best utility among observed outcomes, one per utility parameter.
    fn best_observed(&self, hyper: HyperparameterIndex, bank: &SampleBank) -> Result<Vec<f64>> {
        let observed = self.surrogate.posterior_mean_at_observed(hyper)?;
        if observed.is_empty() {
            return Err(Error::NoObservedOutcomes);
        }
        Ok(bank
            .utility_parameters()
            .iter()
            .map(|theta| {
                observed
                    .iter()
                    .map(|y| self.utility.evaluate(y, theta))
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect())
    }
}

/// Builder for configuring a [`UtilityExpectedImprovement`].
///
/// All options have sensible defaults:
/// - `n_outcome_samples`: 25
/// - `n_utility_samples`: 10
/// - `max_hyperparameter_samples`: 10
/// - `parallel`: true
/// - `n_workers`: 4
/// - `seed`: random
///
/// The builder is tied to the surrogate type `S` it will be built with.
pub struct UtilityExpectedImprovementBuilder<S> {
    n_outcome_samples: Option<usize>,
    n_utility_samples: Option<usize>,
    max_hyperparameter_samples: Option<usize>,
    parallel: Option<bool>,
    n_workers: Option<usize>,
    seed: Option<u64>,
    surrogate: PhantomData<fn() -> S>,
}

impl<S> core::fmt::Debug for UtilityExpectedImprovementBuilder<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UtilityExpectedImprovementBuilder")
            .field("n_outcome_samples", &self.n_outcome_samples)
            .field("n_utility_samples", &self.n_utility_samples)
            .field("max_hyperparameter_samples", &self.max_hyperparameter_samples)
            .field("parallel", &self.parallel)
            .field("n_workers", &self.n_workers)
            .field("seed", &self.seed)
            .finish()
    }
}

impl<S> Clone for UtilityExpectedImprovementBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            surrogate: PhantomData,
            ..*self
        }
    }
}

impl<S> Default for UtilityExpectedImprovementBuilder<S> {
    fn default() -> Self {
        Self {
            n_outcome_samples: None,
            n_utility_samples: None,
            max_hyperparameter_samples: None,
            parallel: None,
            n_workers: None,
            seed: None,
            surrogate: PhantomData,
        }
    }
}

impl<S: Surrogate> UtilityExpectedImprovementBuilder<S> {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of standard-normal outcome perturbations.
    ///
    /// Default: 25.
    #[must_use]
    pub fn n_outcome_samples(mut self, n: usize) -> Self {
        self.n_outcome_samples = Some(n);
        self
    }

    /// Sets the number of utility-parameter samples drawn from the belief
    /// when it is not in full-support mode.
    ///
    /// Default: 10.
    #[must_use]
    pub fn n_utility_samples(mut self, n: usize) -> Self {
        self.n_utility_samples = Some(n);
        self
    }

    /// Sets the cap on hyperparameter samples integrated over.
    ///
    /// This and the two bank sizes are the cost-control levers: one
    /// evaluation costs `O(H · |W| · |θ| · n_points)` utility evaluations.
    ///
    /// Default: 10.
    #[must_use]
    pub fn max_hyperparameter_samples(mut self, n: usize) -> Self {
        self.max_hyperparameter_samples = Some(n);
        self
    }

    /// Enables or disables the worker pool for batches.
    ///
    /// Default: true.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = Some(enabled);
        self
    }

    /// Sets the size of the worker pool.
    ///
    /// Default: 4.
    #[must_use]
    pub fn n_workers(mut self, n: usize) -> Self {
        self.n_workers = Some(n);
        self
    }

    /// Sets the random seed used to draw sample banks.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Applies every field of `config`.
    #[must_use]
    pub fn config(mut self, config: &EstimatorConfig) -> Self {
        self.n_outcome_samples = Some(config.n_outcome_samples);
        self.n_utility_samples = Some(config.n_utility_samples);
        self.max_hyperparameter_samples = Some(config.max_hyperparameter_samples);
        self.parallel = Some(config.parallel);
        self.n_workers = Some(config.n_workers);
        self
    }

    /// Builds the estimator and draws its first sample bank from `belief`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if any size is zero, and propagates
    /// sampling errors from `belief`.
    pub fn build(
        self,
        surrogate: S,
        belief: &UtilityBelief,
    ) -> Result<UtilityExpectedImprovement<S>> {
        let defaults = EstimatorConfig::default();
        let config = EstimatorConfig {
            n_outcome_samples: self.n_outcome_samples.unwrap_or(defaults.n_outcome_samples),
            n_utility_samples: self.n_utility_samples.unwrap_or(defaults.n_utility_samples),
            max_hyperparameter_samples: self
                .max_hyperparameter_samples
                .unwrap_or(defaults.max_hyperparameter_samples),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            n_workers: self.n_workers.unwrap_or(defaults.n_workers),
        };
        for (name, value) in [
            ("n_outcome_samples", config.n_outcome_samples),
            ("n_utility_samples", config.n_utility_samples),
            ("max_hyperparameter_samples", config.max_hyperparameter_samples),
            ("n_workers", config.n_workers),
        ] {
            if value == 0 {
                return Err(Error::Configuration(format!("{name} must be positive")));
            }
        }

        let mut rng = self
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let bank = SampleBank::draw(
            belief,
            config.n_outcome_samples,
            surrogate.output_dim(),
            config.n_utility_samples,
            &mut rng,
        )?;

        Ok(UtilityExpectedImprovement {
            surrogate,
            utility: Arc::clone(belief.utility()),
            bank: RwLock::new(Arc::new(bank)),
            rng: Mutex::new(rng),
            config,
        })
    }
}

// ---------------------------------------------------------------------------
// Inner loop
// ---------------------------------------------------------------------------

fn check_attributes<S: Surrogate + ?Sized>(surrogate: &S, bank: &SampleBank) -> Result<()> {
    if bank.n_attributes() == surrogate.output_dim() {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            context: "outcome perturbation",
            expected: surrogate.output_dim(),
            got: bank.n_attributes(),
        })
    }
}

/// Accumulated sums for one point.
#[derive(Clone, Debug)]
struct PointTotals {
    /// One entry per utility parameter.
    value: Vec<f64>,
    /// `[utility parameter][input dimension]`; `None` on the value-only path.
    gradient: Option<Vec<Vec<f64>>>,
}

impl PointTotals {
    fn zeros(n_params: usize, input_dim: Option<usize>) -> Self {
        Self {
            value: vec![0.0; n_params],
            gradient: input_dim.map(|d| vec![vec![0.0; d]; n_params]),
        }
    }

    fn add(&mut self, other: &Self) {
        for (a, b) in self.value.iter_mut().zip(&other.value) {
            *a += b;
        }
        let other_gradient = other.gradient.iter().flatten();
        for (ga, gb) in self.gradient.iter_mut().flatten().zip(other_gradient) {
            for (a, b) in ga.iter_mut().zip(gb) {
                *a += b;
            }
        }
    }

    fn scale(&mut self, factor: f64) {
        for v in &mut self.value {
            *v *= factor;
        }
        for g in self.gradient.iter_mut().flatten().flatten() {
            *g *= factor;
        }
    }
}

/// Everything the per-point double loop reads under one hyperparameter sample.
struct InnerLoop<'a> {
    utility: &'a dyn UtilityFunction,
    bank: &'a SampleBank,
    best: &'a [f64],
    moments: &'a PosteriorMoments,
    input_dim: usize,
}

impl InnerLoop<'_> {
    /// Sum over utility parameters and perturbations for point `i`.
    ///
    /// The summation order is fixed, so the sequential and pooled paths
    /// produce identical sums.
    #[allow(clippy::float_cmp)]
    fn point(&self, i: usize) -> Result<PointTotals> {
        let mu = &self.moments.mean[i];
        let sigma = &self.moments.std[i];
        let grads = self.moments.gradients.as_ref();
        let n_params = self.bank.utility_parameters().len();
        let mut totals = PointTotals::zeros(n_params, grads.map(|_| self.input_dim));
        let mut simulated = vec![0.0; mu.len()];

        for (l, theta) in self.bank.utility_parameters().iter().enumerate() {
            for w in self.bank.outcome_samples() {
                for (k, y) in simulated.iter_mut().enumerate() {
                    *y = mu[k] + sigma[k] * w[k];
                }
                let value = self.utility.evaluate(&simulated, theta);
                totals.value[l] += (value - self.best[l]).max(0.0);

                let (Some(grads), Some(gradient)) = (grads, totals.gradient.as_mut()) else {
                    continue;
                };
                if value > self.best[l] {
                    let du = self.utility.gradient(&simulated, theta);
                    if du.len() != mu.len() {
                        return Err(Error::DimensionMismatch {
                            context: "utility gradient",
                            expected: mu.len(),
                            got: du.len(),
                        });
                    }
                    let acc = &mut gradient[l];
                    for (k, &du_k) in du.iter().enumerate() {
                        let dmu = &grads.mean[i][k];
                        let dvar = &grads.variance[i][k];
                        let var_scale = if sigma[k] > 0.0 {
                            0.5 * w[k] / sigma[k]
                        } else if dvar.iter().all(|&v| v == 0.0) {
                            0.0
                        } else {
                            return Err(Error::ZeroStandardDeviation {
                                point: i,
                                attribute: k,
                            });
                        };
                        for (j, a) in acc.iter_mut().enumerate() {
                            *a += du_k * (dmu[j] + var_scale * dvar[j]);
                        }
                    }
                }
            }
        }
        Ok(totals)
    }
}
