//! Multi-output Gaussian Process surrogate with a hyperparameter bank.
//!
//! [`GpSurrogate`] models every outcome attribute with an independent GP
//! using a **Matérn 5/2 kernel** with ARD lengthscales. Instead of a single
//! point estimate of the kernel hyperparameters it holds a bank of
//! [`GpHyperparameters`] samples (e.g. MCMC draws from their posterior) and
//! factorizes one kernel matrix per sample. How the samples were obtained
//! is up to the caller.
//!
//! Outputs are standardized per attribute before fitting; all predictions
//! are returned on the original scale.
//!
//! # Feature flag
//!
//! Requires the **`gp`** feature (adds the `nalgebra` dependency), enabled
//! by default.
//!
//! # Examples
//!
//! ```
//! use uei::gp::{GpHyperparameters, GpSurrogate};
//! use uei::surrogate::Surrogate;
//!
//! let x = vec![vec![0.0], vec![0.5], vec![1.0]];
//! let y = vec![vec![1.0, 0.0], vec![0.5, 0.5], vec![0.0, 1.0]];
//! let bank = vec![
//!     GpHyperparameters::isotropic(1, 0.3, 1.0, 1e-6),
//!     GpHyperparameters::isotropic(1, 0.6, 1.0, 1e-6),
//! ];
//! let gp = GpSurrogate::fit(x, y, bank).unwrap();
//! assert_eq!(gp.output_dim(), 2);
//! assert_eq!(gp.n_hyperparameter_samples(), 2);
//!
//! let h = gp.activate(1).unwrap();
//! let mean = gp.posterior_mean(h, &[vec![0.5]]).unwrap();
//! assert!((mean[0][0] - 0.5).abs() < 1e-3);
//! ```

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{Error, Result};
use crate::surrogate::{HyperparameterIndex, Surrogate};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// One sample of the kernel hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpHyperparameters {
    /// ARD lengthscale per input dimension.
    pub lengthscales: Vec<f64>,
    /// Kernel signal variance on the standardized scale.
    pub signal_variance: f64,
    /// Observation noise variance added to the kernel diagonal.
    pub noise_variance: f64,
}

impl GpHyperparameters {
    /// Same lengthscale in every one of `input_dim` dimensions.
    #[must_use]
    pub fn isotropic(
        input_dim: usize,
        lengthscale: f64,
        signal_variance: f64,
        noise_variance: f64,
    ) -> Self {
        Self {
            lengthscales: vec![lengthscale; input_dim],
            signal_variance,
            noise_variance,
        }
    }
}

/// Independent-output GP fitted once per hyperparameter sample.
pub struct GpSurrogate {
    /// Training inputs, one row per observation.
    x_train: Vec<Vec<f64>>,
    /// Per output attribute, `(mean, std)` used for standardization.
    scaling: Vec<(f64, f64)>,
    /// One fit per hyperparameter sample, parallel to `bank`.
    fits: Vec<FittedSample>,
    bank: Vec<GpHyperparameters>,
}

impl GpSurrogate {
    /// Fit the GP to inputs `x` and outcome vectors `y` for every sample in `bank`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for empty data, an empty bank, or
    /// non-positive lengthscales or signal variance,
    /// `Error::DimensionMismatch` for ragged inputs, outcomes or
    /// lengthscales, and `Error::CholeskyFailed` if a kernel matrix is not
    /// positive definite.
    #[allow(clippy::needless_pass_by_value)]
    pub fn fit(x: Vec<Vec<f64>>, y: Vec<Vec<f64>>, bank: Vec<GpHyperparameters>) -> Result<Self> {
        if x.is_empty() {
            return Err(Error::Configuration(
                "GP needs at least one observation".into(),
            ));
        }
        if bank.is_empty() {
            return Err(Error::Configuration(
                "GP needs at least one hyperparameter sample".into(),
            ));
        }
        if x.len() != y.len() {
            return Err(dimension_error("GP outcomes", x.len(), y.len()));
        }
        let d = x[0].len();
        let n_out = y[0].len();
        if let Some(bad) = x.iter().find(|r| r.len() != d) {
            return Err(dimension_error("GP input", d, bad.len()));
        }
        if let Some(bad) = y.iter().find(|r| r.len() != n_out) {
            return Err(dimension_error("GP outcome", n_out, bad.len()));
        }
        for hp in &bank {
            if hp.lengthscales.len() != d {
                return Err(dimension_error(
                    "GP lengthscales",
                    d,
                    hp.lengthscales.len(),
                ));
            }
            if hp.lengthscales.iter().any(|&l| l <= 0.0) || hp.signal_variance <= 0.0 {
                return Err(Error::Configuration(
                    "GP lengthscales and signal variance must be positive".into(),
                ));
            }
        }

        let scaling: Vec<(f64, f64)> = (0..n_out)
            .map(|k| standardization(&y.iter().map(|row| row[k]).collect::<Vec<_>>()))
            .collect();

        let mut fits = Vec::with_capacity(bank.len());
        for (h, hp) in bank.iter().enumerate() {
            let cholesky = Cholesky::new(kernel_matrix(&x, hp)).ok_or(Error::CholeskyFailed(h))?;
            let alphas = scaling
                .iter()
                .enumerate()
                .map(|(k, &(mean, std))| {
                    let y_k =
                        DVector::from_iterator(x.len(), y.iter().map(|row| (row[k] - mean) / std));
                    cholesky.solve(&y_k)
                })
                .collect();
            fits.push(FittedSample { cholesky, alphas });
            trace_debug!(sample = h, "fitted GP hyperparameter sample");
        }

        Ok(Self {
            x_train: x,
            scaling,
            fits,
            bank,
        })
    }

    /// The hyperparameter samples the GP was fitted with.
    #[must_use]
    pub fn hyperparameters(&self) -> &[GpHyperparameters] {
        &self.bank
    }

    /// The training inputs.
    #[must_use]
    pub fn observed_inputs(&self) -> &[Vec<f64>] {
        &self.x_train
    }

    /// Hyperparameters and factorization of sample `hyper`.
    fn fitted(&self, hyper: HyperparameterIndex) -> Result<(&GpHyperparameters, &FittedSample)> {
        self.bank
            .get(hyper.get())
            .zip(self.fits.get(hyper.get()))
            .ok_or(Error::NoPosteriorSamples)
    }

    fn check_points(&self, points: &[Vec<f64>]) -> Result<()> {
        let d = self.input_dim();
        match points.iter().find(|p| p.len() != d) {
            Some(bad) => Err(dimension_error("GP query point", d, bad.len())),
            None => Ok(()),
        }
    }

    /// Kernel vector and its Jacobian for one query point.
    fn kernel_terms(&self, hp: &GpHyperparameters, x: &[f64]) -> (DVector<f64>, Vec<Vec<f64>>) {
        let k_star = kernel_vector(x, &self.x_train, hp);
        let dk = self
            .x_train
            .iter()
            .map(|xi| matern52_gradient(x, xi, hp))
            .collect();
        (k_star, dk)
    }
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// Factorization for one hyperparameter sample, shared by every attribute.
struct FittedSample {
    /// Cholesky factor L of K + σ²I.
    cholesky: Cholesky<f64, Dyn>,
    /// α = (K + σ²I)^{-1} y per standardized attribute.
    alphas: Vec<DVector<f64>>,
}

fn dimension_error(context: &'static str, expected: usize, got: usize) -> Error {
    Error::DimensionMismatch {
        context,
        expected,
        got,
    }
}

#[allow(clippy::cast_precision_loss)]
fn standardization(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = if n > 1 {
        values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        1.0
    };
    (mean, var.sqrt().max(1e-10))
}

// ---------------------------------------------------------------------------
// Matérn 5/2 kernel
// ---------------------------------------------------------------------------

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

fn scaled_distance(x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
    x1.iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
fn matern52(x1: &[f64], x2: &[f64], hp: &GpHyperparameters) -> f64 {
    let r = scaled_distance(x1, x2, &hp.lengthscales);
    let sqrt5_r = SQRT_5 * r;
    hp.signal_variance * (1.0 + sqrt5_r + 5.0 / 3.0 * r * r) * (-sqrt5_r).exp()
}

/// Gradient of `k(x1, x2)` with respect to `x1`.
///
/// `∂k/∂x1_j = -5/3 σ² (1 + √5 r) exp(-√5 r) (x1_j - x2_j) / l_j²`
fn matern52_gradient(x1: &[f64], x2: &[f64], hp: &GpHyperparameters) -> Vec<f64> {
    let r = scaled_distance(x1, x2, &hp.lengthscales);
    let sqrt5_r = SQRT_5 * r;
    let factor = -5.0 / 3.0 * hp.signal_variance * (1.0 + sqrt5_r) * (-sqrt5_r).exp();
    x1.iter()
        .zip(x2)
        .zip(&hp.lengthscales)
        .map(|((a, b), l)| factor * (a - b) / (l * l))
        .collect()
}

/// Build the kernel matrix `K + σ²I`.
fn kernel_matrix(x: &[Vec<f64>], hp: &GpHyperparameters) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        let k = matern52(&x[i], &x[j], hp);
        if i == j { k + hp.noise_variance } else { k }
    })
}

/// Compute the kernel vector k(x*, X) for a test point.
fn kernel_vector(x_star: &[f64], x_train: &[Vec<f64>], hp: &GpHyperparameters) -> DVector<f64> {
    DVector::from_fn(x_train.len(), |i, _| matern52(x_star, &x_train[i], hp))
}

// ---------------------------------------------------------------------------
// Surrogate implementation
// ---------------------------------------------------------------------------

impl Surrogate for GpSurrogate {
    fn input_dim(&self) -> usize {
        self.x_train[0].len()
    }

    fn output_dim(&self) -> usize {
        self.scaling.len()
    }

    fn n_hyperparameter_samples(&self) -> usize {
        self.bank.len()
    }

    fn posterior_mean(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>> {
        self.check_points(points)?;
        let (hp, fit) = self.fitted(hyper)?;
        Ok(points
            .iter()
            .map(|x| {
                let k_star = kernel_vector(x, &self.x_train, hp);
                fit.alphas
                    .iter()
                    .zip(&self.scaling)
                    .map(|(alpha, &(mean, std))| mean + std * k_star.dot(alpha))
                    .collect()
            })
            .collect())
    }

    fn posterior_variance(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>> {
        self.check_points(points)?;
        let (hp, fit) = self.fitted(hyper)?;
        Ok(points
            .iter()
            .map(|x| {
                // Variance: k(x*, x*) - k*^T (K + σ²I)^{-1} k*
                let k_star = kernel_vector(x, &self.x_train, hp);
                let v = fit.cholesky.solve(&k_star);
                let var = (hp.signal_variance - k_star.dot(&v)).max(0.0);
                self.scaling
                    .iter()
                    .map(|&(_, std)| std * std * var)
                    .collect()
            })
            .collect())
    }

    fn posterior_mean_gradient(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        self.check_points(points)?;
        let (hp, fit) = self.fitted(hyper)?;
        let d = self.input_dim();
        Ok(points
            .iter()
            .map(|x| {
                let (_, dk) = self.kernel_terms(hp, x);
                fit.alphas
                    .iter()
                    .zip(&self.scaling)
                    .map(|(alpha, &(_, std))| {
                        let mut grad = vec![0.0; d];
                        for (i, dki) in dk.iter().enumerate() {
                            for (g, dkij) in grad.iter_mut().zip(dki) {
                                *g += std * alpha[i] * dkij;
                            }
                        }
                        grad
                    })
                    .collect()
            })
            .collect())
    }

    fn posterior_variance_gradient(
        &self,
        hyper: HyperparameterIndex,
        points: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        self.check_points(points)?;
        let (hp, fit) = self.fitted(hyper)?;
        let d = self.input_dim();
        Ok(points
            .iter()
            .map(|x| {
                // ∂var/∂x = -2 (∂k*/∂x)^T (K + σ²I)^{-1} k*
                let (k_star, dk) = self.kernel_terms(hp, x);
                let v = fit.cholesky.solve(&k_star);
                let mut grad = vec![0.0; d];
                for (i, dki) in dk.iter().enumerate() {
                    for (g, dkij) in grad.iter_mut().zip(dki) {
                        *g -= 2.0 * v[i] * dkij;
                    }
                }
                self.scaling
                    .iter()
                    .map(|&(_, std)| grad.iter().map(|g| std * std * g).collect())
                    .collect()
            })
            .collect())
    }

    fn posterior_mean_at_observed(&self, hyper: HyperparameterIndex) -> Result<Vec<Vec<f64>>> {
        self.posterior_mean(hyper, &self.x_train)
    }
}
