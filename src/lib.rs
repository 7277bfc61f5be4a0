#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]
#![allow(clippy::module_name_repetitions)]

//! Expected improvement under utility uncertainty for preference-based
//! Bayesian optimization of vector-valued outcomes.
//!
//! The decision maker's utility `u(y; θ)` of an outcome vector `y` is known
//! only up to a parameter `θ`. This crate provides the two pieces a
//! sequential optimization loop needs between evaluations of the expensive
//! black box:
//!
//! - [`UtilityExpectedImprovement`](acquisition::UtilityExpectedImprovement)
//!   scores candidate points by nested Monte-Carlo integration over the
//!   surrogate's hyperparameter samples, standard-normal outcome
//!   perturbations and utility-parameter samples, and provides the analytic
//!   gradient for gradient-based acquisition optimizers.
//! - [`UtilityBelief`](belief::UtilityBelief) maintains the distribution over
//!   `θ`, conditioned on pairwise preference feedback, either by exact
//!   filtering of a finite support or by rejection sampling from a prior.
//!
//! # Getting Started
//!
//! ```
//! use uei::prelude::*;
//!
//! // Observations of a two-attribute black box at three inputs.
//! let x = vec![vec![0.1], vec![0.5], vec![0.9]];
//! let y = vec![vec![0.2, 1.0], vec![0.8, 0.4], vec![0.3, 0.1]];
//! let gp = GpSurrogate::fit(x, y.clone(), vec![GpHyperparameters::isotropic(1, 0.3, 1.0, 1e-6)])?;
//!
//! let mut belief = UtilityBelief::builder()
//!     .uniform_support(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]])
//!     .utility(LinearUtility)
//!     .elicitation(RandomPairElicitation)
//!     .build()?;
//!
//! // Ask the (simulated) decision maker, who only cares about attribute 0.
//! let mut rng = fastrand::Rng::with_seed(1);
//! belief.add_preference_information(|o| o[0], &y, 2, &mut rng)?;
//!
//! let acq = UtilityExpectedImprovement::builder().seed(7).build(gp, &belief)?;
//! let (scores, gradients) = acq.evaluate_with_gradient(&[vec![0.3], vec![0.7]])?;
//! assert_eq!(scores.len(), 2);
//! assert_eq!(gradients[0].len(), 1);
//! # Ok::<(), uei::Error>(())
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Surrogate`](surrogate::Surrogate) | Posterior moments and gradients, one query per explicit hyperparameter sample |
//! | [`UtilityFunction`](utility::UtilityFunction) | `u(y; θ)` and `∇_y u` |
//! | [`UtilityBelief`](belief::UtilityBelief) | Distribution over `θ` narrowed by [`PreferenceRecord`]s |
//! | [`SampleBank`](sample_bank::SampleBank) | Fixed perturbation and utility samples reused across evaluations |
//! | [`UtilityExpectedImprovement`](acquisition::UtilityExpectedImprovement) | The acquisition value and gradient |
//! | [`ElicitationStrategy`](elicitation::ElicitationStrategy) | Which pair of outcomes to ask about |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `gp` | [`GpSurrogate`](gp::GpSurrogate): Matérn 5/2 GP with a hyperparameter bank | on |
//! | `serde` | `Serialize`/`Deserialize` on preference records, configs and GP hyperparameters | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at sample refreshes, belief updates and batch dispatch | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod belief;
pub mod elicitation;
mod error;
#[cfg(feature = "gp")]
pub mod gp;
mod preference;
mod rng_util;
pub mod sample_bank;
pub mod surrogate;
pub mod utility;

pub use error::{Error, ErrorCategory, Result};
pub use preference::{Preference, PreferenceRecord, encode_preference};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use uei::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{
        EstimatorConfig, ParallelEvaluation, UtilityExpectedImprovement,
        UtilityExpectedImprovementBuilder,
    };
    pub use crate::belief::{UtilityBelief, UtilityBeliefBuilder};
    pub use crate::elicitation::{ElicitationStrategy, RandomPairElicitation};
    pub use crate::error::{Error, ErrorCategory, Result};
    #[cfg(feature = "gp")]
    pub use crate::gp::{GpHyperparameters, GpSurrogate};
    pub use crate::preference::{Preference, PreferenceRecord, encode_preference};
    pub use crate::sample_bank::SampleBank;
    pub use crate::surrogate::{HyperparameterIndex, Surrogate};
    pub use crate::utility::{ChebyshevUtility, FnUtility, LinearUtility, UtilityFunction};
}
