#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

#[path = "../../benches/test_surrogates.rs"]
mod test_surrogates;

mod gradient;
mod scenarios;

use uei::acquisition::UtilityExpectedImprovement;
use uei::belief::UtilityBelief;
use uei::utility::{ChebyshevUtility, LinearUtility};

use test_surrogates::AnalyticSurrogate;

/// Three weight vectors over two attributes, integrated exactly.
fn linear_full_support() -> UtilityBelief {
    UtilityBelief::builder()
        .finite_support(
            vec![vec![1.0, 0.0], vec![0.3, 0.7], vec![0.6, 0.4]],
            vec![0.5, 0.2, 0.3],
        )
        .utility(LinearUtility)
        .build()
        .unwrap()
}

/// Chebyshev weights drawn from a continuous prior.
fn chebyshev_generated() -> UtilityBelief {
    UtilityBelief::builder()
        .prior_generator(|n, rng| {
            (0..n)
                .map(|_| {
                    let w = 0.1 + 0.8 * rng.f64();
                    vec![w, 1.0 - w]
                })
                .collect()
        })
        .utility(ChebyshevUtility)
        .build()
        .unwrap()
}

fn estimator(
    belief: &UtilityBelief,
    n_hyper: usize,
    seed: u64,
) -> UtilityExpectedImprovement<AnalyticSurrogate> {
    UtilityExpectedImprovement::builder()
        .seed(seed)
        .build(AnalyticSurrogate::new(n_hyper), belief)
        .unwrap()
}
