//! Preference-based optimization of a two-attribute black box.
//!
//! A simulated decision maker with a Chebyshev utility answers one pairwise
//! comparison per round. The belief over its weights narrows, the GP is
//! refit, and the next input is chosen by maximizing the expected utility
//! improvement with a few projected gradient-ascent steps from random starts.
//!
//! Run with: `cargo run --example preference_loop`

use uei::prelude::*;

/// The expensive black box: two competing attributes over `[0, 1]²`.
fn black_box(x: &[f64]) -> Vec<f64> {
    vec![
        1.0 - (x[0] - 0.2).powi(2) - (x[1] - 0.8).powi(2),
        1.0 - (x[0] - 0.9).powi(2) - (x[1] - 0.3).powi(2),
    ]
}

const TRUE_WEIGHTS: [f64; 2] = [0.35, 0.65];

fn true_utility(y: &[f64]) -> f64 {
    (TRUE_WEIGHTS[0] * y[0]).min(TRUE_WEIGHTS[1] * y[1])
}

fn hyperparameter_bank() -> Vec<GpHyperparameters> {
    [0.2, 0.35, 0.5]
        .iter()
        .map(|&l| GpHyperparameters::isotropic(2, l, 1.0, 1e-6))
        .collect()
}

/// Gradient ascent on the acquisition, clamped to the unit box.
fn maximize(acq: &UtilityExpectedImprovement<GpSurrogate>, rng: &mut fastrand::Rng) -> Result<Vec<f64>> {
    let starts: Vec<Vec<f64>> = (0..16).map(|_| vec![rng.f64(), rng.f64()]).collect();
    let mut points = starts;
    for _ in 0..25 {
        let (_, gradients) = acq.evaluate_with_gradient(&points)?;
        for (x, g) in points.iter_mut().zip(&gradients) {
            for (xj, gj) in x.iter_mut().zip(g) {
                *xj = (*xj + 0.05 * gj.signum() * gj.abs().min(1.0)).clamp(0.0, 1.0);
            }
        }
    }
    let scores = acq.evaluate(&points)?;
    let best = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    Ok(points.swap_remove(best))
}

fn main() -> uei::Result<()> {
    let mut rng = fastrand::Rng::with_seed(2024);

    let mut x: Vec<Vec<f64>> = (0..4).map(|_| vec![rng.f64(), rng.f64()]).collect();
    let mut y: Vec<Vec<f64>> = x.iter().map(|p| black_box(p)).collect();

    let grid: Vec<Vec<f64>> = (1..10)
        .map(|i| {
            let w = f64::from(i) / 10.0;
            vec![w, 1.0 - w]
        })
        .collect();
    let mut belief = UtilityBelief::builder()
        .uniform_support(grid)
        .utility(ChebyshevUtility)
        .elicitation(RandomPairElicitation)
        .build()?;

    for round in 0..6 {
        belief.add_preference_information(true_utility, &y, 1, &mut rng)?;

        let gp = GpSurrogate::fit(x.clone(), y.clone(), hyperparameter_bank())?;
        let acq = UtilityExpectedImprovement::builder()
            .seed(rng.u64(..))
            .build(gp, &belief)?;

        let next = maximize(&acq, &mut rng)?;
        let score = acq.evaluate(std::slice::from_ref(&next))?[0];
        let outcome = black_box(&next);
        println!(
            "Round {}: x = [{:.3}, {:.3}], uEI = {score:.4}, utility = {:.4}, {} weights left",
            round + 1,
            next[0],
            next[1],
            true_utility(&outcome),
            belief.support().map_or(0, <[_]>::len),
        );
        x.push(next);
        y.push(outcome);
    }

    let best = y
        .iter()
        .map(|o| true_utility(o))
        .fold(f64::NEG_INFINITY, f64::max);
    println!("Best true utility found: {best:.4}");
    if let Some(support) = belief.support() {
        println!("Remaining weight hypotheses: {support:?}");
    }
    Ok(())
}
