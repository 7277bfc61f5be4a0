use uei::acquisition::UtilityExpectedImprovement;
use uei::belief::UtilityBelief;

use super::test_surrogates::AnalyticSurrogate;
use super::{chebyshev_generated, estimator, linear_full_support};

const STEP: f64 = 1e-6;

fn central_difference(acq: &UtilityExpectedImprovement<AnalyticSurrogate>, x: &[f64]) -> Vec<f64> {
    (0..x.len())
        .map(|j| {
            let mut plus = x.to_vec();
            let mut minus = x.to_vec();
            plus[j] += STEP;
            minus[j] -= STEP;
            let f_plus = acq.evaluate(&[plus]).unwrap()[0];
            let f_minus = acq.evaluate(&[minus]).unwrap()[0];
            (f_plus - f_minus) / (2.0 * STEP)
        })
        .collect()
}

fn assert_gradients_match(belief: &UtilityBelief, points: &[Vec<f64>]) {
    let acq = estimator(belief, 3, 21);
    let (scores, gradients) = acq.evaluate_with_gradient(points).unwrap();
    let values = acq.evaluate(points).unwrap();

    for ((x, analytic), (score, value)) in points.iter().zip(&gradients).zip(scores.iter().zip(&values)) {
        assert!((score - value).abs() < 1e-12, "value paths disagree at {x:?}");
        let numeric = central_difference(&acq, x);
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!(
                (a - n).abs() < 1e-4 * (1.0 + n.abs()),
                "gradient mismatch at {x:?}: analytic {analytic:?}, numeric {numeric:?}"
            );
        }
    }
}

#[test]
fn linear_gradient_matches_finite_differences() {
    let points = vec![vec![0.35, -0.6], vec![-0.8, 0.25], vec![0.9, 0.7]];
    assert_gradients_match(&linear_full_support(), &points);
}

#[test]
fn chebyshev_gradient_matches_finite_differences() {
    let points = vec![vec![0.45, 0.15], vec![-0.3, -0.75]];
    assert_gradients_match(&chebyshev_generated(), &points);
}

#[test]
fn gradient_vanishes_without_improvement() {
    let belief = linear_full_support();
    let acq = UtilityExpectedImprovement::builder()
        .seed(2)
        .build(
            AnalyticSurrogate {
                observed: vec![vec![-100.0, 100.0]],
                n_hyper: 2,
            },
            &belief,
        )
        .unwrap();
    // Both observed means are at least 48, out of reach from the origin.
    let (scores, gradients) = acq.evaluate_with_gradient(&[vec![0.0, 0.0]]).unwrap();
    assert_eq!(scores, vec![0.0]);
    assert!(gradients[0].iter().all(|&g| g == 0.0));
}

#[test]
fn gradient_has_input_dimension() {
    let acq = estimator(&linear_full_support(), 1, 4);
    let points = super::test_surrogates::candidate_grid(3);
    let (scores, gradients) = acq.evaluate_with_gradient(&points).unwrap();
    assert_eq!(scores.len(), points.len());
    assert!(gradients.iter().all(|g| g.len() == 2));
}
