use uei::acquisition::UtilityExpectedImprovement;
use uei::belief::UtilityBelief;
use uei::sample_bank::SampleBank;
use uei::surrogate::{HyperparameterIndex, Surrogate};
use uei::utility::LinearUtility;
use uei::{Error, ErrorCategory, Result};

use super::test_surrogates::AnalyticSurrogate;
use super::{chebyshev_generated, estimator, linear_full_support};

/// One input, one outcome, standard-normal posterior everywhere.
struct StandardNormal {
    observed: Vec<Vec<f64>>,
}

impl Surrogate for StandardNormal {
    fn input_dim(&self) -> usize {
        1
    }
    fn output_dim(&self) -> usize {
        1
    }
    fn n_hyperparameter_samples(&self) -> usize {
        1
    }
    fn posterior_mean(&self, _: HyperparameterIndex, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        Ok(vec![vec![0.0]; x.len()])
    }
    fn posterior_variance(&self, _: HyperparameterIndex, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        Ok(vec![vec![1.0]; x.len()])
    }
    fn posterior_mean_gradient(
        &self,
        _: HyperparameterIndex,
        x: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        Ok(vec![vec![vec![0.0]]; x.len()])
    }
    fn posterior_variance_gradient(
        &self,
        _: HyperparameterIndex,
        x: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        Ok(vec![vec![vec![0.0]]; x.len()])
    }
    fn posterior_mean_at_observed(&self, _: HyperparameterIndex) -> Result<Vec<Vec<f64>>> {
        Ok(self.observed.clone())
    }
}

fn identity_estimator(observed: Vec<Vec<f64>>) -> UtilityExpectedImprovement<StandardNormal> {
    let belief = UtilityBelief::builder()
        .uniform_support(vec![vec![1.0]])
        .utility(LinearUtility)
        .build()
        .unwrap();
    let acq = UtilityExpectedImprovement::builder()
        .build(StandardNormal { observed }, &belief)
        .unwrap();
    acq.set_sample_bank(
        SampleBank::from_parts(vec![vec![-1.0], vec![0.0], vec![1.0]], vec![vec![1.0]], None)
            .unwrap(),
    )
    .unwrap();
    acq
}

#[test]
fn identity_utility_with_symmetric_bank_scores_one_third() {
    let acq = identity_estimator(vec![vec![0.0]]);
    let scores = acq.evaluate(&[vec![0.0]]).unwrap();
    assert!((scores[0] - 1.0 / 3.0).abs() < 1e-12, "score = {}", scores[0]);

    let (scores, gradients) = acq.evaluate_with_gradient(&[vec![0.0]]).unwrap();
    assert!((scores[0] - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(gradients, vec![vec![0.0]]);
}

#[test]
fn threshold_is_the_best_observed_utility() {
    // Best observed is max(-2, 0.5) = 0.5; only W = +1 improves, by 0.5.
    let acq = identity_estimator(vec![vec![-2.0], vec![0.5]]);
    let scores = acq.evaluate(&[vec![3.0]]).unwrap();
    assert!((scores[0] - 0.5 / 3.0).abs() < 1e-12, "score = {}", scores[0]);
}

#[test]
fn exact_zero_improvement_contributes_nothing() {
    // W = 0 lands exactly on the threshold; W = +1 is the only contribution.
    let acq = identity_estimator(vec![vec![0.0]]);
    let marginal = acq.marginal(&[vec![1.0]]).unwrap();
    assert!((marginal[0][0] - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn full_support_scores_are_probability_weighted() {
    let belief = linear_full_support();
    let acq = estimator(&belief, 3, 5);
    let points = vec![vec![0.2, -0.3], vec![0.9, 0.9]];
    let marginal = acq.marginal(&points).unwrap();
    let scores = acq.evaluate_sequential(&points).unwrap();
    let probs = belief.probabilities().unwrap();
    for (row, score) in marginal.iter().zip(&scores) {
        let expected: f64 = row.iter().zip(probs).map(|(m, p)| m * p).sum();
        assert!((expected - score).abs() < 1e-12);
    }
    assert_eq!(acq.sample_bank().weights(), Some(probs));
}

#[test]
fn sampled_scores_are_uniform_means() {
    let belief = chebyshev_generated();
    let acq = estimator(&belief, 2, 8);
    let bank = acq.sample_bank();
    assert_eq!(bank.utility_parameters().len(), 10);
    assert!(bank.weights().is_none());

    let points = vec![vec![-0.4, 0.6]];
    let marginal = acq.marginal(&points).unwrap();
    let score = acq.evaluate(&points).unwrap()[0];
    let mean = marginal[0].iter().sum::<f64>() / marginal[0].len() as f64;
    assert!((mean - score).abs() < 1e-12);
}

#[test]
fn scores_are_nonnegative() {
    let acq = estimator(&linear_full_support(), 4, 1);
    let points = super::test_surrogates::candidate_grid(6);
    for s in acq.evaluate(&points).unwrap() {
        assert!(s >= 0.0, "negative score {s}");
    }
}

#[test]
fn refresh_keeps_shape_and_changes_draws() {
    let belief = chebyshev_generated();
    let acq = estimator(&belief, 2, 3);
    let before = acq.sample_bank();
    acq.refresh_samples(&belief).unwrap();
    let after = acq.sample_bank();
    assert_eq!(
        before.outcome_samples().len(),
        after.outcome_samples().len()
    );
    assert_eq!(
        before.utility_parameters().len(),
        after.utility_parameters().len()
    );
    assert_ne!(before.outcome_samples(), after.outcome_samples());
}

#[test]
fn refresh_tracks_a_narrowed_support() {
    let mut belief = linear_full_support();
    let acq = estimator(&belief, 1, 3);
    belief
        .add_preference(uei::PreferenceRecord::new(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            uei::Preference::First,
        ))
        .unwrap();
    acq.refresh_samples(&belief).unwrap();
    let bank = acq.sample_bank();
    assert_eq!(bank.utility_parameters(), belief.support().unwrap());
    assert_eq!(bank.weights(), belief.probabilities());
}

#[test]
fn zero_posterior_samples_is_a_numerical_guard() {
    let acq = estimator(&linear_full_support(), 0, 0);
    let err = acq.evaluate(&[vec![0.0, 0.0], vec![0.5, 0.5]]).unwrap_err();
    assert!(matches!(err, Error::NoPosteriorSamples));
    assert_eq!(err.category(), ErrorCategory::NumericalGuard);
}

#[test]
fn mismatched_bank_is_rejected() {
    let acq = estimator(&linear_full_support(), 1, 0);
    let bank = SampleBank::from_parts(vec![vec![0.0]], vec![vec![1.0, 0.0]], None).unwrap();
    assert!(matches!(
        acq.set_sample_bank(bank),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn surrogate_can_be_replaced() {
    let mut acq = estimator(&linear_full_support(), 1, 0);
    let before = acq.evaluate(&[vec![0.3, 0.3]]).unwrap()[0];
    acq.set_surrogate(AnalyticSurrogate {
        observed: vec![vec![5.0, 5.0]],
        n_hyper: 1,
    })
    .unwrap();
    let after = acq.evaluate(&[vec![0.3, 0.3]]).unwrap()[0];
    assert!((before - after).abs() > 0.0);
}
