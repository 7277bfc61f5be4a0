use uei::belief::UtilityBelief;
use uei::utility::LinearUtility;
use uei::{Error, ErrorCategory, Preference, PreferenceRecord};

use super::{assert_normalized, grid_belief};

#[test]
fn construction_normalizes_probabilities() {
    let belief = UtilityBelief::builder()
        .finite_support(vec![vec![1.0], vec![2.0], vec![3.0]], vec![2.0, 6.0, 2.0])
        .utility(LinearUtility)
        .build()
        .unwrap();
    assert_eq!(belief.probabilities().unwrap(), &[0.2, 0.6, 0.2]);
    assert_eq!(belief.prior_probabilities().unwrap(), &[0.2, 0.6, 0.2]);
    assert!(belief.is_finite());
}

#[test]
fn small_supports_default_to_full_support() {
    assert!(grid_belief().use_full_support());

    let belief = UtilityBelief::builder()
        .uniform_support(super::weight_grid())
        .full_support_threshold(5)
        .utility(LinearUtility)
        .build()
        .unwrap();
    assert!(!belief.use_full_support());
}

#[test]
fn preference_narrows_support_and_renormalizes() {
    let mut belief = grid_belief();
    // (0.8, 0.0) over (0.0, 0.5): w·0.8 > (1 − w)·0.5, i.e. w > 5/13.
    belief
        .add_preference(PreferenceRecord::new(
            vec![0.8, 0.0],
            vec![0.0, 0.5],
            Preference::First,
        ))
        .unwrap();
    let support = belief.support().unwrap();
    assert_eq!(support.len(), 7);
    assert!(support.iter().all(|theta| theta[0] > 5.0 / 13.0));
    assert_normalized(belief.probabilities().unwrap());
    assert_eq!(belief.preferences().len(), 1);
    assert_eq!(belief.prior_probabilities().unwrap().len(), 11);
}

#[test]
fn tie_keeps_only_indifferent_hypotheses() {
    let mut belief = grid_belief();
    belief
        .add_preference(PreferenceRecord::new(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            Preference::Tie,
        ))
        .unwrap();
    assert_eq!(belief.support().unwrap(), &[vec![0.5, 0.5]]);
    assert_eq!(belief.probabilities().unwrap(), &[1.0]);
}

#[test]
fn contradiction_leaves_belief_unchanged() {
    let mut belief = grid_belief();
    belief
        .add_preference(PreferenceRecord::new(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            Preference::First,
        ))
        .unwrap();
    let support = belief.support().unwrap().to_vec();
    let probs = belief.probabilities().unwrap().to_vec();

    let err = belief
        .add_preference(PreferenceRecord::new(
            vec![2.0, 0.0],
            vec![0.0, 2.0],
            Preference::Second,
        ))
        .unwrap_err();
    assert!(matches!(err, Error::DegenerateDistribution { n_records: 1 }));
    assert_eq!(err.category(), ErrorCategory::DegenerateDistribution);
    assert_eq!(belief.support().unwrap(), support.as_slice());
    assert_eq!(belief.probabilities().unwrap(), probs.as_slice());
    assert_eq!(belief.preferences().len(), 1);
}

#[test]
fn zero_prior_mass_is_never_sampled() {
    let belief = UtilityBelief::builder()
        .finite_support(vec![vec![0.0], vec![1.0], vec![2.0]], vec![0.5, 0.0, 0.5])
        .utility(LinearUtility)
        .build()
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(3);
    let samples = belief.sample(500, &mut rng).unwrap();
    assert!(samples.iter().all(|theta| theta[0] != 1.0));
    assert!(samples.iter().any(|theta| theta[0] == 0.0));
    assert!(samples.iter().any(|theta| theta[0] == 2.0));
}

#[test]
fn prior_samples_ignore_evidence() {
    let mut belief = grid_belief();
    belief
        .add_preference(PreferenceRecord::new(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            Preference::First,
        ))
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(11);
    let posterior = belief.sample(300, &mut rng).unwrap();
    assert!(posterior.iter().all(|theta| theta[0] > 0.5));
    let prior = belief.sample_from_prior(300, &mut rng).unwrap();
    assert!(prior.iter().any(|theta| theta[0] < 0.5));
}

#[test]
fn invalid_supports_are_rejected() {
    let cases = [
        (vec![], vec![]),
        (vec![vec![1.0]], vec![0.5, 0.5]),
        (vec![vec![1.0], vec![2.0]], vec![0.0, 0.0]),
        (vec![vec![1.0], vec![2.0]], vec![-0.5, 1.5]),
        (vec![vec![1.0], vec![2.0]], vec![f64::NAN, 1.0]),
    ];
    for (parameters, probabilities) in cases {
        let result = UtilityBelief::builder()
            .finite_support(parameters.clone(), probabilities.clone())
            .utility(LinearUtility)
            .build();
        assert!(
            matches!(result, Err(Error::InvalidProbabilities(_))),
            "accepted {parameters:?} with {probabilities:?}"
        );
    }
}

#[test]
fn ragged_support_is_a_dimension_mismatch() {
    let result = UtilityBelief::builder()
        .uniform_support(vec![vec![1.0, 0.0], vec![1.0]])
        .utility(LinearUtility)
        .build();
    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
}

#[test]
fn builder_requires_exactly_one_source_and_a_utility() {
    let none = UtilityBelief::builder().utility(LinearUtility).build();
    assert!(matches!(none, Err(Error::Configuration(_))));

    let both = UtilityBelief::builder()
        .uniform_support(vec![vec![1.0]])
        .prior_generator(|n, _| vec![vec![1.0]; n])
        .utility(LinearUtility)
        .build();
    assert!(matches!(both, Err(Error::Configuration(_))));

    let no_utility = UtilityBelief::builder()
        .uniform_support(vec![vec![1.0]])
        .build();
    assert!(matches!(no_utility, Err(Error::Configuration(_))));
}
