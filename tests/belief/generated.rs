use uei::belief::UtilityBelief;
use uei::utility::LinearUtility;
use uei::{Error, ErrorCategory, Preference, PreferenceRecord};

fn uniform_weights() -> UtilityBelief {
    UtilityBelief::builder()
        .prior_generator(|n, rng| {
            (0..n)
                .map(|_| {
                    let w = rng.f64();
                    vec![w, 1.0 - w]
                })
                .collect()
        })
        .utility(LinearUtility)
        .max_rejection_attempts(2_000)
        .build()
        .unwrap()
}

#[test]
fn without_evidence_samples_come_from_the_prior() {
    let belief = uniform_weights();
    assert!(!belief.is_finite());
    assert!(!belief.use_full_support());
    assert!(belief.support().is_none());
    assert!(belief.probabilities().is_none());

    let mut rng = fastrand::Rng::with_seed(1);
    let samples = belief.sample(50, &mut rng).unwrap();
    assert_eq!(samples.len(), 50);
    assert!(samples.iter().all(|theta| (theta[0] + theta[1] - 1.0).abs() < 1e-12));
}

#[test]
fn rejection_sampling_respects_every_record() {
    let mut belief = uniform_weights();
    belief
        .add_preference(PreferenceRecord::new(
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            Preference::First,
        ))
        .unwrap();
    belief
        .add_preference(PreferenceRecord::new(
            vec![0.0, 3.0],
            vec![1.0, 0.0],
            Preference::First,
        ))
        .unwrap();
    // w > 1/2 and 3(1 − w) > w, so w lies in (1/2, 3/4).
    let mut rng = fastrand::Rng::with_seed(4);
    let samples = belief.sample(40, &mut rng).unwrap();
    assert_eq!(samples.len(), 40);
    for theta in &samples {
        assert!(theta[0] > 0.5 && theta[0] < 0.75, "{theta:?}");
        assert!(belief.is_consistent(theta));
    }
}

#[test]
fn impossible_evidence_exhausts_the_attempt_budget() {
    let mut belief = uniform_weights();
    // Linear utility of a point against itself is always a tie.
    belief
        .add_preference(PreferenceRecord::new(
            vec![0.4, 0.6],
            vec![0.4, 0.6],
            Preference::First,
        ))
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(0);
    let err = belief.sample(3, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        Error::SamplingExhausted {
            requested: 3,
            accepted: 0,
            attempts: 2_000
        }
    ));
    assert_eq!(err.category(), ErrorCategory::SamplingExhaustion);
}

#[test]
fn generator_must_honour_the_requested_count() {
    let belief = UtilityBelief::builder()
        .prior_generator(|_, _| vec![vec![1.0]])
        .utility(LinearUtility)
        .build()
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(0);
    assert!(matches!(
        belief.sample_from_prior(4, &mut rng),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn full_support_cannot_be_forced_on_a_generator() {
    let result = UtilityBelief::builder()
        .prior_generator(|n, _| vec![vec![1.0]; n])
        .use_full_support(true)
        .utility(LinearUtility)
        .build();
    assert!(matches!(result, Err(Error::Configuration(_))));
}
