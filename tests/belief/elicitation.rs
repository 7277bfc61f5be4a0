use std::sync::atomic::{AtomicUsize, Ordering};

use uei::belief::UtilityBelief;
use uei::elicitation::{ElicitationStrategy, RandomPairElicitation};
use uei::utility::LinearUtility;
use uei::{Error, Preference, Result};

use super::{assert_normalized, weight_grid};

fn observed() -> Vec<Vec<f64>> {
    vec![
        vec![0.9, 0.1],
        vec![0.2, 0.7],
        vec![0.5, 0.5],
        vec![0.1, 0.95],
        vec![0.6, 0.3],
    ]
}

#[test]
fn simulated_comparisons_keep_the_true_weight() {
    let mut belief = UtilityBelief::builder()
        .uniform_support(weight_grid())
        .utility(LinearUtility)
        .elicitation(RandomPairElicitation)
        .build()
        .unwrap();
    let truth = [0.7, 0.3];
    let mut rng = fastrand::Rng::with_seed(5);
    belief
        .add_preference_information(
            |y| truth[0] * y[0] + truth[1] * y[1],
            &observed(),
            6,
            &mut rng,
        )
        .unwrap();

    assert_eq!(belief.preferences().len(), 6);
    let support = belief.support().unwrap();
    assert!(support.iter().any(|theta| (theta[0] - 0.7).abs() < 1e-12));
    assert!(support.len() < 11);
    assert_normalized(belief.probabilities().unwrap());
}

#[test]
fn missing_strategy_is_a_configuration_error() {
    let mut belief = UtilityBelief::builder()
        .uniform_support(weight_grid())
        .utility(LinearUtility)
        .build()
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(0);
    let result = belief.add_preference_information(|y| y[0], &observed(), 1, &mut rng);
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(belief.preferences().is_empty());
}

#[test]
fn failed_batch_applies_no_record() {
    // The first comparison is a tie under min(y0, y1), which only the
    // balanced weight reproduces; the second then contradicts it.
    let calls = AtomicUsize::new(0);
    let scripted = move |_: &[Vec<f64>], _: &mut fastrand::Rng| -> Result<(Vec<f64>, Vec<f64>)> {
        match calls.fetch_add(1, Ordering::Relaxed) {
            0 => Ok((vec![1.0, 0.0], vec![0.0, 1.0])),
            _ => Ok((vec![0.2, 0.2], vec![1.0, 0.0])),
        }
    };
    let mut belief = UtilityBelief::builder()
        .uniform_support(weight_grid())
        .utility(LinearUtility)
        .elicitation(scripted)
        .build()
        .unwrap();
    let before = belief.probabilities().unwrap().to_vec();

    let mut rng = fastrand::Rng::with_seed(2);
    let err = belief
        .add_preference_information(|y| y[0].min(y[1]), &observed(), 2, &mut rng)
        .unwrap_err();
    assert!(matches!(err, Error::DegenerateDistribution { n_records: 1 }));
    assert_eq!(belief.probabilities().unwrap(), before.as_slice());
    assert!(belief.preferences().is_empty());
}

#[test]
fn random_pairs_are_distinct_observations() {
    let observed = observed();
    let mut rng = fastrand::Rng::with_seed(9);
    for _ in 0..200 {
        let (a, b) = RandomPairElicitation.propose_pair(&observed, &mut rng).unwrap();
        assert_ne!(a, b);
        assert!(observed.contains(&a) && observed.contains(&b));
    }
}

#[test]
fn random_pairs_need_two_observations() {
    let mut rng = fastrand::Rng::with_seed(0);
    let result = RandomPairElicitation.propose_pair(&[vec![1.0, 2.0]], &mut rng);
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn labels_follow_the_simulated_utility() {
    let mut belief = UtilityBelief::builder()
        .uniform_support(weight_grid())
        .utility(LinearUtility)
        .elicitation(RandomPairElicitation)
        .build()
        .unwrap();
    let mut rng = fastrand::Rng::with_seed(13);
    belief
        .add_preference_information(|y| y[0], &observed(), 4, &mut rng)
        .unwrap();
    for record in belief.preferences() {
        let expected = if record.first[0] > record.second[0] {
            Preference::First
        } else {
            Preference::Second
        };
        assert_eq!(record.label, expected);
    }
}
