mod elicitation;
mod finite;
mod generated;

use uei::belief::UtilityBelief;
use uei::utility::LinearUtility;

/// Weight on attribute 0 from 0.0 to 1.0 in steps of 0.1.
fn weight_grid() -> Vec<Vec<f64>> {
    (0..=10)
        .map(|i| {
            let w = f64::from(i) / 10.0;
            vec![w, 1.0 - w]
        })
        .collect()
}

fn grid_belief() -> UtilityBelief {
    UtilityBelief::builder()
        .uniform_support(weight_grid())
        .utility(LinearUtility)
        .build()
        .unwrap()
}

fn assert_normalized(probs: &[f64]) {
    let total: f64 = probs.iter().sum();
    assert!((total - 1.0).abs() < 1e-12, "probabilities sum to {total}");
    assert!(probs.iter().all(|&p| p > 0.0));
}
