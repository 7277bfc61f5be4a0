/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Sample a value from the standard normal distribution using Box-Muller transform.
pub(crate) fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    // u1 in (0, 1] so the log stays finite
    let u1 = 1.0 - rng.f64();
    let u2 = f64_range(rng, 0.0, core::f64::consts::TAU);
    (-2.0 * u1.ln()).sqrt() * u2.cos()
}

/// Draw an index from a categorical distribution.
///
/// `weights` must be non-negative with a positive sum; they need not be
/// normalized. Indices with zero weight are never returned.
pub(crate) fn categorical(rng: &mut fastrand::Rng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let target = rng.f64() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if target < cumulative {
            return i;
        }
    }
    // Rounding can leave `target` at the very top of the range.
    last_positive
}
