//! Pairwise preference labels and the records a utility belief is conditioned on.

/// Outcome of comparing two outcome vectors under some utility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preference {
    /// The first outcome is strictly preferred.
    First,
    /// The second outcome is strictly preferred.
    Second,
    /// Both outcomes have exactly the same utility.
    Tie,
}

/// Encode the comparison of two utility values as a [`Preference`].
///
/// This is a sign comparator: no tolerance is applied, so only exactly
/// equal utilities produce [`Preference::Tie`]. NaN compares as a tie.
///
/// # Examples
///
/// ```
/// use uei::{Preference, encode_preference};
///
/// assert_eq!(encode_preference(2.0, 1.0), Preference::First);
/// assert_eq!(encode_preference(1.0, 2.0), Preference::Second);
/// assert_eq!(encode_preference(1.0, 1.0), Preference::Tie);
/// ```
#[must_use]
pub fn encode_preference(u1: f64, u2: f64) -> Preference {
    if u1 > u2 {
        Preference::First
    } else if u1 < u2 {
        Preference::Second
    } else {
        Preference::Tie
    }
}

/// A single piece of pairwise preference evidence.
///
/// Records are only ever appended to a belief's log; they are never edited.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreferenceRecord {
    /// The first outcome vector shown.
    pub first: Vec<f64>,
    /// The second outcome vector shown.
    pub second: Vec<f64>,
    /// Which of the two the true utility preferred.
    pub label: Preference,
}

impl PreferenceRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(first: Vec<f64>, second: Vec<f64>, label: Preference) -> Self {
        Self {
            first,
            second,
            label,
        }
    }

    /// Label a pair of outcomes with a utility function of the outcome alone.
    #[must_use]
    pub fn label_with<F>(first: Vec<f64>, second: Vec<f64>, utility: F) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        let label = encode_preference(utility(&first), utility(&second));
        Self::new(first, second, label)
    }
}
