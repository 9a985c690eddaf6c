//! Candidate race filtering

use crate::models::Race;

/// Races whose expected odds reach `min_odds`, in input order
///
/// Races with non-numeric odds never qualify.
///
/// # Examples
/// ```
/// use choiatsu::core::filter::filter_candidates;
/// let kept = filter_candidates(&[], 50.0);
/// assert!(kept.is_empty());
/// ```
pub fn filter_candidates(races: &[Race], min_odds: f64) -> Vec<&Race> {
    races
        .iter()
        .filter(|race| race.expected_odds >= min_odds)
        .collect()
}
