//! Confidence scoring for a candidate bet
//!
//! Starts from a neutral 0.5, rewards graded races, rewards moderately high
//! odds (50x-80x) and penalises long shots above 100x.

use crate::models::{Grade, Race};

pub const BASE_CONFIDENCE: f64 = 0.5;

const G1_BONUS: f64 = 0.2;
const G2_BONUS: f64 = 0.1;
const SWEET_SPOT_BONUS: f64 = 0.1;
const LONG_SHOT_PENALTY: f64 = 0.1;
const LONG_SHOT_ODDS: f64 = 100.0;
const SWEET_SPOT_MIN: f64 = 50.0;
const SWEET_SPOT_MAX: f64 = 80.0;

/// Confidence in [0.0, 1.0] for betting on `race`
pub fn score(race: &Race) -> f64 {
    score_parts(race.grade, race.expected_odds)
}

/// Confidence from grade and expected odds alone
///
/// # Examples
/// ```
/// use choiatsu::core::confidence::score_parts;
/// use choiatsu::models::Grade;
/// let c = score_parts(Grade::G3, 65.2);
/// assert!((c - 0.6).abs() < 1e-9);
/// ```
pub fn score_parts(grade: Grade, expected_odds: f64) -> f64 {
    let grade_bonus = match grade {
        Grade::G1 => G1_BONUS,
        Grade::G2 => G2_BONUS,
        Grade::G3 | Grade::Ungraded => 0.0,
    };

    let odds_adjustment = if expected_odds > LONG_SHOT_ODDS {
        -LONG_SHOT_PENALTY
    } else if (SWEET_SPOT_MIN..=SWEET_SPOT_MAX).contains(&expected_odds) {
        SWEET_SPOT_BONUS
    } else {
        0.0
    };

    (BASE_CONFIDENCE + grade_bonus + odds_adjustment).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g3_sweet_spot() {
        assert!((score_parts(Grade::G3, 65.2) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_g1_sweet_spot() {
        assert!((score_parts(Grade::G1, 78.5) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_g2_outside_sweet_spot() {
        assert!((score_parts(Grade::G2, 42.8) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_long_shot_penalty() {
        assert!((score_parts(Grade::Ungraded, 150.0) - 0.4).abs() < 1e-9);
        assert!((score_parts(Grade::G1, 150.0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_sweet_spot_bounds_inclusive() {
        assert!((score_parts(Grade::Ungraded, 50.0) - 0.6).abs() < 1e-9);
        assert!((score_parts(Grade::Ungraded, 80.0) - 0.6).abs() < 1e-9);
        assert!((score_parts(Grade::Ungraded, 80.1) - 0.5).abs() < 1e-9);
        assert!((score_parts(Grade::Ungraded, 100.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_always_within_unit_interval() {
        let grades = [Grade::G1, Grade::G2, Grade::G3, Grade::Ungraded];
        let odds = [0.0, 1.0, 49.9, 50.0, 65.0, 80.0, 100.0, 100.1, 1e6, f64::NAN];
        for grade in grades {
            for o in odds {
                let c = score_parts(grade, o);
                assert!((0.0..=1.0).contains(&c), "{:?} {} -> {}", grade, o, c);
            }
        }
    }
}
