//! Trifecta (3連単) combination selection from rating tiers
//!
//! The field is first classified by its tier composition, then each shape
//! maps to one fixed construction rule:
//!
//! | Shape            | 1st          | 2nd          | 3rd                     |
//! |------------------|--------------|--------------|-------------------------|
//! | `TwinAces`       | first A1     | second A1    | lowest remaining boat   |
//! | `AceWithSupport` | the only A1  | first A2     | lowest remaining boat   |
//! | `Open`           | 3rd lowest   | 4th lowest   | 5th lowest (6+ boats)   |
//!
//! "First" always means first in participant order. Ties on the third leg
//! always go to the lowest boat number still unused.

use crate::models::{Combination, Participant, RatingTier};

/// Minimum field size for the open-race (upset) rule
pub const MIN_FIELD_SIZE: usize = 6;

/// Tier composition of a field, in rule priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Two or more A1 racers
    TwinAces { first: u8, second: u8 },
    /// Exactly one A1 and at least one A2
    AceWithSupport { ace: u8, support: u8 },
    /// No clear favorite
    Open,
}

impl FieldShape {
    pub fn classify(participants: &[Participant]) -> Self {
        let aces = positions_with_tier(participants, RatingTier::A1);
        let seconds = positions_with_tier(participants, RatingTier::A2);

        match (aces.as_slice(), seconds.first()) {
            ([first, second, ..], _) => FieldShape::TwinAces {
                first: *first,
                second: *second,
            },
            ([ace], Some(support)) => FieldShape::AceWithSupport {
                ace: *ace,
                support: *support,
            },
            _ => FieldShape::Open,
        }
    }
}

/// Pick the trifecta to bet on, or `None` when the race should be passed
///
/// # Examples
/// ```
/// use choiatsu::core::combination::select_combination;
/// use choiatsu::models::{Participant, RatingTier::*};
///
/// let field: Vec<Participant> = [A1, A2, B1, B1, B2, B2]
///     .iter()
///     .enumerate()
///     .map(|(i, tier)| Participant::new(i as u8 + 1, format!("racer{}", i + 1), *tier))
///     .collect();
/// assert_eq!(select_combination(&field).unwrap().to_string(), "1-2-3");
/// ```
pub fn select_combination(participants: &[Participant]) -> Option<Combination> {
    match FieldShape::classify(participants) {
        FieldShape::TwinAces { first, second } => favorite_combination(participants, first, second),
        FieldShape::AceWithSupport { ace, support } => {
            favorite_combination(participants, ace, support)
        }
        FieldShape::Open => upset_combination(participants),
    }
}

/// Fixed legs for first and second, lowest unused boat for third
fn favorite_combination(participants: &[Participant], first: u8, second: u8) -> Option<Combination> {
    let third = lowest_remaining(participants, &[first, second])?;
    Combination::new(first, second, third)
}

/// 3rd-4th-5th lowest boat numbers present; needs a full field
// TODO: replace with a tier-aware long-shot rule once payout history is tracked
fn upset_combination(participants: &[Participant]) -> Option<Combination> {
    if participants.len() < MIN_FIELD_SIZE {
        return None;
    }

    let mut positions: Vec<u8> = participants.iter().map(|p| p.position).collect();
    positions.sort_unstable();
    positions.dedup();

    match positions.get(2..5) {
        Some([a, b, c]) => Combination::new(*a, *b, *c),
        _ => None,
    }
}

fn positions_with_tier(participants: &[Participant], tier: RatingTier) -> Vec<u8> {
    participants
        .iter()
        .filter(|p| p.rating_tier == tier)
        .map(|p| p.position)
        .collect()
}

fn lowest_remaining(participants: &[Participant], used: &[u8]) -> Option<u8> {
    participants
        .iter()
        .map(|p| p.position)
        .filter(|position| !used.contains(position))
        .min()
}
