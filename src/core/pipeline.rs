//! Daily bet selection
//!
//! Filters candidate races, derives a combination and a confidence per race
//! and stops as soon as the daily cap is reached. A malformed race is
//! skipped and reported, never fatal to the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::combination::select_combination;
use super::confidence::score;
use super::filter::filter_candidates;
use crate::config::SelectionConfig;
use crate::error::SelectionError;
use crate::models::{Bet, BetType, Race};

/// Why a candidate race produced no bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Race data failed validation
    Malformed(String),
    /// No combination rule applies
    NoCombination,
}

/// Candidate race that was passed over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRace {
    pub race_name: String,
    pub reason: SkipReason,
}

/// Outcome of one selection run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    pub bets: Vec<Bet>,
    pub skipped: Vec<SkippedRace>,
}

/// Check the fields the selection rules rely on
pub fn validate_race(race: &Race) -> Result<(), SelectionError> {
    if race.name.trim().is_empty() {
        return Err(SelectionError::MissingName);
    }

    if !race.expected_odds.is_finite() || race.expected_odds <= 0.0 {
        return Err(SelectionError::InvalidOdds {
            race: race.name.clone(),
            odds: race.expected_odds,
        });
    }

    if race.participants.is_empty() {
        return Err(SelectionError::MalformedParticipants {
            race: race.name.clone(),
            reason: "no participants".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(race.participants.len());
    for participant in &race.participants {
        if participant.position == 0 {
            return Err(SelectionError::MalformedParticipants {
                race: race.name.clone(),
                reason: "position 0".to_string(),
            });
        }
        if !seen.insert(participant.position) {
            return Err(SelectionError::MalformedParticipants {
                race: race.name.clone(),
                reason: format!("duplicate position {}", participant.position),
            });
        }
    }

    Ok(())
}

/// Select today's bets, stamped with the current time
pub fn select_bets(races: &[Race], config: &SelectionConfig) -> Selection {
    select_bets_at(races, config, Utc::now())
}

/// Select bets with an explicit creation timestamp
pub fn select_bets_at(
    races: &[Race],
    config: &SelectionConfig,
    created_at: DateTime<Utc>,
) -> Selection {
    let candidates = filter_candidates(races, config.min_odds);
    info!(
        "Bet selection: {} races, {} above {}x",
        races.len(),
        candidates.len(),
        config.min_odds
    );

    let mut selection = Selection::default();

    for race in candidates {
        if selection.bets.len() >= config.max_bets_per_day {
            debug!("Daily cap of {} reached", config.max_bets_per_day);
            break;
        }

        if let Err(e) = validate_race(race) {
            warn!("Skipping race: {}", e);
            selection.skipped.push(SkippedRace {
                race_name: race.name.clone(),
                reason: SkipReason::Malformed(e.to_string()),
            });
            continue;
        }

        let Some(combination) = select_combination(&race.participants) else {
            debug!("No combination for {}", race.name);
            selection.skipped.push(SkippedRace {
                race_name: race.name.clone(),
                reason: SkipReason::NoCombination,
            });
            continue;
        };

        let confidence = score(race);
        let investment = config.investment_per_bet;

        debug!(
            "Selected {} {} (odds {}, confidence {:.2})",
            race.name, combination, race.expected_odds, confidence
        );

        selection.bets.push(Bet {
            race: Arc::new(race.clone()),
            combination,
            bet_type: BetType::Trifecta,
            investment,
            expected_return: investment as f64 * race.expected_odds,
            confidence,
            created_at,
        });
    }

    info!(
        "Bet selection complete: {} bets, {} skipped",
        selection.bets.len(),
        selection.skipped.len()
    );

    selection
}
