//! Record statistics
//!
//! Hit rate, payout and ROI over resolved prediction records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::PredictionRecord;

/// Aggregate statistics over stored records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStatistics {
    pub total_records: usize,
    pub resolved: usize,
    pub pending: usize,
    pub hits: usize,
    /// Hits / resolved (0-1)
    pub hit_rate: f64,
    pub total_payout: u64,
    /// Mean payout per hit
    pub average_payout: f64,
    /// Investment across resolved records
    pub total_investment: u64,
    pub net_profit: i64,
    pub roi: f64,
}

impl RecordStatistics {
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let resolved: Vec<&PredictionRecord> = records.iter().filter(|r| r.is_resolved()).collect();
        let hits = resolved.iter().filter(|r| r.is_hit == Some(true)).count();
        let total_payout: u64 = resolved.iter().filter_map(|r| r.payout_amount).sum();
        let total_investment: u64 = resolved.iter().map(|r| r.investment).sum();
        let net_profit = total_payout as i64 - total_investment as i64;

        Self {
            total_records: records.len(),
            resolved: resolved.len(),
            pending: records.len() - resolved.len(),
            hits,
            hit_rate: ratio(hits as f64, resolved.len() as f64),
            total_payout,
            average_payout: ratio(total_payout as f64, hits as f64),
            total_investment,
            net_profit,
            roi: ratio(net_profit as f64, total_investment as f64),
        }
    }
}

/// Per-venue breakdown of resolved records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueAnalysis {
    pub venue: String,
    pub bets: usize,
    pub hits: usize,
    pub hit_rate: f64,
    pub investment: u64,
    pub payout: u64,
    pub roi: f64,
}

/// Analyze resolved records by venue, sorted by venue name
pub fn analyze_by_venue(records: &[PredictionRecord]) -> Vec<VenueAnalysis> {
    let mut grouped: HashMap<&str, Vec<&PredictionRecord>> = HashMap::new();
    for record in records.iter().filter(|r| r.is_resolved()) {
        grouped.entry(record.venue.as_str()).or_default().push(record);
    }

    let mut results: Vec<VenueAnalysis> = grouped
        .into_iter()
        .map(|(venue, group)| {
            let bets = group.len();
            let hits = group.iter().filter(|r| r.is_hit == Some(true)).count();
            let investment: u64 = group.iter().map(|r| r.investment).sum();
            let payout: u64 = group.iter().filter_map(|r| r.payout_amount).sum();

            VenueAnalysis {
                venue: venue.to_string(),
                bets,
                hits,
                hit_rate: ratio(hits as f64, bets as f64),
                investment,
                payout,
                roi: ratio(payout as f64 - investment as f64, investment as f64),
            }
        })
        .collect();

    results.sort_by(|a, b| a.venue.cmp(&b.venue));
    results
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
