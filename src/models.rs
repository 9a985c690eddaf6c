use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SelectionConfig;
use crate::core::pipeline::SkippedRace;
use crate::runner::RunFailure;
use crate::store::{RecordStatistics, VenueAnalysis};

/// Racer rating class (A1 > A2 > B1 > B2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingTier {
    A1,
    A2,
    B1,
    B2,
}

impl RatingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingTier::A1 => "A1",
            RatingTier::A2 => "A2",
            RatingTier::B1 => "B1",
            RatingTier::B2 => "B2",
        }
    }
}

impl FromStr for RatingTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A1" => Ok(RatingTier::A1),
            "A2" => Ok(RatingTier::A2),
            "B1" => Ok(RatingTier::B1),
            "B2" => Ok(RatingTier::B2),
            other => Err(format!("unknown rating tier: {}", other)),
        }
    }
}

/// Race grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Grade {
    G1,
    G2,
    G3,
    #[default]
    #[serde(rename = "UNGRADED")]
    Ungraded,
}

impl Grade {
    /// Map a grade label from the schedule page. SG is folded into G1.
    pub fn from_label(label: &str) -> Self {
        if label.contains("SG") || label.contains("G1") {
            Grade::G1
        } else if label.contains("G2") {
            Grade::G2
        } else if label.contains("G3") {
            Grade::G3
        } else {
            Grade::Ungraded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::G1 => "G1",
            Grade::G2 => "G2",
            Grade::G3 => "G3",
            Grade::Ungraded => "UNGRADED",
        }
    }
}

/// One boat in a race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub position: u8,
    pub name: String,
    pub rating_tier: RatingTier,
}

impl Participant {
    pub fn new(position: u8, name: impl Into<String>, rating_tier: RatingTier) -> Self {
        Self {
            position,
            name: name.into(),
            rating_tier,
        }
    }
}

/// Race as delivered by the race source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub date: NaiveDate,
    /// Stable per-day key, e.g. "住之江12R"
    pub name: String,
    pub venue: String,
    pub number: u8,
    pub start_time: String,
    #[serde(default)]
    pub grade: Grade,
    pub expected_odds: f64,
    pub url: String,
    pub participants: Vec<Participant>,
}

impl Race {
    /// Race key used for reconciliation: venue followed by the race number
    pub fn race_name(venue: &str, number: u8) -> String {
        format!("{}{}R", venue, number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid combination: {0}")]
pub struct InvalidCombination(pub String);

/// Exact-order triple of finishing positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Combination([u8; 3]);

impl Combination {
    /// Build a combination; positions must be non-zero and distinct
    pub fn new(first: u8, second: u8, third: u8) -> Option<Self> {
        let distinct = first != second && second != third && first != third;
        if distinct && first > 0 && second > 0 && third > 0 {
            Some(Self([first, second, third]))
        } else {
            None
        }
    }

    pub fn positions(&self) -> [u8; 3] {
        self.0
    }

    pub fn first(&self) -> u8 {
        self.0[0]
    }

    pub fn second(&self) -> u8 {
        self.0[1]
    }

    pub fn third(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for Combination {
    type Err = InvalidCombination;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u8> = s
            .split('-')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| InvalidCombination(s.to_string()))?;

        if parts.len() != 3 {
            return Err(InvalidCombination(s.to_string()));
        }

        Combination::new(parts[0], parts[1], parts[2]).ok_or_else(|| InvalidCombination(s.to_string()))
    }
}

impl TryFrom<String> for Combination {
    type Error = InvalidCombination;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Combination> for String {
    fn from(value: Combination) -> Self {
        value.to_string()
    }
}

/// Posted payout kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BetType {
    /// 3連単, exact-order triple (the tracked kind)
    #[serde(rename = "3連単")]
    Trifecta,
    #[serde(rename = "3連複")]
    Trio,
    #[serde(rename = "2連単")]
    Exacta,
    #[serde(rename = "2連複")]
    Quinella,
    #[serde(rename = "拡連複")]
    Wide,
    #[serde(rename = "単勝")]
    Win,
    #[serde(rename = "複勝")]
    Place,
}

impl BetType {
    pub fn label(&self) -> &'static str {
        match self {
            BetType::Trifecta => "3連単",
            BetType::Trio => "3連複",
            BetType::Exacta => "2連単",
            BetType::Quinella => "2連複",
            BetType::Wide => "拡連複",
            BetType::Win => "単勝",
            BetType::Place => "複勝",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "3連単" => Some(BetType::Trifecta),
            "3連複" => Some(BetType::Trio),
            "2連単" => Some(BetType::Exacta),
            "2連複" => Some(BetType::Quinella),
            "拡連複" => Some(BetType::Wide),
            "単勝" => Some(BetType::Win),
            "複勝" => Some(BetType::Place),
            _ => None,
        }
    }
}

/// A selected wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub race: Arc<Race>,
    pub combination: Combination,
    pub bet_type: BetType,
    pub investment: u64,
    pub expected_return: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Payout for one bet kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutEntry {
    pub combination: Vec<u8>,
    pub odds: f64,
    pub amount: u64,
}

/// Posted result of a completed race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub date: NaiveDate,
    pub race_name: String,
    pub finish_order: Vec<u8>,
    pub payouts: BTreeMap<BetType, PayoutEntry>,
}

impl RaceResult {
    /// Payout for the exact-order triple, if posted
    pub fn trifecta_payout(&self) -> Option<&PayoutEntry> {
        self.payouts.get(&BetType::Trifecta)
    }

    /// The result as seen by one ticket: the trifecta entry is dropped
    /// unless it pays out on `combination`.
    pub fn for_ticket(&self, combination: &Combination) -> RaceResult {
        let mut result = self.clone();
        let pays = result
            .trifecta_payout()
            .is_some_and(|entry| entry.combination[..] == combination.positions()[..]);

        if !pays {
            result.payouts.remove(&BetType::Trifecta);
        }
        result
    }
}

/// Durable join of a bet and its eventual result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub race_name: String,
    pub venue: String,
    pub race_number: u8,
    pub start_time: String,
    pub grade: Grade,
    pub expected_odds: f64,
    pub combination: Combination,
    pub investment: u64,
    pub result_order: Option<Vec<u8>>,
    pub is_hit: Option<bool>,
    pub payout_amount: Option<u64>,
    pub notified_at: DateTime<Utc>,
    pub race_url: String,
    #[serde(default)]
    pub note: String,
}

impl PredictionRecord {
    /// Open record for a freshly selected bet
    pub fn from_bet(bet: &Bet, notified_at: DateTime<Utc>) -> Self {
        let race = &bet.race;
        Self {
            date: race.date,
            race_name: race.name.clone(),
            venue: race.venue.clone(),
            race_number: race.number,
            start_time: race.start_time.clone(),
            grade: race.grade,
            expected_odds: race.expected_odds,
            combination: bet.combination,
            investment: bet.investment,
            result_order: None,
            is_hit: None,
            payout_amount: None,
            notified_at,
            race_url: race.url.clone(),
            note: String::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.is_hit.is_some()
    }

    pub fn outcome_tier(&self) -> Option<OutcomeTier> {
        self.payout_amount.map(OutcomeTier::from_amount)
    }

    /// Apply a resolution in place
    pub fn apply(&mut self, resolution: &Resolution) {
        self.result_order = Some(resolution.finish_order.clone());
        self.is_hit = Some(resolution.is_hit);
        self.payout_amount = Some(resolution.payout_amount);
    }
}

/// Result fields written back to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub finish_order: Vec<u8>,
    pub is_hit: bool,
    pub payout_amount: u64,
}

impl Resolution {
    pub fn from_record(record: &PredictionRecord) -> Option<Self> {
        Some(Self {
            finish_order: record.result_order.clone()?,
            is_hit: record.is_hit?,
            payout_amount: record.payout_amount?,
        })
    }
}

/// Presentation bucket derived from a payout amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTier {
    MajorWin,
    Win,
    SmallWin,
    Miss,
}

impl OutcomeTier {
    pub const MAJOR_WIN_THRESHOLD: u64 = 10_000;
    pub const WIN_THRESHOLD: u64 = 3_000;

    pub fn from_amount(amount: u64) -> Self {
        if amount >= Self::MAJOR_WIN_THRESHOLD {
            OutcomeTier::MajorWin
        } else if amount >= Self::WIN_THRESHOLD {
            OutcomeTier::Win
        } else if amount > 0 {
            OutcomeTier::SmallWin
        } else {
            OutcomeTier::Miss
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutcomeTier::MajorWin => "major win",
            OutcomeTier::Win => "win",
            OutcomeTier::SmallWin => "small win",
            OutcomeTier::Miss => "miss",
        }
    }
}

/// Join finishing positions as "1-3-2"
pub fn format_order(order: &[u8]) -> String {
    order
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

/// Selection request
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectRequest {
    pub races: Vec<Race>,
    #[serde(default)]
    pub config: Option<SelectionConfig>,
}

/// Selection response
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectResponse {
    pub bets: Vec<Bet>,
    pub skipped: Vec<SkippedRace>,
    /// Records that reached the store
    pub records: Vec<PredictionRecord>,
    #[serde(default)]
    pub failures: Vec<RunFailure>,
}

/// Reconciliation request
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub result: RaceResult,
}

/// Reconciliation response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub record: PredictionRecord,
    pub outcome_tier: OutcomeTier,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub open_records: usize,
}

/// Query for record listings
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecordsQuery {
    /// Only the most recent N records
    pub limit: Option<usize>,
}

/// Statistics response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub statistics: RecordStatistics,
    pub venues: Vec<VenueAnalysis>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_rejects_duplicates() {
        assert!(Combination::new(1, 2, 3).is_some());
        assert!(Combination::new(1, 1, 3).is_none());
        assert!(Combination::new(0, 2, 3).is_none());
    }

    #[test]
    fn test_combination_parse_and_display() {
        let combo: Combination = "1-3-2".parse().unwrap();
        assert_eq!(combo.positions(), [1, 3, 2]);
        assert_eq!(combo.to_string(), "1-3-2");
        assert!("1-2".parse::<Combination>().is_err());
        assert!("1-2-x".parse::<Combination>().is_err());
    }

    #[test]
    fn test_combination_serializes_as_string() {
        let combo = Combination::new(3, 4, 5).unwrap();
        assert_eq!(serde_json::to_string(&combo).unwrap(), "\"3-4-5\"");
        let back: Combination = serde_json::from_str("\"3-4-5\"").unwrap();
        assert_eq!(back, combo);
    }

    #[test]
    fn test_grade_from_label() {
        assert_eq!(Grade::from_label("SG"), Grade::G1);
        assert_eq!(Grade::from_label("G1"), Grade::G1);
        assert_eq!(Grade::from_label("G2"), Grade::G2);
        assert_eq!(Grade::from_label("G3"), Grade::G3);
        assert_eq!(Grade::from_label("一般"), Grade::Ungraded);
    }

    #[test]
    fn test_grade_serde_names() {
        assert_eq!(serde_json::to_string(&Grade::Ungraded).unwrap(), "\"UNGRADED\"");
        let g: Grade = serde_json::from_str("\"G2\"").unwrap();
        assert_eq!(g, Grade::G2);
    }

    #[test]
    fn test_rating_tier_parse() {
        assert_eq!("A1".parse::<RatingTier>(), Ok(RatingTier::A1));
        assert_eq!(" B2 ".parse::<RatingTier>(), Ok(RatingTier::B2));
        assert!("A3".parse::<RatingTier>().is_err());
    }

    #[test]
    fn test_bet_type_labels() {
        assert_eq!(BetType::from_label("3連単"), Some(BetType::Trifecta));
        assert_eq!(BetType::from_label("拡連複"), Some(BetType::Wide));
        assert_eq!(BetType::from_label("unknown"), None);
        assert_eq!(BetType::Trio.label(), "3連複");
    }

    #[test]
    fn test_payout_map_uses_japanese_keys() {
        let mut payouts = BTreeMap::new();
        payouts.insert(
            BetType::Trifecta,
            PayoutEntry {
                combination: vec![1, 3, 2],
                odds: 45.6,
                amount: 4560,
            },
        );
        let json = serde_json::to_string(&payouts).unwrap();
        assert!(json.contains("\"3連単\""));
    }

    #[test]
    fn test_outcome_tier_thresholds() {
        assert_eq!(OutcomeTier::from_amount(0), OutcomeTier::Miss);
        assert_eq!(OutcomeTier::from_amount(1), OutcomeTier::SmallWin);
        assert_eq!(OutcomeTier::from_amount(2_999), OutcomeTier::SmallWin);
        assert_eq!(OutcomeTier::from_amount(3_000), OutcomeTier::Win);
        assert_eq!(OutcomeTier::from_amount(4_560), OutcomeTier::Win);
        assert_eq!(OutcomeTier::from_amount(9_999), OutcomeTier::Win);
        assert_eq!(OutcomeTier::from_amount(10_000), OutcomeTier::MajorWin);
    }

    #[test]
    fn test_format_order() {
        assert_eq!(format_order(&[1, 3, 2]), "1-3-2");
        assert_eq!(format_order(&[]), "");
    }

    #[test]
    fn test_result_for_ticket() {
        let mut payouts = BTreeMap::new();
        payouts.insert(
            BetType::Trifecta,
            PayoutEntry {
                combination: vec![1, 3, 2],
                odds: 45.6,
                amount: 4560,
            },
        );
        let result = RaceResult {
            date: NaiveDate::from_ymd_opt(2024, 12, 23).unwrap(),
            race_name: "住之江12R".to_string(),
            finish_order: vec![1, 3, 2, 4, 5, 6],
            payouts,
        };

        let winning = Combination::new(1, 3, 2).unwrap();
        assert_eq!(result.for_ticket(&winning).trifecta_payout().map(|e| e.amount), Some(4560));

        let losing = Combination::new(1, 2, 3).unwrap();
        let seen = result.for_ticket(&losing);
        assert!(seen.trifecta_payout().is_none());
        assert_eq!(seen.finish_order, result.finish_order);
    }

    #[test]
    fn test_race_name() {
        assert_eq!(Race::race_name("住之江", 12), "住之江12R");
    }
}
