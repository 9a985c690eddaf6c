//! Choiatsu - high-payout boat race picks
//!
//! This library provides:
//! - Candidate filtering, rating-tier combination selection and confidence scoring
//! - A capped daily bet selection pipeline
//! - Result reconciliation with outcome tiers
//! - Collaborators: boatrace.jp race source, LINE notifications, JSON record store
//!
//! # Example
//!
//! ```no_run
//! use choiatsu::config::SelectionConfig;
//! use choiatsu::core::select_bets;
//! use choiatsu::models::Race;
//!
//! let races: Vec<Race> = serde_json::from_str("[]").unwrap();
//! let selection = select_bets(&races, &SelectionConfig::default());
//! for bet in &selection.bets {
//!     println!("{} {} ({:.0}%)", bet.race.name, bet.combination, bet.confidence * 100.0);
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod notify;
pub mod runner;
pub mod source;
pub mod store;

// Scraper module (only available with scraper feature)
#[cfg(feature = "scraper")]
pub mod scraper;

// Re-export commonly used types
pub use config::{AppConfig, SelectionConfig};
pub use models::{
    Bet, BetType, Combination, Grade, OutcomeTier, Participant, PayoutEntry, PredictionRecord,
    Race, RaceResult, RatingTier,
};
pub use runner::DailyRunner;
