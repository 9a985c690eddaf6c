//! Runtime configuration
//!
//! Selection parameters travel as an explicit [`SelectionConfig`] value.
//! Service settings are read from the environment (and an optional `.env`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

/// Placeholder token shipped in the sample `.env`
const PLACEHOLDER_TOKEN: &str = "your_line_channel_access_token_here";

/// Parameters of one daily selection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum expected odds for a race to be considered
    pub min_odds: f64,
    /// Hard cap on bets produced per run
    pub max_bets_per_day: usize,
    /// Stake per bet in yen
    pub investment_per_bet: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_odds: 50.0,
            max_bets_per_day: 3,
            investment_per_bet: 1000,
        }
    }
}

impl SelectionConfig {
    /// Reject parameters no run can use: non-finite or negative odds
    /// threshold, zero stake
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_odds.is_finite() || self.min_odds < 0.0 {
            return Err(ConfigError::InvalidValue {
                var: "min_odds".to_string(),
                value: self.min_odds.to_string(),
            });
        }
        if self.investment_per_bet == 0 {
            return Err(ConfigError::InvalidValue {
                var: "investment_per_bet".to_string(),
                value: self.investment_per_bet.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// LINE Messaging API token; `None` means log-only notifications
    pub line_channel_access_token: Option<String>,
    pub records_path: PathBuf,
    pub scraper_delay_ms: u64,
    pub selection: SelectionConfig,
    pub host: String,
    pub port: u16,
    pub log_level: Level,
}

impl AppConfig {
    /// Load from process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SelectionConfig::default();

        let line_channel_access_token = lookup("LINE_CHANNEL_ACCESS_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != PLACEHOLDER_TOKEN);

        let selection = SelectionConfig {
            min_odds: parse_var(&lookup, "TARGET_ODDS_THRESHOLD", defaults.min_odds)?,
            max_bets_per_day: parse_var(&lookup, "MAX_RACES_PER_DAY", defaults.max_bets_per_day)?,
            investment_per_bet: parse_var(
                &lookup,
                "INVESTMENT_PER_BET",
                defaults.investment_per_bet,
            )?,
        };
        selection.validate()?;

        Ok(Self {
            line_channel_access_token,
            records_path: lookup("RECORDS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/records.json")),
            scraper_delay_ms: parse_var(&lookup, "SCRAPER_DELAY_MS", 2000)?,
            selection,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&lookup, "PORT", 8080)?,
            log_level: parse_var(&lookup, "LOG_LEVEL", Level::INFO)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: var.to_string(),
                    value: raw,
                })
        }
        _ => Ok(default),
    }
}
