//! Race data source contract

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Race, RaceResult};

/// Race source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[cfg(feature = "scraper")]
    #[error(transparent)]
    Scraper(#[from] crate::scraper::ScraperError),

    #[error("Unrecognised race URL: {0}")]
    InvalidUrl(String),

    #[error("Race source unavailable: {0}")]
    Unavailable(String),
}

/// Where races and posted results come from
///
/// An empty race list means "no candidates today", not a failure.
#[async_trait]
pub trait RaceSource: Send + Sync {
    /// All races scheduled on `date`
    async fn fetch_upcoming_races(&self, date: NaiveDate) -> Result<Vec<Race>, SourceError>;

    /// Posted result for the race at `race_url`; `None` until published
    async fn fetch_result(&self, race_url: &str) -> Result<Option<RaceResult>, SourceError>;
}
