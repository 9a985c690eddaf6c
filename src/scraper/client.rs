//! HTTP client with rate limiting for boatrace.jp

use super::{
    date_from_key, date_key, index_url, parse_race_entries, parse_race_result, parse_schedule,
    parse_trifecta_odds, RaceKey, ScrapedRaceInfo, ScrapedTrifectaOdds, TodaySchedule,
};
use crate::models::{Race, RaceResult};
use crate::source::{RaceSource, SourceError};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Scraper errors
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    #[error("Giving up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("No odds found for race")]
    NoOddsFound,
}

/// Scraper configuration
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Delay between requests in milliseconds
    pub delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Max retry attempts
    pub max_retries: u32,
    /// User agent string
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            timeout_secs: 30,
            max_retries: 3,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// boatrace.jp race source with rate limiting
pub struct BoatraceScraper {
    client: reqwest::Client,
    config: ScraperConfig,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl BoatraceScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// Wait for rate limit
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let delay = Duration::from_millis(self.config.delay_ms);

        if let Some(elapsed) = last.map(|t| t.elapsed()) {
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Fetch HTML page with rate limiting and retry
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        for attempt in 0..self.config.max_retries {
            self.wait_for_rate_limit().await;

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.text().await.map_err(ScraperError::RequestFailed);
                }
                Ok(response) => {
                    tracing::warn!(
                        "Request failed with status {} (attempt {}/{})",
                        response.status(),
                        attempt + 1,
                        self.config.max_retries
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.config.max_retries,
                        e
                    );
                }
            }

            if attempt + 1 < self.config.max_retries {
                let backoff = Duration::from_millis(self.config.delay_ms * (attempt as u64 + 1));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(ScraperError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries,
        })
    }

    /// Scrape the day's race schedule (active stadiums)
    pub async fn scrape_schedule(&self, date: u32) -> Result<TodaySchedule, ScraperError> {
        let url = index_url(date);
        tracing::info!("Scraping schedule: {}", url);

        let html = self.fetch_page(&url).await?;
        parse_schedule(&html, date)
    }

    /// Scrape race entries for a single race
    pub async fn scrape_race_entries(&self, key: RaceKey) -> Result<ScrapedRaceInfo, ScraperError> {
        let url = key.racelist_url();
        tracing::info!("Scraping entries: {}", url);

        let html = self.fetch_page(&url).await?;
        parse_race_entries(&html, key.date, key.stadium_code, key.race_no)
    }

    /// Scrape trifecta odds for a single race
    pub async fn scrape_trifecta(&self, key: RaceKey) -> Result<ScrapedTrifectaOdds, ScraperError> {
        let url = key.trifecta_url();
        tracing::info!("Scraping trifecta: {}", url);

        let html = self.fetch_page(&url).await?;
        let odds = parse_trifecta_odds(&html)?;

        if odds.is_empty() {
            return Err(ScraperError::NoOddsFound);
        }

        // 6 * 5 * 4 combinations
        if odds.len() != 120 {
            tracing::warn!("Expected 120 combinations, got {}", odds.len());
        }

        let trifecta: HashMap<String, f64> = odds
            .into_iter()
            .map(|((first, second, third), v)| (format!("{}-{}-{}", first, second, third), v))
            .collect();

        Ok(ScrapedTrifectaOdds {
            date: key.date,
            stadium_code: key.stadium_code,
            race_no: key.race_no,
            scraped_at: Utc::now().to_rfc3339(),
            trifecta,
        })
    }

    /// Scrape the posted result of a single race
    pub async fn scrape_result(&self, key: RaceKey) -> Result<Option<RaceResult>, ScraperError> {
        let url = key.result_url();
        tracing::info!("Scraping result: {}", url);

        let date = date_from_key(key.date)
            .ok_or_else(|| ScraperError::ParseError(format!("Invalid date key {}", key.date)))?;

        let html = self.fetch_page(&url).await?;
        parse_race_result(&html, date, &key.race_name())
    }

    /// Scrape entries and odds for one race and assemble a [`Race`]
    pub async fn scrape_race(
        &self,
        date: NaiveDate,
        key: RaceKey,
        grade: crate::models::Grade,
    ) -> Result<Race, ScraperError> {
        let info = self.scrape_race_entries(key).await?;
        let odds = self.scrape_trifecta(key).await?;
        let expected_odds = odds.median_odds().ok_or(ScraperError::NoOddsFound)?;

        Ok(build_race(date, key, grade, info, expected_odds))
    }
}

/// Combine the racelist page and odds into a [`Race`]
///
/// The racelist heading grade wins over the schedule's when present.
fn build_race(
    date: NaiveDate,
    key: RaceKey,
    schedule_grade: crate::models::Grade,
    info: ScrapedRaceInfo,
    expected_odds: f64,
) -> Race {
    Race {
        date,
        name: key.race_name(),
        venue: key.venue().to_string(),
        number: key.race_no,
        start_time: info.start_time.unwrap_or_default(),
        grade: info.grade.unwrap_or(schedule_grade),
        expected_odds,
        url: key.racelist_url(),
        participants: info.participants,
    }
}

#[async_trait]
impl RaceSource for BoatraceScraper {
    async fn fetch_upcoming_races(&self, date: NaiveDate) -> Result<Vec<Race>, SourceError> {
        let schedule = self.scrape_schedule(date_key(date)).await?;
        tracing::info!("{} stadiums active on {}", schedule.stadiums.len(), date);

        let mut races = Vec::new();
        for stadium in &schedule.stadiums {
            for race_no in 1..=stadium.total_races {
                let key = RaceKey::new(schedule.date, stadium.code, race_no);
                match self.scrape_race(date, key, stadium.grade).await {
                    Ok(race) => races.push(race),
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", key.race_name(), e);
                    }
                }
            }
        }

        Ok(races)
    }

    async fn fetch_result(&self, race_url: &str) -> Result<Option<RaceResult>, SourceError> {
        let key =
            RaceKey::from_url(race_url).ok_or_else(|| SourceError::InvalidUrl(race_url.to_string()))?;
        Ok(self.scrape_result(key).await?)
    }
}
