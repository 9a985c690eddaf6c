//! Web scraper for boatrace.jp
//!
//! Builds [`Race`](crate::models::Race) values from the schedule, racelist
//! and trifecta (3連単) odds pages, and [`RaceResult`](crate::models::RaceResult)
//! values from the raceresult page.
//!
//! # Example
//!
//! ```no_run
//! use choiatsu::scraper::{BoatraceScraper, ScraperConfig};
//! use choiatsu::source::RaceSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scraper = BoatraceScraper::new(ScraperConfig::default())?;
//!
//!     let date = chrono::NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();
//!     let races = scraper.fetch_upcoming_races(date).await?;
//!     println!("Found {} races", races.len());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod entries;
mod result;
mod schedule;
mod trifecta;

pub use client::{BoatraceScraper, ScraperConfig, ScraperError};
pub use entries::{parse_race_entries, ScrapedRaceInfo};
pub use result::parse_race_result;
pub use schedule::{parse_schedule, ActiveStadium, TodaySchedule};
pub use trifecta::parse_trifecta_odds;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const RACELIST_URL: &str = "https://www.boatrace.jp/owpc/pc/race/racelist";
const RACERESULT_URL: &str = "https://www.boatrace.jp/owpc/pc/race/raceresult";
const TRIFECTA_URL: &str = "https://www.boatrace.jp/owpc/pc/race/odds3t";
const INDEX_URL: &str = "https://www.boatrace.jp/owpc/pc/race/index";

/// Identifies one race on the site: (YYYYMMDD, stadium code, race number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RaceKey {
    pub date: u32,
    pub stadium_code: u8,
    pub race_no: u8,
}

impl RaceKey {
    pub fn new(date: u32, stadium_code: u8, race_no: u8) -> Self {
        Self {
            date,
            stadium_code,
            race_no,
        }
    }

    /// Parse the `rno`, `jcd` and `hd` query parameters of a race page URL
    pub fn from_url(url: &str) -> Option<Self> {
        let race_no = query_number(url, "rno")?;
        let stadium_code = query_number(url, "jcd")?;
        let date = query_number(url, "hd")?;

        Some(Self {
            date: u32::try_from(date).ok()?,
            stadium_code: u8::try_from(stadium_code).ok()?,
            race_no: u8::try_from(race_no).ok()?,
        })
    }

    fn query(&self) -> String {
        format!(
            "rno={}&jcd={:02}&hd={}",
            self.race_no, self.stadium_code, self.date
        )
    }

    pub fn racelist_url(&self) -> String {
        format!("{}?{}", RACELIST_URL, self.query())
    }

    pub fn result_url(&self) -> String {
        format!("{}?{}", RACERESULT_URL, self.query())
    }

    pub fn trifecta_url(&self) -> String {
        format!("{}?{}", TRIFECTA_URL, self.query())
    }

    pub fn venue(&self) -> &'static str {
        get_stadium_name(self.stadium_code)
    }

    /// Race name used as the reconciliation key, e.g. "住之江12R"
    pub fn race_name(&self) -> String {
        crate::models::Race::race_name(self.venue(), self.race_no)
    }

    pub fn naive_date(&self) -> Option<NaiveDate> {
        date_from_key(self.date)
    }
}

/// Schedule page URL for a date
pub fn index_url(date: u32) -> String {
    format!("{}?hd={}", INDEX_URL, date)
}

/// Date as the site's `hd` parameter (YYYYMMDD)
pub fn date_key(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

pub fn date_from_key(key: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((key / 10_000) as i32, (key / 100) % 100, key % 100)
}

/// Numeric value of `name=` in a query string
fn query_number(url: &str, name: &str) -> Option<u64> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or(url);
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            value.parse::<u64>().ok()
        } else {
            None
        }
    })
}

/// Trifecta odds data for a single race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedTrifectaOdds {
    pub date: u32,
    pub stadium_code: u8,
    pub race_no: u8,
    pub scraped_at: String,
    /// Odds map: key = "first-second-third" (e.g., "1-2-3"), value = odds
    pub trifecta: HashMap<String, f64>,
}

impl ScrapedTrifectaOdds {
    /// Get odds for a specific combination
    pub fn get(&self, first: u8, second: u8, third: u8) -> Option<f64> {
        let key = format!("{}-{}-{}", first, second, third);
        self.trifecta.get(&key).copied()
    }

    /// Median of the posted odds, used as the race's expected odds
    ///
    /// Returns `None` when nothing is posted.
    pub fn median_odds(&self) -> Option<f64> {
        let mut values: Vec<f64> = self
            .trifecta
            .values()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();

        if values.is_empty() {
            return None;
        }

        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;

        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }
}

/// Stadium codes and names
pub fn get_stadium_name(code: u8) -> &'static str {
    match code {
        1 => "桐生",
        2 => "戸田",
        3 => "江戸川",
        4 => "平和島",
        5 => "多摩川",
        6 => "浜名湖",
        7 => "蒲郡",
        8 => "常滑",
        9 => "津",
        10 => "三国",
        11 => "びわこ",
        12 => "住之江",
        13 => "尼崎",
        14 => "鳴門",
        15 => "丸亀",
        16 => "児島",
        17 => "宮島",
        18 => "徳山",
        19 => "下関",
        20 => "若松",
        21 => "芦屋",
        22 => "福岡",
        23 => "唐津",
        24 => "大村",
        _ => "不明",
    }
}

/// Boat number from an `is-boatColorN` class
fn boat_number_from_classes(element: &::scraper::ElementRef) -> Option<u8> {
    element.value().classes().find_map(|class| {
        class
            .strip_prefix("is-boatColor")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=6).contains(n))
    })
}

/// Boat number from an element's text (half- or full-width digit)
fn boat_number_from_text(element: &::scraper::ElementRef) -> Option<u8> {
    let text: String = element.text().collect::<String>();
    parse_small_number(&text).filter(|n| (1..=6).contains(n))
}

/// Parse a short number written with ASCII or full-width digits
fn parse_small_number(text: &str) -> Option<u8> {
    let digits: String = text
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect();

    digits.parse::<u8>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trifecta_odds_get() {
        let mut trifecta = HashMap::new();
        trifecta.insert("1-2-3".to_string(), 25.5);

        let odds = ScrapedTrifectaOdds {
            date: 20241230,
            stadium_code: 23,
            race_no: 1,
            scraped_at: "2024-12-30T10:00:00".to_string(),
            trifecta,
        };

        assert_eq!(odds.get(1, 2, 3), Some(25.5));
        assert_eq!(odds.get(1, 2, 4), None);
    }

    #[test]
    fn test_median_odds() {
        let mut trifecta = HashMap::new();
        for (i, v) in [10.0, 80.0, 40.0, 120.0].iter().enumerate() {
            trifecta.insert(format!("1-2-{}", i + 3), *v);
        }
        let mut odds = ScrapedTrifectaOdds {
            date: 20241230,
            stadium_code: 23,
            race_no: 1,
            scraped_at: String::new(),
            trifecta,
        };
        assert_eq!(odds.median_odds(), Some(60.0));

        odds.trifecta.insert("2-1-3".to_string(), 500.0);
        assert_eq!(odds.median_odds(), Some(80.0));

        odds.trifecta.clear();
        assert_eq!(odds.median_odds(), None);
    }

    #[test]
    fn test_race_key_urls() {
        let key = RaceKey::new(20241223, 12, 12);
        assert_eq!(
            key.racelist_url(),
            "https://www.boatrace.jp/owpc/pc/race/racelist?rno=12&jcd=12&hd=20241223"
        );
        assert_eq!(
            key.result_url(),
            "https://www.boatrace.jp/owpc/pc/race/raceresult?rno=12&jcd=12&hd=20241223"
        );
        assert!(RaceKey::new(20241230, 5, 1).trifecta_url().contains("jcd=05"));
    }

    #[test]
    fn test_race_key_from_url() {
        let key = RaceKey::from_url(
            "https://www.boatrace.jp/owpc/pc/race/racelist?rno=12&jcd=06&hd=20241223",
        )
        .unwrap();
        assert_eq!(key, RaceKey::new(20241223, 6, 12));
        assert_eq!(key.race_name(), "浜名湖12R");
        assert!(RaceKey::from_url("https://example.com/?rno=1").is_none());
    }

    #[test]
    fn test_date_key_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 23).unwrap();
        assert_eq!(date_key(date), 20241223);
        assert_eq!(date_from_key(20241223), Some(date));
        assert_eq!(date_from_key(20241340), None);
    }

    #[test]
    fn test_parse_small_number() {
        assert_eq!(parse_small_number("３"), Some(3));
        assert_eq!(parse_small_number(" 12 "), Some(12));
        assert_eq!(parse_small_number("Ｆ"), None);
    }

    #[test]
    fn test_stadium_names() {
        assert_eq!(get_stadium_name(23), "唐津");
        assert_eq!(get_stadium_name(1), "桐生");
        assert_eq!(get_stadium_name(24), "大村");
        assert_eq!(get_stadium_name(99), "不明");
    }
}
