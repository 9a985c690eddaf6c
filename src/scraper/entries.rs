//! Race entry (racelist) scraper from boatrace.jp
//!
//! Reads the six participants with their rating tier, plus the race
//! title, grade and scheduled start time.

use super::{boat_number_from_classes, boat_number_from_text, ScraperError};
use crate::models::{Grade, Participant, RatingTier};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Scraped racelist page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedRaceInfo {
    pub date: u32,
    pub stadium_code: u8,
    pub race_no: u8,
    pub title: Option<String>,
    pub grade: Option<Grade>,
    pub start_time: Option<String>,
    pub participants: Vec<Participant>,
}

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::ParseError(e.to_string()))
}

/// Parse race entries from racelist HTML
///
/// Each boat is its own `tbody.is-fs12`; the boat number comes from the
/// `is-boatColorN` cell and the tier from the `A1`..`B2` span. Rows with no
/// readable boat number or name are skipped. A racer with an unreadable
/// tier is kept as B1 so the field size stays intact.
pub fn parse_race_entries(
    html: &str,
    date: u32,
    stadium_code: u8,
    race_no: u8,
) -> Result<ScrapedRaceInfo, ScraperError> {
    let document = Html::parse_document(html);

    let tbody_selector = selector("tbody.is-fs12")?;
    let boat_cell_selector = selector("td[class*='is-boatColor'][class*='is-fs14']")?;
    let name_selector = selector("div.is-fs18 a")?;
    let span_selector = selector("span")?;

    let mut participants: Vec<Participant> = Vec::with_capacity(6);

    for tbody in document.select(&tbody_selector) {
        let position = tbody
            .select(&boat_cell_selector)
            .next()
            .and_then(|cell| boat_number_from_classes(&cell).or_else(|| boat_number_from_text(&cell)));

        let Some(position) = position else {
            continue;
        };

        let name = tbody
            .select(&name_selector)
            .next()
            .map(|el| normalize_name(&el.text().collect::<String>()))
            .unwrap_or_default();

        if name.is_empty() {
            continue;
        }

        if participants.iter().any(|p| p.position == position) {
            continue;
        }

        let rating_tier = extract_rating_tier(&tbody, &span_selector).unwrap_or_else(|| {
            tracing::debug!("No rating tier for boat {} ({}), assuming B1", position, name);
            RatingTier::B1
        });

        participants.push(Participant::new(position, name, rating_tier));
    }

    if participants.is_empty() {
        return Err(ScraperError::ParseError(
            "No racer entries found in HTML".to_string(),
        ));
    }

    participants.sort_by_key(|p| p.position);

    if participants.len() != 6 {
        tracing::warn!(
            "Expected 6 entries, got {} for race {}-{}-{}",
            participants.len(),
            date,
            stadium_code,
            race_no
        );
    }

    Ok(ScrapedRaceInfo {
        date,
        stadium_code,
        race_no,
        title: extract_title(&document)?,
        grade: extract_grade(&document)?,
        start_time: extract_start_time(&document)?,
        participants,
    })
}

/// Collapse the full-width spaces the site puts inside racer names
fn normalize_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_rating_tier(tbody: &ElementRef, span_selector: &Selector) -> Option<RatingTier> {
    tbody
        .select(span_selector)
        .find_map(|span| span.text().collect::<String>().trim().parse::<RatingTier>().ok())
}

fn extract_title(document: &Html) -> Result<Option<String>, ScraperError> {
    let title_selector = selector("h2.heading2_titleName, span.heading2_titleName")?;

    Ok(document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty()))
}

/// Grade from the `is-SG` / `is-G1` .. class on the heading block
fn extract_grade(document: &Html) -> Result<Option<Grade>, ScraperError> {
    let heading_selector = selector("div.heading2_title")?;

    Ok(document.select(&heading_selector).next().map(|heading| {
        heading
            .value()
            .classes()
            .find_map(|class| class.strip_prefix("is-"))
            .map(Grade::from_label)
            .unwrap_or_default()
    }))
}

/// First HH:MM in the heading detail (e.g. "締切予定 14:30")
fn extract_start_time(document: &Html) -> Result<Option<String>, ScraperError> {
    let detail_selector = selector("span.heading2_titleDetail, div.heading2_titleDetail")?;
    let time_pattern = Regex::new(r"(\d{1,2}:\d{2})")
        .map_err(|e| ScraperError::ParseError(e.to_string()))?;

    Ok(document.select(&detail_selector).find_map(|el| {
        let text: String = el.text().collect();
        time_pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }))
}
