//! Race schedule scraper from boatrace.jp
//!
//! Reads the race index page to find which stadiums hold races on a date.

use super::{get_stadium_name, query_number, ScraperError};
use crate::models::Grade;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Races held on one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodaySchedule {
    pub date: u32,
    pub scraped_at: String,
    pub stadiums: Vec<ActiveStadium>,
}

/// Active stadium information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStadium {
    pub code: u8,
    pub name: String,
    pub is_selling: bool,
    pub current_race: Option<u8>,
    pub total_races: u8,
    pub event_name: Option<String>,
    pub grade: Grade,
}

impl ActiveStadium {
    fn new(code: u8) -> Self {
        Self {
            code,
            name: get_stadium_name(code).to_string(),
            is_selling: true,
            current_race: None,
            total_races: 12,
            event_name: None,
            grade: Grade::Ungraded,
        }
    }
}

/// Parse the day's schedule from race index HTML
///
/// Stadium links carry the `jcd` parameter. The table rows are tried
/// first; a bare list of links is the fallback.
pub fn parse_schedule(html: &str, date: u32) -> Result<TodaySchedule, ScraperError> {
    let document = Html::parse_document(html);

    let row_selector = Selector::parse("div.table1 table tbody tr")
        .map_err(|e| ScraperError::ParseError(e.to_string()))?;
    let link_selector = Selector::parse("a[href*='jcd=']")
        .map_err(|e| ScraperError::ParseError(e.to_string()))?;
    let td_selector =
        Selector::parse("td").map_err(|e| ScraperError::ParseError(e.to_string()))?;

    let mut seen: HashSet<u8> = HashSet::new();
    let mut stadiums = Vec::new();

    for row in document.select(&row_selector) {
        if let Some(stadium) = parse_stadium_row(&row, &link_selector, &td_selector) {
            if seen.insert(stadium.code) {
                stadiums.push(stadium);
            }
        }
    }

    if stadiums.is_empty() {
        for link in document.select(&link_selector) {
            let Some(code) = link.value().attr("href").and_then(extract_stadium_code) else {
                continue;
            };
            if !seen.insert(code) {
                continue;
            }

            let mut stadium = ActiveStadium::new(code);
            stadium.event_name = extract_event_name(&link);
            stadium.grade = extract_grade(&link);
            stadiums.push(stadium);
        }
    }

    stadiums.sort_by_key(|s| s.code);

    Ok(TodaySchedule {
        date,
        scraped_at: chrono::Utc::now().to_rfc3339(),
        stadiums,
    })
}

fn parse_stadium_row(
    row: &ElementRef,
    link_selector: &Selector,
    td_selector: &Selector,
) -> Option<ActiveStadium> {
    let link = row.select(link_selector).next()?;
    let code = extract_stadium_code(link.value().attr("href")?)?;

    let mut stadium = ActiveStadium::new(code);
    let mut grade_text: Option<String> = None;

    for td in row.select(td_selector) {
        let text: String = td.text().collect::<String>().trim().to_string();

        if text.contains("発売中") {
            stadium.is_selling = true;
        } else if text.contains("終了") || text.contains("中止") {
            stadium.is_selling = false;
        }

        if let Some(race_no) = extract_race_number(&text) {
            stadium.current_race = Some(race_no);
        }

        if Grade::from_label(&text) != Grade::Ungraded {
            grade_text = Some(text);
        }
    }

    stadium.event_name = extract_event_name(&link);
    stadium.grade = match grade_text {
        Some(text) => Grade::from_label(&text),
        None => extract_grade(&link),
    };

    Some(stadium)
}

fn extract_stadium_code(url: &str) -> Option<u8> {
    query_number(url, "jcd").and_then(|code| u8::try_from(code).ok())
}

/// Extract race number from text (e.g., "8R", "R8", "第8R")
fn extract_race_number(text: &str) -> Option<u8> {
    let text = text.replace('第', "");
    let (before, after) = text.split_once('R')?;

    let leading: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let trailing: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();

    [leading, trailing]
        .iter()
        .filter_map(|digits| digits.parse::<u8>().ok())
        .find(|n| (1..=12).contains(n))
}

fn extract_event_name(link: &ElementRef) -> Option<String> {
    if let Some(title) = link.value().attr("title").filter(|t| !t.is_empty()) {
        return Some(title.to_string());
    }

    let text: String = link.text().collect::<String>().trim().to_string();
    if text.chars().count() > 2 {
        Some(text)
    } else {
        None
    }
}

/// Grade from an `is-G1` style class, then from the link text
fn extract_grade(link: &ElementRef) -> Grade {
    let from_class = link
        .value()
        .classes()
        .map(Grade::from_label)
        .find(|g| *g != Grade::Ungraded);

    from_class.unwrap_or_else(|| Grade::from_label(&link.text().collect::<String>()))
}
