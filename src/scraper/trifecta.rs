//! Trifecta (3連単) odds HTML parser

use super::{boat_number_from_classes, boat_number_from_text, ScraperError};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::ParseError(e.to_string()))
}

/// Parse trifecta odds from the odds3t page
///
/// Table layout:
/// - Header row: one column per 1st-place boat
/// - Each column holds groups of 2nd-place boats (rowspan=4)
/// - Each group row: (2nd place, only on the first row) (3rd place) (odds)
///
/// Returns a map of (first, second, third) -> odds. Withdrawn or unposted
/// combinations are left out.
pub fn parse_trifecta_odds(html: &str) -> Result<HashMap<(u8, u8, u8), f64>, ScraperError> {
    let document = Html::parse_document(html);

    let title_selector = selector("span.title7_mainLabel")?;
    let has_title = document
        .select(&title_selector)
        .any(|el| el.text().collect::<String>().contains("3連単オッズ"));

    if !has_title {
        return Err(ScraperError::ParseError(
            "Could not find 3連単オッズ title".to_string(),
        ));
    }

    let table = document
        .select(&selector("div.table1 table")?)
        .next()
        .ok_or_else(|| ScraperError::ParseError("Could not find odds table".to_string()))?;

    let thead = table
        .select(&selector("thead")?)
        .next()
        .ok_or_else(|| ScraperError::ParseError("Could not find table header".to_string()))?;

    let mut first_boats: Vec<u8> = Vec::with_capacity(6);
    for th in thead.select(&selector("th")?) {
        if let Some(boat) = boat_number_from_classes(&th) {
            if !first_boats.contains(&boat) {
                first_boats.push(boat);
            }
        }
    }

    if first_boats.len() != 6 {
        return Err(ScraperError::ParseError(format!(
            "Expected 6 first boats, got {}",
            first_boats.len()
        )));
    }

    let tbody = table
        .select(&selector("tbody")?)
        .next()
        .ok_or_else(|| ScraperError::ParseError("Could not find table body".to_string()))?;

    let tr_selector = selector("tr")?;
    let td_selector = selector("td")?;
    let odds_point = selector(".oddsPoint")?;

    let mut odds = HashMap::new();
    // 2nd-place boat per column, carried across rowspan rows
    let mut current_second: Vec<Option<u8>> = vec![None; first_boats.len()];

    for row in tbody.select(&tr_selector) {
        let cells: Vec<ElementRef> = row.select(&td_selector).collect();
        let mut cells = cells.iter();

        for (col, first) in first_boats.iter().enumerate() {
            let Some(mut cell) = cells.next() else {
                break;
            };

            if cell.value().attr("rowspan").is_some() {
                current_second[col] =
                    boat_number_from_classes(cell).or_else(|| boat_number_from_text(cell));
                let Some(next) = cells.next() else {
                    break;
                };
                cell = next;
            }

            // 3rd place is read from text; its class repeats the column colour
            let third = boat_number_from_text(cell);
            let Some(odds_cell) = cells.next() else {
                break;
            };

            if let (Some(second), Some(third), Some(value)) =
                (current_second[col], third, parse_odds_value(odds_cell, &odds_point))
            {
                odds.insert((*first, second, third), value);
            }
        }
    }

    Ok(odds)
}

/// Parse odds value from a cell; `None` for "-", 欠場 or 取消
fn parse_odds_value(element: &ElementRef, odds_point: &Selector) -> Option<f64> {
    let text = match element.select(odds_point).next() {
        Some(span) => span.text().collect::<String>(),
        None => element.text().collect::<String>(),
    };

    let cleaned = text
        .replace(',', "")
        .replace("欠場", "")
        .replace("取消", "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }

    cleaned.parse::<f64>().ok()
}
