//! Race result (raceresult) HTML parser

use super::{boat_number_from_classes, boat_number_from_text, parse_small_number, ScraperError};
use crate::models::{BetType, PayoutEntry, RaceResult};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::ParseError(e.to_string()))
}

/// Parse the posted result of one race
///
/// Returns `Ok(None)` while the result is not yet published, i.e. the
/// finishing table is missing or has no ranked rows.
///
/// - Finish order comes from the table whose header contains "着"; rows
///   are ordered by rank, and unranked boats (F, 欠, 転) are left out.
/// - Payouts come from the table whose header contains "勝式"; only the
///   first row of each kind is kept. Odds are the payout per 100 yen.
pub fn parse_race_result(
    html: &str,
    date: NaiveDate,
    race_name: &str,
) -> Result<Option<RaceResult>, ScraperError> {
    let document = Html::parse_document(html);

    let table_selector = selector("table")?;
    let th_selector = selector("thead th")?;
    let tbody_selector = selector("tbody")?;
    let tr_selector = selector("tr")?;
    let td_selector = selector("td")?;

    let header_contains = |table: &ElementRef, needle: &str| {
        table
            .select(&th_selector)
            .any(|th| th.text().collect::<String>().contains(needle))
    };

    let Some(finish_table) = document
        .select(&table_selector)
        .find(|t| header_contains(t, "着") && !header_contains(t, "勝式"))
    else {
        return Ok(None);
    };

    let mut ranked: Vec<(u8, u8)> = Vec::with_capacity(6);
    for row in finish_table.select(&tr_selector) {
        let cells: Vec<ElementRef> = row.select(&td_selector).collect();
        let [rank_cell, boat_cell, ..] = cells.as_slice() else {
            continue;
        };

        let rank = parse_small_number(&rank_cell.text().collect::<String>());
        let boat = boat_number_from_text(boat_cell).or_else(|| boat_number_from_classes(boat_cell));

        if let (Some(rank), Some(boat)) = (rank, boat) {
            ranked.push((rank, boat));
        }
    }

    if ranked.is_empty() {
        return Ok(None);
    }

    ranked.sort_by_key(|(rank, _)| *rank);
    let finish_order: Vec<u8> = ranked.into_iter().map(|(_, boat)| boat).collect();

    let mut payouts = BTreeMap::new();
    let number_selector = selector("span.numberSet1_number")?;
    let payout_selector = selector("span.is-payout1")?;

    if let Some(payout_table) = document
        .select(&table_selector)
        .find(|t| header_contains(t, "勝式"))
    {
        for tbody in payout_table.select(&tbody_selector) {
            let Some(row) = tbody.select(&tr_selector).next() else {
                continue;
            };
            let Some(entry) = parse_payout_row(&row, &td_selector, &number_selector, &payout_selector)
            else {
                continue;
            };
            payouts.entry(entry.0).or_insert(entry.1);
        }
    }

    if !payouts.contains_key(&BetType::Trifecta) {
        tracing::warn!("No 3連単 payout posted for {}", race_name);
    }

    Ok(Some(RaceResult {
        date,
        race_name: race_name.to_string(),
        finish_order,
        payouts,
    }))
}

fn parse_payout_row(
    row: &ElementRef,
    td_selector: &Selector,
    number_selector: &Selector,
    payout_selector: &Selector,
) -> Option<(BetType, PayoutEntry)> {
    let bet_type = row
        .select(td_selector)
        .find_map(|td| BetType::from_label(&td.text().collect::<String>()))?;

    let combination: Vec<u8> = row
        .select(number_selector)
        .filter_map(|span| parse_small_number(&span.text().collect::<String>()))
        .collect();

    if combination.is_empty() {
        return None;
    }

    let amount_text: String = match row.select(payout_selector).next() {
        Some(span) => span.text().collect(),
        None => row
            .select(td_selector)
            .map(|td| td.text().collect::<String>())
            .find(|text| text.contains('¥'))?,
    };
    let amount = parse_yen(&amount_text)?;

    Some((
        bet_type,
        PayoutEntry {
            combination,
            odds: amount as f64 / 100.0,
            amount,
        },
    ))
}

/// "¥4,560" -> 4560
fn parse_yen(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok()
}
