//! Result reconciliation
//!
//! Records are matched to posted results by race name. A record is
//! resolved at most once: a second result for an already-resolved record
//! is rejected with [`ReconcileError::AlreadyResolved`].

use chrono::NaiveDate;

use crate::error::ReconcileError;
use crate::models::{PredictionRecord, RaceResult, Resolution};

/// Hit/payout fields implied by a posted result
///
/// A missing trifecta payout counts as a zero payout.
pub fn resolution_for(result: &RaceResult) -> Resolution {
    let amount = result.trifecta_payout().map(|e| e.amount).unwrap_or(0);

    Resolution {
        finish_order: result.finish_order.clone(),
        is_hit: amount > 0,
        payout_amount: amount,
    }
}

/// Resolve `record` against `result`, returning the updated record
pub fn reconcile(
    record: &PredictionRecord,
    result: &RaceResult,
) -> Result<PredictionRecord, ReconcileError> {
    if record.race_name != result.race_name {
        return Err(ReconcileError::RaceMismatch {
            expected: record.race_name.clone(),
            actual: result.race_name.clone(),
        });
    }

    if record.is_resolved() {
        return Err(ReconcileError::AlreadyResolved(record.race_name.clone()));
    }

    let mut updated = record.clone();
    updated.apply(&resolution_for(result));
    Ok(updated)
}

/// Index of the open record a result for `race_name` should resolve
///
/// When `date` is given only records of that day qualify. Among several
/// open matches the most recently appended one wins.
pub fn find_open_record(
    records: &[PredictionRecord],
    race_name: &str,
    date: Option<NaiveDate>,
) -> Result<usize, ReconcileError> {
    let mut matched = false;

    for (idx, record) in records.iter().enumerate().rev() {
        if record.race_name != race_name || date.is_some_and(|d| d != record.date) {
            continue;
        }
        matched = true;
        if !record.is_resolved() {
            return Ok(idx);
        }
    }

    if matched {
        Err(ReconcileError::AlreadyResolved(race_name.to_string()))
    } else {
        Err(ReconcileError::RaceNotFound(race_name.to_string()))
    }
}

/// Locate the matching record in `records` and resolve it in place
pub fn reconcile_in<'a>(
    records: &'a mut [PredictionRecord],
    result: &RaceResult,
) -> Result<&'a PredictionRecord, ReconcileError> {
    let idx = find_open_record(records, &result.race_name, Some(result.date))?;
    let updated = reconcile(&records[idx], result)?;
    records[idx] = updated;
    Ok(&records[idx])
}
