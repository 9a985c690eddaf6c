//! Prediction record persistence
//!
//! The [`RecordStore`] contract is what the runner and the HTTP server
//! write through. Two implementations ship with the crate:
//! - [`JsonRecordStore`]: all records in a single JSON file
//! - [`InMemoryRecordStore`]: process-local, for tests and the API server

mod json;
mod memory;
pub mod stats;

pub use json::JsonRecordStore;
pub use memory::InMemoryRecordStore;
pub use stats::{analyze_by_venue, RecordStatistics, VenueAnalysis};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::reconcile::find_open_record;
use crate::error::ReconcileError;
use crate::models::{PredictionRecord, Resolution};

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize records: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Durable storage of prediction records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a freshly selected (open) record
    async fn append_record(&self, record: &PredictionRecord) -> Result<(), StoreError>;

    /// Write result fields to the open record for `race_name` on `date`
    async fn update_record(
        &self,
        race_name: &str,
        date: NaiveDate,
        resolution: &Resolution,
    ) -> Result<PredictionRecord, StoreError>;

    /// All records in append order
    async fn read_records(&self) -> Result<Vec<PredictionRecord>, StoreError>;
}

/// Apply `resolution` to the latest open record named `race_name` on `date`
pub(crate) fn apply_resolution(
    records: &mut [PredictionRecord],
    race_name: &str,
    date: NaiveDate,
    resolution: &Resolution,
) -> Result<PredictionRecord, StoreError> {
    let idx = find_open_record(records, race_name, Some(date))?;
    records[idx].apply(resolution);
    Ok(records[idx].clone())
}

/// The last `limit` records, oldest first
pub fn recent_records(records: &[PredictionRecord], limit: usize) -> &[PredictionRecord] {
    let start = records.len().saturating_sub(limit);
    &records[start..]
}

/// Records still waiting for a result
pub fn open_records(records: &[PredictionRecord]) -> Vec<&PredictionRecord> {
    records.iter().filter(|r| !r.is_resolved()).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_recent_records() {
        let records = vec![record("a1R"), record("b2R"), record("c3R")];
        let recent = recent_records(&records, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].race_name, "b2R");
        assert_eq!(recent_records(&records, 10).len(), 3);
        assert!(recent_records(&records, 0).is_empty());
    }

    #[test]
    fn test_apply_resolution_not_found() {
        let mut records = vec![record("a1R")];
        let resolution = Resolution {
            finish_order: vec![1, 2, 3],
            is_hit: false,
            payout_amount: 0,
        };
        let date = records[0].date;
        let err = apply_resolution(&mut records, "zzz", date, &resolution).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Reconcile(ReconcileError::RaceNotFound(_))
        ));
    }

    #[test]
    fn test_apply_resolution_matches_date() {
        let mut later = record("a1R");
        later.date = later.date.succ_opt().unwrap();
        let mut records = vec![record("a1R"), later];
        let resolution = Resolution {
            finish_order: vec![1, 2, 3],
            is_hit: true,
            payout_amount: 4560,
        };

        let first_day = records[0].date;
        let updated = apply_resolution(&mut records, "a1R", first_day, &resolution).unwrap();
        assert_eq!(updated.date, first_day);
        assert!(records[0].is_resolved());
        assert!(!records[1].is_resolved());
    }

    #[test]
    fn test_open_records() {
        let mut done = record("b2R");
        done.is_hit = Some(true);
        let records = vec![record("a1R"), done];
        let open = open_records(&records);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].race_name, "a1R");
    }
}
