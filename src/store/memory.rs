//! In-memory record store

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::{apply_resolution, RecordStore, StoreError};
use crate::models::{PredictionRecord, Resolution};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PredictionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append_record(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn update_record(
        &self,
        race_name: &str,
        date: NaiveDate,
        resolution: &Resolution,
    ) -> Result<PredictionRecord, StoreError> {
        let mut records = self.records.write().await;
        apply_resolution(&mut records, race_name, date, resolution)
    }

    async fn read_records(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }
}
