//! JSON file record store
//!
//! The whole record list lives in one pretty-printed JSON array. Every
//! write rewrites the file under a process-local lock.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{apply_resolution, RecordStore, StoreError};
use crate::models::{PredictionRecord, Resolution};

pub struct JsonRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No record file at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if json.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&json)?)
    }

    async fn save(&self, records: &[PredictionRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn append_record(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.push(record.clone());
        self.save(&records).await?;
        info!("Recorded prediction: {}", record.race_name);
        Ok(())
    }

    async fn update_record(
        &self,
        race_name: &str,
        date: NaiveDate,
        resolution: &Resolution,
    ) -> Result<PredictionRecord, StoreError> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let updated = apply_resolution(&mut records, race_name, date, resolution)?;
        self.save(&records).await?;
        info!("Updated result: {}", race_name);
        Ok(updated)
    }

    async fn read_records(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }
}
