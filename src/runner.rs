//! Daily run orchestration
//!
//! Wires a [`RaceSource`], a [`NotificationSink`] and a [`RecordStore`]
//! around the decision pipeline. Collaborator failures on one bet or one
//! record are collected in the run report instead of aborting the run.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SelectionConfig;
use crate::core::{reconcile, resolution_for, select_bets, Selection};
use crate::models::PredictionRecord;
use crate::notify::{render_prediction, render_result, NotificationSink};
use crate::source::{RaceSource, SourceError};
use crate::store::{RecordStore, StoreError};

/// Errors that stop a run before any per-race work happens
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to fetch races: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to read records: {0}")]
    Store(#[from] StoreError),
}

/// Step at which a single race failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    FetchResult,
    Reconcile,
    Notify,
    Persist,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::FetchResult => "fetch result",
            RunStage::Reconcile => "reconcile",
            RunStage::Notify => "notify",
            RunStage::Persist => "persist",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub race_name: String,
    pub stage: RunStage,
    pub message: String,
}

impl RunFailure {
    pub fn new(race_name: &str, stage: RunStage, error: impl fmt::Display) -> Self {
        warn!("{} failed for {}: {}", stage, race_name, error);
        Self {
            race_name: race_name.to_string(),
            stage,
            message: error.to_string(),
        }
    }
}

/// Outcome of a prediction run
#[derive(Debug, Default)]
pub struct PredictionRun {
    pub races_fetched: usize,
    pub selection: Selection,
    /// Records that reached the store
    pub records: Vec<PredictionRecord>,
    pub failures: Vec<RunFailure>,
}

/// Outcome of a results run
#[derive(Debug, Default)]
pub struct ResultRun {
    pub resolved: Vec<PredictionRecord>,
    /// Races whose result is not posted yet
    pub pending: Vec<String>,
    pub failures: Vec<RunFailure>,
}

pub struct DailyRunner {
    source: Arc<dyn RaceSource>,
    notifier: Arc<dyn NotificationSink>,
    store: Arc<dyn RecordStore>,
    config: SelectionConfig,
}

impl DailyRunner {
    pub fn new(
        source: Arc<dyn RaceSource>,
        notifier: Arc<dyn NotificationSink>,
        store: Arc<dyn RecordStore>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            config,
        }
    }

    /// Fetch the day's races, select bets, then announce and record each
    ///
    /// A record is persisted even when its announcement fails, so the
    /// results run can still resolve it.
    pub async fn run_predictions(&self, date: NaiveDate) -> Result<PredictionRun, RunError> {
        let races = self.source.fetch_upcoming_races(date).await?;
        info!("Fetched {} races for {}", races.len(), date);

        let selection = select_bets(&races, &self.config);
        let mut run = PredictionRun {
            races_fetched: races.len(),
            ..Default::default()
        };

        for bet in &selection.bets {
            let name = bet.race.name.as_str();

            if let Err(e) = self.notifier.broadcast(&render_prediction(bet)).await {
                run.failures.push(RunFailure::new(name, RunStage::Notify, e));
            }

            let record = PredictionRecord::from_bet(bet, Utc::now());
            match self.store.append_record(&record).await {
                Ok(()) => run.records.push(record),
                Err(e) => run.failures.push(RunFailure::new(name, RunStage::Persist, e)),
            }
        }

        info!(
            "Prediction run: {} bets, {} recorded, {} failures",
            selection.bets.len(),
            run.records.len(),
            run.failures.len()
        );
        run.selection = selection;
        Ok(run)
    }

    /// Resolve every open record whose result has been posted
    pub async fn run_results(&self) -> Result<ResultRun, RunError> {
        let records = self.store.read_records().await?;
        let mut run = ResultRun::default();

        for record in records.iter().filter(|r| !r.is_resolved()) {
            let name = record.race_name.as_str();

            let result = match self.source.fetch_result(&record.race_url).await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    info!("Result for {} not posted yet", name);
                    run.pending.push(record.race_name.clone());
                    continue;
                }
                Err(e) => {
                    run.failures.push(RunFailure::new(name, RunStage::FetchResult, e));
                    continue;
                }
            };

            // The posted 3連単 only pays this record if it is the same ticket
            let ticket = result.for_ticket(&record.combination);
            if let Err(e) = reconcile(record, &ticket) {
                run.failures.push(RunFailure::new(name, RunStage::Reconcile, e));
                continue;
            }

            let resolution = resolution_for(&ticket);
            let stored = match self.store.update_record(name, record.date, &resolution).await {
                Ok(stored) => stored,
                Err(e) => {
                    run.failures.push(RunFailure::new(name, RunStage::Persist, e));
                    continue;
                }
            };

            if let Some(message) = render_result(&stored) {
                if let Err(e) = self.notifier.broadcast(&message).await {
                    run.failures.push(RunFailure::new(name, RunStage::Notify, e));
                }
            }

            info!(
                "Resolved {}: {}",
                name,
                stored
                    .outcome_tier()
                    .map(|tier| tier.label())
                    .unwrap_or("-")
            );
            run.resolved.push(stored);
        }

        info!(
            "Results run: {} resolved, {} pending, {} failures",
            run.resolved.len(),
            run.pending.len(),
            run.failures.len()
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BetType, Grade, Participant, PayoutEntry, Race, RaceResult, RatingTier, RatingTier::*,
    };
    use crate::notify::NotifyError;
    use crate::store::InMemoryRecordStore;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use tokio::sync::Mutex;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 23).unwrap()
    }

    fn race(venue: &str, number: u8, odds: f64, tiers: &[RatingTier]) -> Race {
        let name = Race::race_name(venue, number);
        Race {
            date: date(),
            url: format!("https://example.invalid/racelist/{}", name),
            name,
            venue: venue.to_string(),
            number,
            start_time: "20:25".to_string(),
            grade: Grade::G3,
            expected_odds: odds,
            participants: tiers
                .iter()
                .enumerate()
                .map(|(i, t)| Participant::new(i as u8 + 1, format!("racer{}", i + 1), *t))
                .collect(),
        }
    }

    fn result(name: &str, order: &[u8], amount: u64) -> RaceResult {
        let mut payouts = BTreeMap::new();
        payouts.insert(
            BetType::Trifecta,
            PayoutEntry {
                combination: order[..3].to_vec(),
                odds: amount as f64 / 100.0,
                amount,
            },
        );
        RaceResult {
            date: date(),
            race_name: name.to_string(),
            finish_order: order.to_vec(),
            payouts,
        }
    }

    #[derive(Default)]
    struct FakeSource {
        races: Vec<Race>,
        results: HashMap<String, RaceResult>,
        unavailable: bool,
    }

    #[async_trait]
    impl RaceSource for FakeSource {
        async fn fetch_upcoming_races(&self, _date: NaiveDate) -> Result<Vec<Race>, SourceError> {
            if self.unavailable {
                return Err(SourceError::Unavailable("down".to_string()));
            }
            Ok(self.races.clone())
        }

        async fn fetch_result(&self, race_url: &str) -> Result<Option<RaceResult>, SourceError> {
            if race_url.is_empty() {
                return Err(SourceError::InvalidUrl(String::new()));
            }
            let name = race_url.rsplit('/').next().unwrap_or_default();
            Ok(self.results.get(name).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.sent.lock().await.push(message.to_string());
            Ok(())
        }
    }

    fn runner(
        source: FakeSource,
        notifier: Arc<RecordingNotifier>,
        store: Arc<InMemoryRecordStore>,
    ) -> DailyRunner {
        DailyRunner::new(Arc::new(source), notifier, store, SelectionConfig::default())
    }

    fn sample_source() -> FakeSource {
        FakeSource {
            races: vec![
                race("住之江", 12, 65.2, &[A1, A2, B1, B1, B2, B2]),
                race("尼崎", 11, 42.8, &[A1, A1, A2, B1, B1, B2]),
                race("若松", 10, 78.5, &[A2, B1, A1, B1, B2, B2]),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_predictions_notifies_and_records() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(InMemoryRecordStore::new());
        let runner = runner(sample_source(), notifier.clone(), store.clone());

        let run = runner.run_predictions(date()).await.unwrap();

        assert_eq!(run.races_fetched, 3);
        assert_eq!(run.selection.bets.len(), 2);
        assert_eq!(run.records.len(), 2);
        assert!(run.failures.is_empty());
        assert_eq!(notifier.sent.lock().await.len(), 2);

        let stored = store.read_records().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].race_name, "住之江12R");
        assert_eq!(stored[1].race_name, "若松10R");
        assert!(stored.iter().all(|r| !r.is_resolved()));
    }

    #[tokio::test]
    async fn test_run_predictions_empty_day() {
        let runner = runner(
            FakeSource::default(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(InMemoryRecordStore::new()),
        );

        let run = runner.run_predictions(date()).await.unwrap();
        assert_eq!(run.races_fetched, 0);
        assert!(run.records.is_empty());
        assert!(run.failures.is_empty());
    }

    #[tokio::test]
    async fn test_run_predictions_source_down() {
        let source = FakeSource {
            unavailable: true,
            ..Default::default()
        };
        let runner = runner(
            source,
            Arc::new(RecordingNotifier::default()),
            Arc::new(InMemoryRecordStore::new()),
        );

        let err = runner.run_predictions(date()).await.unwrap_err();
        assert!(matches!(err, RunError::Source(SourceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_notify_failure_still_records() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let store = Arc::new(InMemoryRecordStore::new());
        let runner = runner(sample_source(), notifier, store.clone());

        let run = runner.run_predictions(date()).await.unwrap();

        assert_eq!(run.records.len(), 2);
        assert_eq!(run.failures.len(), 2);
        assert!(run.failures.iter().all(|f| f.stage == RunStage::Notify));
        assert_eq!(store.read_records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_results() {
        let store = Arc::new(InMemoryRecordStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        runner(sample_source(), notifier.clone(), store.clone())
            .run_predictions(date())
            .await
            .unwrap();

        // 住之江12R was bet 1-2-3 and paid; 若松10R (3-1-2) lost; nothing else posted
        let mut source = sample_source();
        source
            .results
            .insert("住之江12R".to_string(), result("住之江12R", &[1, 2, 3, 4, 5, 6], 4560));
        source
            .results
            .insert("若松10R".to_string(), result("若松10R", &[1, 3, 2, 4, 5, 6], 4560));

        let notifier = Arc::new(RecordingNotifier::default());
        let run = runner(source, notifier.clone(), store.clone())
            .run_results()
            .await
            .unwrap();

        assert_eq!(run.resolved.len(), 2);
        assert!(run.failures.is_empty());

        let suminoe = &run.resolved[0];
        assert_eq!(suminoe.is_hit, Some(true));
        assert_eq!(suminoe.payout_amount, Some(4560));

        let wakamatsu = &run.resolved[1];
        assert_eq!(wakamatsu.is_hit, Some(false));
        assert_eq!(wakamatsu.payout_amount, Some(0));
        assert_eq!(wakamatsu.result_order, Some(vec![1, 3, 2, 4, 5, 6]));

        assert_eq!(notifier.sent.lock().await.len(), 2);

        // Second pass finds nothing open
        let again = runner(FakeSource::default(), notifier, store)
            .run_results()
            .await
            .unwrap();
        assert!(again.resolved.is_empty());
        assert!(again.pending.is_empty());
    }

    #[tokio::test]
    async fn test_run_results_same_name_on_other_day_untouched() {
        let mut first_day = crate::store::test_support::record("住之江12R");
        first_day.race_url = "https://example.invalid/racelist/1223".to_string();
        let mut next_week = crate::store::test_support::record("住之江12R");
        next_week.date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        next_week.combination = crate::models::Combination::new(4, 5, 6).unwrap();
        next_week.race_url = "https://example.invalid/racelist/1230".to_string();

        let store = Arc::new(InMemoryRecordStore::with_records(vec![first_day, next_week]));
        let mut source = FakeSource::default();
        source
            .results
            .insert("1223".to_string(), result("住之江12R", &[1, 2, 3, 4, 5, 6], 4560));

        let run = runner(source, Arc::new(RecordingNotifier::default()), store.clone())
            .run_results()
            .await
            .unwrap();

        assert!(run.failures.is_empty());
        assert_eq!(run.resolved.len(), 1);
        assert_eq!(run.resolved[0].date, date());
        assert_eq!(run.pending, vec!["住之江12R".to_string()]);

        let stored = store.read_records().await.unwrap();
        assert_eq!(stored[0].is_hit, Some(true));
        assert_eq!(stored[0].payout_amount, Some(4560));
        assert!(!stored[1].is_resolved());
    }

    #[tokio::test]
    async fn test_run_results_pending_and_fetch_failure() {
        let mut broken = crate::store::test_support::record("鳴門5R");
        broken.race_url = String::new();
        let mut waiting = crate::store::test_support::record("桐生1R");
        waiting.race_url = "https://example.invalid/racelist/桐生1R".to_string();

        let store = Arc::new(InMemoryRecordStore::with_records(vec![broken, waiting]));
        let run = runner(
            FakeSource::default(),
            Arc::new(RecordingNotifier::default()),
            store,
        )
        .run_results()
        .await
        .unwrap();

        assert!(run.resolved.is_empty());
        assert_eq!(run.pending, vec!["桐生1R".to_string()]);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].stage, RunStage::FetchResult);
    }
}
