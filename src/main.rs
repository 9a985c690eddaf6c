use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod handlers;

use choiatsu::config::{AppConfig, SelectionConfig};
use choiatsu::store::{InMemoryRecordStore, RecordStore};
use handlers::{health, reconcile, records, select};

/// Application state shared across handlers
pub struct AppState {
    pub store: Box<dyn RecordStore>,
    pub selection: SelectionConfig,
}

impl AppState {
    fn in_memory(selection: SelectionConfig) -> Self {
        Self {
            store: Box::new(InMemoryRecordStore::new()),
            selection,
        }
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/select", web::post().to(select::select))
        .route("/reconcile", web::post().to(reconcile::reconcile_result))
        .route("/records", web::get().to(records::list_records))
        .route("/stats", web::get().to(records::stats));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    let addr = format!("{}:{}", config.host, config.port);
    let app_state = Arc::new(AppState::in_memory(config.selection.clone()));

    info!(
        "Selection: min odds {}x, max {} bets/day, {} yen per bet",
        config.selection.min_odds, config.selection.max_bets_per_day, config.selection.investment_per_bet
    );
    info!("Starting choiatsu API server at http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                error!("Rejected JSON body: {}", err);
                choiatsu::error::AppError::ValidationError(err.to_string()).into()
            }))
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(&addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use chrono::NaiveDate;
    use choiatsu::models::{PredictionRecord, Resolution};
    use choiatsu::store::StoreError;
    use serde_json::{json, Value};

    fn race_json(name: &str, odds: f64, tiers: [&str; 6]) -> Value {
        let participants: Vec<Value> = tiers
            .iter()
            .enumerate()
            .map(|(i, tier)| json!({"position": i + 1, "name": format!("racer{}", i + 1), "rating_tier": tier}))
            .collect();
        json!({
            "date": "2024-12-23",
            "name": name,
            "venue": "住之江",
            "number": 12,
            "start_time": "20:25",
            "grade": "G3",
            "expected_odds": odds,
            "url": "https://example.invalid/",
            "participants": participants,
        })
    }

    fn result_json(name: &str, combination: [u8; 3], amount: u64) -> Value {
        json!({
            "result": {
                "date": "2024-12-23",
                "race_name": name,
                "finish_order": [combination[0], combination[1], combination[2], 4, 5, 6],
                "payouts": {
                    "3連単": {"combination": combination, "odds": amount as f64 / 100.0, "amount": amount}
                }
            }
        })
    }

    #[actix_web::test]
    async fn test_select_then_reconcile() {
        let state = Arc::new(AppState::in_memory(SelectionConfig::default()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/select")
            .set_json(json!({
                "races": [
                    race_json("住之江12R", 65.2, ["A1", "A2", "B1", "B1", "B2", "B2"]),
                    race_json("尼崎11R", 42.8, ["A1", "A1", "A2", "B1", "B1", "B2"]),
                ]
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["bets"].as_array().map(|b| b.len()), Some(1));
        assert_eq!(body["bets"][0]["combination"], "1-2-3");

        let req = test::TestRequest::post()
            .uri("/reconcile")
            .set_json(result_json("住之江12R", [1, 2, 3], 4560))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["record"]["is_hit"], true);
        assert_eq!(body["record"]["payout_amount"], 4560);
        assert_eq!(body["outcome_tier"], "win");

        // Second result for the same race is a conflict
        let req = test::TestRequest::post()
            .uri("/reconcile")
            .set_json(result_json("住之江12R", [1, 2, 3], 4560))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get().uri("/stats").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["statistics"]["hits"], 1);
        assert_eq!(body["statistics"]["total_payout"], 4560);
    }

    #[actix_web::test]
    async fn test_reconcile_unknown_race() {
        let state = Arc::new(AppState::in_memory(SelectionConfig::default()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/reconcile")
            .set_json(result_json("桐生1R", [1, 2, 3], 0))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["open_records"], 0);
    }

    /// Store that refuses to append one race
    struct RejectingStore {
        inner: InMemoryRecordStore,
        reject: &'static str,
    }

    #[async_trait::async_trait]
    impl RecordStore for RejectingStore {
        async fn append_record(&self, record: &PredictionRecord) -> Result<(), StoreError> {
            if record.race_name == self.reject {
                return Err(StoreError::Io {
                    path: "records.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.append_record(record).await
        }

        async fn update_record(
            &self,
            race_name: &str,
            date: NaiveDate,
            resolution: &Resolution,
        ) -> Result<PredictionRecord, StoreError> {
            self.inner.update_record(race_name, date, resolution).await
        }

        async fn read_records(&self) -> Result<Vec<PredictionRecord>, StoreError> {
            self.inner.read_records().await
        }
    }

    #[actix_web::test]
    async fn test_select_reports_persist_failure() {
        let state = Arc::new(AppState {
            store: Box::new(RejectingStore {
                inner: InMemoryRecordStore::new(),
                reject: "住之江12R",
            }),
            selection: SelectionConfig::default(),
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/select")
            .set_json(json!({
                "races": [
                    race_json("住之江12R", 65.2, ["A1", "A2", "B1", "B1", "B2", "B2"]),
                    race_json("若松10R", 78.5, ["A2", "B1", "A1", "B1", "B2", "B2"]),
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["bets"].as_array().map(|b| b.len()), Some(2));
        assert_eq!(body["records"].as_array().map(|r| r.len()), Some(1));
        assert_eq!(body["records"][0]["race_name"], "若松10R");
        assert_eq!(body["failures"][0]["race_name"], "住之江12R");
        assert_eq!(body["failures"][0]["stage"], "persist");

        let stored = state.store.read_records().await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[actix_web::test]
    async fn test_select_rejects_bad_config() {
        let state = Arc::new(AppState::in_memory(SelectionConfig::default()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/select")
            .set_json(json!({"races": [], "config": {"investment_per_bet": 0}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
