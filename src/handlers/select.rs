use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use choiatsu::core::select_bets;
use choiatsu::error::{validate_selection_config, AppError};
use choiatsu::models::{PredictionRecord, SelectRequest, SelectResponse};
use choiatsu::runner::{RunFailure, RunStage};

/// Run bet selection over the posted races and record the bets
///
/// A bet that fails to persist is reported in `failures`; the others
/// are still recorded.
pub async fn select(
    state: web::Data<Arc<AppState>>,
    req: web::Json<SelectRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let config = req.config.unwrap_or_else(|| state.selection.clone());
    validate_selection_config(&config)?;

    let selection = select_bets(&req.races, &config);
    let mut records = Vec::with_capacity(selection.bets.len());
    let mut failures = Vec::new();

    for bet in &selection.bets {
        let record = PredictionRecord::from_bet(bet, Utc::now());
        match state.store.append_record(&record).await {
            Ok(()) => records.push(record),
            Err(e) => failures.push(RunFailure::new(&bet.race.name, RunStage::Persist, e)),
        }
    }

    info!(
        "POST /select: {} races -> {} bets, {} recorded",
        req.races.len(),
        selection.bets.len(),
        records.len()
    );

    Ok(HttpResponse::Ok().json(SelectResponse {
        bets: selection.bets,
        skipped: selection.skipped,
        records,
        failures,
    }))
}
