use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::{info, warn};

use crate::AppState;
use choiatsu::core::{find_open_record, reconcile, resolution_for};
use choiatsu::error::{validate_finish_order, AppError};
use choiatsu::models::{OutcomeTier, ReconcileRequest, ReconcileResponse};

/// Resolve the open record for a posted result
pub async fn reconcile_result(
    state: web::Data<Arc<AppState>>,
    req: web::Json<ReconcileRequest>,
) -> Result<HttpResponse, AppError> {
    let result = req.into_inner().result;
    validate_finish_order(&result.finish_order)?;

    let records = state.store.read_records().await?;
    let idx = find_open_record(&records, &result.race_name, Some(result.date)).map_err(|e| {
        warn!("POST /reconcile: {}", e);
        e
    })?;
    let target = &records[idx];

    let ticket = result.for_ticket(&target.combination);
    reconcile(target, &ticket)?;

    let record = state
        .store
        .update_record(&target.race_name, target.date, &resolution_for(&ticket))
        .await?;
    let outcome_tier = OutcomeTier::from_amount(record.payout_amount.unwrap_or(0));

    info!("POST /reconcile: {} -> {}", record.race_name, outcome_tier.label());

    Ok(HttpResponse::Ok().json(ReconcileResponse {
        record,
        outcome_tier,
    }))
}
