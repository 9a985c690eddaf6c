use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::AppState;
use choiatsu::error::AppError;
use choiatsu::models::{RecordsQuery, StatsResponse};
use choiatsu::store::{analyze_by_venue, recent_records, RecordStatistics, RecordStore};

/// List stored records, oldest first
pub async fn list_records(
    state: web::Data<Arc<AppState>>,
    query: web::Query<RecordsQuery>,
) -> Result<HttpResponse, AppError> {
    let records = state.store.read_records().await?;
    let limit = query.limit.unwrap_or(records.len());

    Ok(HttpResponse::Ok().json(recent_records(&records, limit)))
}

pub async fn stats(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let records = state.store.read_records().await?;

    Ok(HttpResponse::Ok().json(StatsResponse {
        statistics: RecordStatistics::from_records(&records),
        venues: analyze_by_venue(&records),
    }))
}
