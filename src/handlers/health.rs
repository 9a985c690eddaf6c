use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::AppState;
use choiatsu::error::AppError;
use choiatsu::models::HealthResponse;
use choiatsu::store::{open_records, RecordStore};

/// Health check endpoint
pub async fn health_check(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let records = state.store.read_records().await?;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        open_records: open_records(&records).len(),
    };

    Ok(HttpResponse::Ok().json(response))
}
