use actix_web::error::ErrorServiceUnavailable;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;
use serde::Deserialize;

use super::stream::traffic_stream;
use super::ApiState;
use crate::actors::{GetDlqMessages, GetDlqStats, GetSystemHealth, HealthStatus};
use crate::traffic::{parse_timestamp, StoreId, StoreTrafficHistory, TrafficError};

const DEFAULT_DEAD_LETTER_LIMIT: usize = 50;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/traffic/current/{store_id}", web::get().to(current_traffic))
        .route("/api/traffic/current", web::get().to(all_current_traffic))
        .route("/api/traffic/history/{store_id}", web::get().to(traffic_history))
        .route("/api/traffic/stream", web::get().to(traffic_stream))
        .route("/api/dead-letters", web::get().to(dead_letters))
        .route("/health", web::get().to(health));
}

impl ResponseError for TrafficError {
    fn status_code(&self) -> StatusCode {
        match self {
            TrafficError::NotFound(_) => StatusCode::NOT_FOUND,
            TrafficError::MalformedInput { .. }
            | TrafficError::InvalidPayload(_)
            | TrafficError::CountOverflow { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            TrafficError::NotFound(_) => "Store not found".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

async fn current_traffic(
    state: web::Data<ApiState>,
    store_id: web::Path<StoreId>,
) -> Result<HttpResponse, TrafficError> {
    let snapshot = state.hub.engine().live_snapshot(store_id.into_inner())?;
    Ok(HttpResponse::Ok().json(snapshot))
}

async fn all_current_traffic(state: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(state.hub.engine().all_live_snapshots())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// Reference time for the window, defaults to now
    now: Option<String>,
}

async fn traffic_history(
    state: web::Data<ApiState>,
    store_id: web::Path<StoreId>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, TrafficError> {
    let now = match query.now.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => Utc::now(),
    };
    let store_id = store_id.into_inner();

    Ok(HttpResponse::Ok().json(StoreTrafficHistory {
        store_id,
        hourly_data: state.hub.engine().history(store_id, now)?,
    }))
}

#[derive(Debug, Deserialize)]
struct DeadLetterQuery {
    limit: Option<usize>,
}

async fn dead_letters(
    state: web::Data<ApiState>,
    query: web::Query<DeadLetterQuery>,
) -> actix_web::Result<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT);

    let messages = state
        .dlq_actor
        .send(GetDlqMessages { limit })
        .await
        .map_err(ErrorServiceUnavailable)?;
    let stats = state
        .dlq_actor
        .send(GetDlqStats)
        .await
        .map_err(ErrorServiceUnavailable)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "stats": stats,
        "messages": messages,
    })))
}

async fn health(state: web::Data<ApiState>) -> actix_web::Result<HttpResponse> {
    let health = state
        .health_monitor
        .send(GetSystemHealth)
        .await
        .map_err(ErrorServiceUnavailable)?;

    let status = match health.overall_status {
        HealthStatus::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded(_) => StatusCode::OK,
    };

    Ok(HttpResponse::build(status).json(health))
}
