//! Unversioned endpoints kept at their historical paths.
//!
//! Bodies are returned bare, without the `ApiResponse` envelope.

use super::TriggerResponse;
use crate::{
    error::{ApiError, ApiResult},
    responses::Accepted,
    state::AppState,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use customer_analytics_application::{CustomerView, MetricsView};
use serde::Deserialize;

/// `GET /customer` query
#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub customer_id: Option<String>,
}

/// Historical routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customer", get(get_customer))
        .route("/metrics", get(get_metrics))
        .route("/trigger-processing", post(trigger_processing))
}

async fn get_customer(
    State(state): State<AppState>,
    query: Result<Query<CustomerQuery>, QueryRejection>,
) -> ApiResult<Json<CustomerView>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let customer_id = query
        .customer_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("customer_id parameter required".to_string()))?;

    Ok(Json(state.service.get_customer(&customer_id).await?))
}

async fn get_metrics(State(state): State<AppState>) -> ApiResult<Json<MetricsView>> {
    Ok(Json(state.service.get_metrics().await?))
}

async fn trigger_processing(State(state): State<AppState>) -> ApiResult<Accepted<TriggerResponse>> {
    let run_id = state.service.trigger_processing()?;
    Ok(Accepted(TriggerResponse::triggered(run_id)))
}
