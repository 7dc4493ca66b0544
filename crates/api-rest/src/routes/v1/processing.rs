//! Metrics and processing endpoints.

use crate::{
    error::ApiResult,
    responses::{Accepted, ApiResponse},
    routes::TriggerResponse,
    state::AppState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use customer_analytics_application::MetricsView;
use customer_analytics_domain::RunStatus;

/// Processing routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/processing", post(trigger_processing))
        .route("/processing/status", get(run_status))
}

async fn get_metrics(State(state): State<AppState>) -> ApiResult<ApiResponse<MetricsView>> {
    Ok(ApiResponse::success(state.service.get_metrics().await?))
}

async fn trigger_processing(
    State(state): State<AppState>,
) -> ApiResult<Accepted<ApiResponse<TriggerResponse>>> {
    let run_id = state.service.trigger_processing()?;
    Ok(Accepted(ApiResponse::success_with_message(
        TriggerResponse::triggered(run_id),
        "Processing triggered",
    )))
}

async fn run_status(State(state): State<AppState>) -> ApiResponse<RunStatus> {
    ApiResponse::success(state.service.run_status())
}
