//! Health check endpoint.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use customer_analytics_application::{ComponentCheck, HealthStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    /// Service version
    pub version: String,
    /// Service uptime in seconds
    pub uptime: u64,
    /// Per-store checks
    pub checks: BTreeMap<String, ComponentCheck>,
}

/// Health check routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Probe both stores; 503 when either is unreachable.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.service.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: report.status,
        timestamp: report.timestamp,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.uptime_seconds(),
        checks: report.checks,
    };

    (status, Json(response))
}
