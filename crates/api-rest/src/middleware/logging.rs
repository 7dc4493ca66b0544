//! Request logging middleware.

use super::request_id::RequestId;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Log one line per request once the response is ready.
///
/// Routes are logged by their matched template (`/api/v1/customers/:customer_id`)
/// so customer ids stay out of the route field. Health probes log at debug.
pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    match status {
        500..=599 => error!(%request_id, %method, %route, status, duration_ms, "Request failed"),
        400..=499 => warn!(%request_id, %method, %route, status, duration_ms, "Request rejected"),
        _ if route == "/health" => {
            debug!(%request_id, %method, %route, status, duration_ms, "Health probe")
        }
        _ => info!(%request_id, %method, %route, status, duration_ms, "Request completed"),
    }

    response
}
