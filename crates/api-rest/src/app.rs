//! Application builder.
//!
//! Assembles routes, middleware and state into an Axum router.

use crate::{
    error::ApiError,
    middleware::{logging_middleware, request_id_middleware},
    routes,
    state::AppState,
};
use axum::{middleware, Router};
use customer_analytics_common::config::ServerConfig;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        .merge(routes::health::routes())
        .merge(routes::legacy::routes())
        .nest("/api/v1", routes::v1::routes())
        .fallback(|| async { ApiError::EndpointNotFound })
        .with_state(state);

    let app = if config.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_seconds,
            )))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(middleware::from_fn(logging_middleware)),
    )
}
