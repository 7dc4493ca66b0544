//! Customer Analytics REST API
//!
//! Axum HTTP façade over the analytics service.
//!
//! ## Architecture
//!
//! - **app**: Router assembly and middleware stack
//! - **routes**: Handlers; historical paths at the root, versioned under `/api/v1`
//! - **middleware**: Request ID and request logging
//! - **responses**: Response envelopes
//! - **error**: HTTP error mapping
//!
//! ## Usage
//!
//! ```rust,no_run
//! use customer_analytics_api_rest::{create_app, AppState};
//! use customer_analytics_common::config::AppConfig;
//! use customer_analytics_infrastructure::bootstrap;
//! use customer_analytics_application::ServiceConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AppConfig::load()?;
//! let components = bootstrap::assemble(&config).await?;
//! let state = AppState::new(Arc::new(components.service(ServiceConfig::default())));
//! let app = create_app(state, &config.server);
//!
//! let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use app::create_app;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;
