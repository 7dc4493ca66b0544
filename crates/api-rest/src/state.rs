//! Shared handler state.

use customer_analytics_application::AnalyticsService;
use std::sync::Arc;
use std::time::Instant;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Query and trigger service
    pub service: Arc<AnalyticsService>,
    started_at: Instant,
}

impl AppState {
    /// Create state around a service
    pub fn new(service: Arc<AnalyticsService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was created
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
