//! HTTP route handlers.

pub mod health;
pub mod legacy;
pub mod v1;

use customer_analytics_domain::RunId;
use serde::{Deserialize, Serialize};

/// Body returned when a pass is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub run_id: RunId,
}

impl TriggerResponse {
    pub fn triggered(run_id: RunId) -> Self {
        Self {
            message: "Processing triggered".to_string(),
            run_id,
        }
    }
}
