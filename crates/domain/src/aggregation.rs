//! Aggregation run lifecycle.

use crate::errors::StateTransitionError;
use crate::identifiers::RunId;
use crate::snapshot::RunReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the aggregation orchestrator.
///
/// A pass moves `Idle -> Running -> {Succeeded, Failed}`. From a terminal
/// state a new pass may start again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl AggregationState {
    /// Check if a state transition is valid
    pub fn can_transition_to(&self, target: AggregationState) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Succeeded, Self::Running)
                | (Self::Failed, Self::Running)
        )
    }

    /// Move to `target`, rejecting illegal transitions.
    pub fn transition_to(&mut self, target: AggregationState) -> Result<(), StateTransitionError> {
        if !self.can_transition_to(target) {
            return Err(StateTransitionError {
                from: *self,
                to: target,
            });
        }
        *self = target;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AggregationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable status of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: AggregationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_run_id: Option<RunId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<RunId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<RunReport>,
    /// Snapshot version written by the last successful pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sequence: Option<u64>,
}
