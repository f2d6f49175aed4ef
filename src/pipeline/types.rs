//! The finalized response artifact handed across the pipeline boundary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::state::StateTransition;
use crate::schema::VaultCategory;

/// Terminal disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Validation passed and confidence met the threshold.
    Completed,
    /// A stage failed fatally or validation never passed.
    Failed,
    /// Validation passed but classification confidence was below threshold.
    LowConfidence,
}

impl RunStatus {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::LowConfidence => "low_confidence",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The finalized result of one workflow run.
///
/// Created exactly once by the orchestrator; immutable thereafter.
/// Ownership transfers to the caller across the external boundary —
/// downstream storage and the confirmation UI consume this as-is.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub run_id: Uuid,
    pub category: VaultCategory,
    /// Classification confidence, always within [0.0, 1.0].
    pub confidence: f32,
    /// Fields from the last parseable extraction attempt, present even
    /// when the run failed validation (partial results are surfaced,
    /// not discarded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Map<String, serde_json::Value>>,
    /// Rendered per-field errors from the final validation attempt.
    pub validation_errors: Vec<String>,
    /// Non-fatal errors encountered along the way (agent failures,
    /// timeouts, cancellation).
    pub errors: Vec<String>,
    /// Measured from entry into classification to exit of finalization.
    pub processing_time: Duration,
    /// Agent invocations for this run: 1 classify + 1..=1+max_retries
    /// extracts.
    pub agent_calls: u32,
    pub status: RunStatus,
    /// Full state transition history, for inspection and tests.
    pub transitions: Vec<StateTransition>,
    pub completed_at: DateTime<Utc>,
}

impl AgentResponse {
    /// Whether extraction produced anything worth storing.
    pub fn has_data(&self) -> bool {
        self.extracted_data
            .as_ref()
            .is_some_and(|fields| !fields.is_empty())
    }
}
