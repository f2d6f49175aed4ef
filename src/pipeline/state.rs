//! Run state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a workflow run.
///
/// All failure paths pass through `Finalizing` so every run produces
/// exactly one terminal response, and processing time is always measured
/// from entry into `Classifying` to exit of `Finalizing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run created, nothing invoked yet.
    Pending,
    /// Waiting on the agent's classify call.
    Classifying,
    /// Waiting on the agent's extract call.
    Extracting,
    /// Checking extracted fields against the schema.
    Validating,
    /// Backing off before re-invoking extraction.
    RetryingExtraction,
    /// Assembling the terminal response.
    Finalizing,
    /// Terminal: validation passed, confidence at or above threshold.
    Completed,
    /// Terminal: a stage failed fatally or validation never passed.
    Failed,
    /// Terminal: validation passed but confidence below threshold.
    LowConfidence,
}

impl RunState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;

        matches!(
            (self, target),
            (Pending, Classifying) |
            // Classification failure or cancellation goes straight to finalize
            (Classifying, Extracting) | (Classifying, Finalizing) |
            (Extracting, Validating) | (Extracting, RetryingExtraction) | (Extracting, Finalizing) |
            (Validating, Finalizing) | (Validating, RetryingExtraction) |
            (RetryingExtraction, Extracting) | (RetryingExtraction, Finalizing) |
            (Finalizing, Completed) | (Finalizing, Failed) | (Finalizing, LowConfidence)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::LowConfidence)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::RetryingExtraction => "retrying_extraction",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::LowConfidence => "low_confidence",
        };
        write!(f, "{s}")
    }
}

/// A state transition event, recorded on the run for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_valid() {
        assert!(RunState::Pending.can_transition_to(RunState::Classifying));
        assert!(RunState::Classifying.can_transition_to(RunState::Extracting));
        assert!(RunState::Extracting.can_transition_to(RunState::Validating));
        assert!(RunState::Validating.can_transition_to(RunState::Finalizing));
        assert!(RunState::Finalizing.can_transition_to(RunState::Completed));
    }

    #[test]
    fn retry_loop_transitions_valid() {
        assert!(RunState::Validating.can_transition_to(RunState::RetryingExtraction));
        assert!(RunState::Extracting.can_transition_to(RunState::RetryingExtraction));
        assert!(RunState::RetryingExtraction.can_transition_to(RunState::Extracting));
    }

    #[test]
    fn failure_paths_route_through_finalizing() {
        assert!(RunState::Classifying.can_transition_to(RunState::Finalizing));
        assert!(RunState::Extracting.can_transition_to(RunState::Finalizing));
        assert!(RunState::Finalizing.can_transition_to(RunState::Failed));
        assert!(RunState::Finalizing.can_transition_to(RunState::LowConfidence));
    }

    #[test]
    fn invalid_transitions_rejected() {
        assert!(!RunState::Completed.can_transition_to(RunState::Classifying));
        assert!(!RunState::Failed.can_transition_to(RunState::Extracting));
        assert!(!RunState::Pending.can_transition_to(RunState::Extracting));
        assert!(!RunState::Classifying.can_transition_to(RunState::Validating));
    }

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::LowConfidence.is_terminal());
        assert!(!RunState::Finalizing.is_terminal());
        assert!(!RunState::RetryingExtraction.is_terminal());
    }

    #[test]
    fn serde_is_snake_case() {
        let json = serde_json::to_string(&RunState::RetryingExtraction).unwrap();
        assert_eq!(json, "\"retrying_extraction\"");
    }
}
