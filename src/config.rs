//! Configuration types.

use std::time::Duration;

/// Workflow configuration — the caller-supplied policy surface.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Minimum classification confidence for a `Completed` status.
    pub confidence_threshold: f32,
    /// Maximum extraction retries after the initial attempt.
    pub max_retries: u32,
    /// Per-agent-call timeout. Exceeding it counts as an agent error.
    pub call_timeout: Duration,
    /// Delay before each extraction retry. Local to the run; other
    /// concurrent runs keep going while this one sleeps.
    pub retry_backoff: Duration,
    /// Whether prior validation errors are handed to the agent as extra
    /// context on a retried extraction call.
    pub feedback_on_retry: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_retries: 2,
            call_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(500),
            feedback_on_retry: true,
        }
    }
}

impl WorkflowConfig {
    /// Build from `VAULT_AGENT_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            confidence_threshold: env_parse(
                "VAULT_AGENT_CONFIDENCE_THRESHOLD",
                defaults.confidence_threshold,
            )
            .clamp(0.0, 1.0),
            max_retries: env_parse("VAULT_AGENT_MAX_RETRIES", defaults.max_retries),
            call_timeout: Duration::from_secs(env_parse(
                "VAULT_AGENT_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )),
            retry_backoff: Duration::from_millis(env_parse(
                "VAULT_AGENT_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )),
            feedback_on_retry: env_parse(
                "VAULT_AGENT_RETRY_FEEDBACK",
                defaults.feedback_on_retry,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = WorkflowConfig::default();
        assert!((config.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert!(config.feedback_on_retry);
    }

    #[test]
    fn env_parse_falls_back_on_missing() {
        assert_eq!(env_parse("VAULT_AGENT_DOES_NOT_EXIST", 7u32), 7);
    }
}
