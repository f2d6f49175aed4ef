//! Inference agent — the pluggable classify/extract capability.
//!
//! Two implementations satisfy the same contract:
//! - [`ScriptedAgent`] — deterministic scripted responses, zero I/O, for
//!   pipeline-logic tests
//! - [`HttpAgent`] — real model calls against an OpenAI-compatible
//!   chat-completions endpoint
//!
//! Selection happens at construction time; the workflow never branches on
//! which backend it holds.

mod http;
mod scripted;

pub use http::{HttpAgent, HttpAgentConfig};
pub use scripted::ScriptedAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::email::EmailInput;
use crate::error::InferenceError;
use crate::pipeline::validate::ValidationOutcome;
use crate::schema::{VaultCategory, VaultSchema};

/// Classification verdict from the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: VaultCategory,
    /// Always within [0.0, 1.0]; clamped at parse time.
    pub confidence: f32,
    /// Model's stated reasoning, when it offers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Classification {
    pub fn new(category: VaultCategory, confidence: f32) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: None,
        }
    }
}

/// Raw structured fields extracted against a schema.
///
/// Field keys are always a subset of the schema's declared fields (extra
/// model output is dropped before this is built). Owned by the current
/// run; discarded after validation and finalization.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub category: VaultCategory,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub schema_version: u32,
}

impl ExtractionResult {
    pub fn new(schema: &VaultSchema, raw: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            category: schema.category(),
            fields: schema.retain_declared(raw),
            schema_version: schema.version(),
        }
    }
}

/// The capability the workflow invokes. Both operations are potentially
/// slow (model latency) and potentially failing I/O — the only suspension
/// points in a run.
#[async_trait]
pub trait InferenceAgent: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Decide which vault category the email belongs to.
    async fn classify(&self, email: &EmailInput) -> Result<Classification, InferenceError>;

    /// Extract structured fields against the resolved schema.
    ///
    /// `feedback` carries the prior attempt's validation errors on a
    /// retry; implementations may use it as extra context or ignore it.
    async fn extract(
        &self,
        email: &EmailInput,
        schema: &VaultSchema,
        feedback: Option<&ValidationOutcome>,
    ) -> Result<ExtractionResult, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn classification_clamps_confidence() {
        assert_eq!(Classification::new(VaultCategory::Healthcare, 1.7).confidence, 1.0);
        assert_eq!(Classification::new(VaultCategory::Healthcare, -0.2).confidence, 0.0);
    }

    #[test]
    fn extraction_result_drops_undeclared_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        let raw = json!({"appointments": [], "made_up": true});
        let result = ExtractionResult::new(schema, raw.as_object().unwrap().clone());
        assert!(result.fields.contains_key("appointments"));
        assert!(!result.fields.contains_key("made_up"));
        assert_eq!(result.schema_version, schema.version());
    }
}
