//! Model-backed agent speaking to an OpenAI-compatible chat endpoint.
//!
//! The pipeline is blind to whether this points at a local inference
//! server or a remote API — anything serving `/chat/completions` works.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::email::EmailInput;
use crate::error::InferenceError;
use crate::pipeline::validate::ValidationOutcome;
use crate::schema::{VaultCategory, VaultSchema};

use super::{Classification, ExtractionResult, InferenceAgent};

/// Max email body characters embedded in a prompt.
const EMAIL_PROMPT_MAX_CHARS: usize = 4000;

/// Configuration for the HTTP-backed agent.
#[derive(Debug, Clone)]
pub struct HttpAgentConfig {
    /// Base URL of the inference server, e.g. `http://localhost:11434/v1`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    /// Kept low — classification and extraction want determinism.
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for HttpAgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

/// Inference agent backed by an OpenAI-compatible chat-completions API.
pub struct HttpAgent {
    config: HttpAgentConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl HttpAgent {
    pub fn new(config: HttpAgentConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    /// One chat completion round-trip. Returns the assistant text.
    async fn chat(&self, system: &str, user: &str) -> Result<String, String> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("backend returned {status}: {text}"));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed completion response: {e}"))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "completion response had no content".to_string())
    }
}

#[async_trait::async_trait]
impl InferenceAgent for HttpAgent {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn classify(&self, email: &EmailInput) -> Result<Classification, InferenceError> {
        let system = build_classify_system_prompt();
        let user = email.format_for_prompt(EMAIL_PROMPT_MAX_CHARS);

        let raw = self
            .chat(&system, &user)
            .await
            .map_err(|reason| InferenceError::Classification { reason })?;

        parse_classification(&raw).map_err(|reason| {
            warn!(raw = %raw, "unparseable classification output");
            InferenceError::Classification { reason }
        })
    }

    async fn extract(
        &self,
        email: &EmailInput,
        schema: &VaultSchema,
        feedback: Option<&ValidationOutcome>,
    ) -> Result<ExtractionResult, InferenceError> {
        let system = build_extract_system_prompt(schema);
        let user = build_extract_user_prompt(email, feedback);

        debug!(
            category = %schema.category(),
            retry_feedback = feedback.is_some(),
            "requesting extraction"
        );

        let raw = self
            .chat(&system, &user)
            .await
            .map_err(|reason| InferenceError::Extraction { reason })?;

        parse_extraction(&raw, schema).map_err(|reason| {
            warn!(raw = %raw, "unparseable extraction output");
            InferenceError::Extraction { reason }
        })
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_system_prompt() -> String {
    let mut categories = String::new();
    for category in VaultCategory::KNOWN {
        categories.push_str(&format!("- \"{}\"\n", category.label()));
    }
    format!(
        "You are an email vault classifier. Decide which vault category the \
         email belongs to.\n\nCategories:\n{categories}- \"unknown\": none of the above\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"category\": \"...\", \"confidence\": 0.0, \"reasoning\": \"...\"}}\n\n\
         Rules:\n\
         - confidence is a number between 0.0 and 1.0\n\
         - reasoning is one short sentence\n\
         - choose \"unknown\" when no category clearly fits"
    )
}

fn build_extract_system_prompt(schema: &VaultSchema) -> String {
    format!(
        "You are a structured-data extractor for an email vault.\n\n{}\n\n\
         Respond with ONLY the JSON object, no surrounding prose.",
        schema.prompt_definition()
    )
}

fn build_extract_user_prompt(email: &EmailInput, feedback: Option<&ValidationOutcome>) -> String {
    let mut prompt = email.format_for_prompt(EMAIL_PROMPT_MAX_CHARS);
    if let Some(outcome) = feedback
        && !outcome.errors.is_empty()
    {
        prompt.push_str("\n\nYour previous extraction had these problems:\n");
        for error in &outcome.errors {
            prompt.push_str(&format!("- {error}\n"));
        }
        prompt.push_str("Produce a corrected extraction.");
    }
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    category: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

fn parse_classification(raw: &str) -> Result<Classification, String> {
    let json_str = extract_json_object(raw);
    let response: ClassifyResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let mut classification = Classification::new(
        VaultCategory::from_label(&response.category),
        response.confidence,
    );
    if !response.reasoning.is_empty() {
        classification.reasoning = Some(response.reasoning);
    }
    Ok(classification)
}

fn parse_extraction(raw: &str, schema: &VaultSchema) -> Result<ExtractionResult, String> {
    let json_str = extract_json_object(raw);
    let value: serde_json::Value =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let map = value
        .as_object()
        .cloned()
        .ok_or_else(|| "extraction output is not a JSON object".to_string())?;

    Ok(ExtractionResult::new(schema, map))
}

/// Extract a JSON object from model output (handles markdown wrapping
/// and surrounding prose).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailAddress;
    use crate::pipeline::validate::FieldError;
    use crate::schema::{FieldShape, SchemaRegistry};
    use chrono::Utc;

    fn email() -> EmailInput {
        EmailInput {
            from: EmailAddress::new("smith@clinic.example"),
            to: vec![EmailAddress::new("me@example.com")],
            cc: vec![],
            subject: "Appointment".into(),
            body: "See you Jan 15 at 10am.".into(),
            received_at: Utc::now(),
            attachments: vec![],
        }
    }

    #[test]
    fn classify_prompt_lists_all_categories() {
        let prompt = build_classify_system_prompt();
        for category in VaultCategory::KNOWN {
            assert!(prompt.contains(category.label()));
        }
        assert!(prompt.contains("unknown"));
    }

    #[test]
    fn extract_prompt_carries_schema_contract() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        let prompt = build_extract_system_prompt(schema);
        assert!(prompt.contains("appointments"));
        assert!(prompt.contains("ONLY the JSON object"));
    }

    #[test]
    fn extract_user_prompt_includes_feedback() {
        let outcome = ValidationOutcome {
            valid: false,
            errors: vec![FieldError {
                field: "appointments".into(),
                expected: FieldShape::List,
                problem: "expected list, got string".into(),
            }],
        };
        let prompt = build_extract_user_prompt(&email(), Some(&outcome));
        assert!(prompt.contains("previous extraction"));
        assert!(prompt.contains("appointments"));
    }

    #[test]
    fn extract_user_prompt_without_feedback_is_plain() {
        let prompt = build_extract_user_prompt(&email(), None);
        assert!(!prompt.contains("previous extraction"));
    }

    #[test]
    fn parse_classification_happy_path() {
        let raw = r#"{"category": "healthcare", "confidence": 0.92, "reasoning": "mentions an appointment"}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.category, VaultCategory::Healthcare);
        assert!((c.confidence - 0.92).abs() < 0.01);
        assert!(c.reasoning.is_some());
    }

    #[test]
    fn parse_classification_clamps_confidence() {
        let raw = r#"{"category": "financial", "confidence": 1.8}"#;
        let c = parse_classification(raw).unwrap();
        assert!((c.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn parse_classification_unknown_label() {
        let raw = r#"{"category": "gardening", "confidence": 0.5}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.category, VaultCategory::Unknown);
    }

    #[test]
    fn parse_classification_garbage_fails() {
        assert!(parse_classification("I cannot classify this email.").is_err());
    }

    #[test]
    fn parse_classification_from_markdown_block() {
        let raw = "Here you go:\n```json\n{\"category\": \"legal\", \"confidence\": 0.7}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.category, VaultCategory::Legal);
    }

    #[test]
    fn parse_extraction_filters_to_schema() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        let raw = r#"{"appointments": [{"date": "2026-01-15"}], "invented": 1}"#;
        let result = parse_extraction(raw, schema).unwrap();
        assert!(result.fields.contains_key("appointments"));
        assert!(!result.fields.contains_key("invented"));
    }

    #[test]
    fn parse_extraction_non_object_fails() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        assert!(parse_extraction(r#"["not", "an", "object"]"#, schema).is_err());
        assert!(parse_extraction("no json here", schema).is_err());
    }

    #[test]
    fn extract_json_embedded_in_prose() {
        let input = "My analysis: {\"category\": \"legal\"} hope that helps.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(input), input);
    }
}
