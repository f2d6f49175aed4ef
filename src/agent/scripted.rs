//! Deterministic agent stand-in for pipeline-logic tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::email::EmailInput;
use crate::error::InferenceError;
use crate::pipeline::validate::ValidationOutcome;
use crate::schema::{VaultCategory, VaultSchema};

use super::{Classification, ExtractionResult, InferenceAgent};

#[derive(Debug, Clone)]
enum ClassifyStep {
    Ok(Classification),
    Err(String),
}

#[derive(Debug, Clone)]
enum ExtractStep {
    Ok(serde_json::Map<String, serde_json::Value>),
    Err(String),
}

/// Scripted agent: fixed classify/extract responses, zero network I/O.
///
/// Responses are consumed in order; the final entry in each script repeats
/// forever, so "always returns X" scenarios need only one entry. An
/// invocation counter and the feedback each extract call received are
/// exposed for test assertions.
#[derive(Default)]
pub struct ScriptedAgent {
    classify_script: Mutex<VecDeque<ClassifyStep>>,
    extract_script: Mutex<VecDeque<ExtractStep>>,
    invocations: AtomicU32,
    feedback_seen: Mutex<Vec<Option<ValidationOutcome>>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful classification.
    pub fn classify_ok(self, category: VaultCategory, confidence: f32) -> Self {
        self.classify_script
            .lock()
            .expect("classify script lock")
            .push_back(ClassifyStep::Ok(Classification::new(category, confidence)));
        self
    }

    /// Queue a failing classification.
    pub fn classify_err(self, reason: impl Into<String>) -> Self {
        self.classify_script
            .lock()
            .expect("classify script lock")
            .push_back(ClassifyStep::Err(reason.into()));
        self
    }

    /// Queue a successful extraction. `fields` must be a JSON object.
    pub fn extract_ok(self, fields: serde_json::Value) -> Self {
        let map = fields
            .as_object()
            .cloned()
            .expect("scripted extraction fields must be a JSON object");
        self.extract_script
            .lock()
            .expect("extract script lock")
            .push_back(ExtractStep::Ok(map));
        self
    }

    /// Queue a failing extraction.
    pub fn extract_err(self, reason: impl Into<String>) -> Self {
        self.extract_script
            .lock()
            .expect("extract script lock")
            .push_back(ExtractStep::Err(reason.into()));
        self
    }

    /// Total classify + extract invocations across all runs.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// The feedback argument each extract call received, in call order.
    pub fn feedback_seen(&self) -> Vec<Option<ValidationOutcome>> {
        self.feedback_seen
            .lock()
            .expect("feedback lock")
            .clone()
    }

    fn next<T: Clone>(script: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = script.lock().expect("script lock");
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl InferenceAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _email: &EmailInput) -> Result<Classification, InferenceError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match Self::next(&self.classify_script) {
            Some(ClassifyStep::Ok(classification)) => Ok(classification),
            Some(ClassifyStep::Err(reason)) => Err(InferenceError::Classification { reason }),
            None => Err(InferenceError::Classification {
                reason: "scripted agent has no classify responses".into(),
            }),
        }
    }

    async fn extract(
        &self,
        _email: &EmailInput,
        schema: &VaultSchema,
        feedback: Option<&ValidationOutcome>,
    ) -> Result<ExtractionResult, InferenceError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.feedback_seen
            .lock()
            .expect("feedback lock")
            .push(feedback.cloned());
        match Self::next(&self.extract_script) {
            Some(ExtractStep::Ok(fields)) => Ok(ExtractionResult::new(schema, fields)),
            Some(ExtractStep::Err(reason)) => Err(InferenceError::Extraction { reason }),
            None => Err(InferenceError::Extraction {
                reason: "scripted agent has no extract responses".into(),
            }),
        }
    }
}
