//! Workflow orchestrator — drives the per-email state machine.
//!
//! One run per email, no shared mutable state between runs beyond the
//! read-only schema registry, so runs execute fully in parallel. Within a
//! run the stages are strictly sequential; the agent's classify/extract
//! calls are the only suspension points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Classification, ExtractionResult, InferenceAgent};
use crate::config::WorkflowConfig;
use crate::email::EmailInput;
use crate::error::{InferenceError, WorkflowError};
use crate::pipeline::state::{RunState, StateTransition};
use crate::pipeline::types::{AgentResponse, RunStatus};
use crate::pipeline::validate::{ValidationOutcome, validate};
use crate::schema::{SchemaRegistry, VaultCategory};

/// The classification → extraction → validation → finalization pipeline.
///
/// Guarantees per run: exactly one classify call, at most
/// `1 + max_retries` extract calls, exactly one terminal
/// [`AgentResponse`]. Stage errors never escape — "fatal" means the
/// response's status is `Failed`, not that anything is raised.
#[derive(Clone)]
pub struct Workflow {
    agent: Arc<dyn InferenceAgent>,
    registry: Arc<SchemaRegistry>,
    config: WorkflowConfig,
}

/// Handle to a spawned run: carries the run id, a cancellation switch,
/// and resolves to the terminal response.
///
/// Cancellation prevents further stage transitions; it cannot abort an
/// agent call already in flight (that call's timeout still applies).
pub struct RunHandle {
    run_id: Uuid,
    cancel: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<AgentResponse>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the run to reach its terminal state.
    pub async fn wait(self) -> crate::error::Result<AgentResponse> {
        self.task.await.map_err(|e| {
            WorkflowError::TaskFailed {
                run_id: self.run_id,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Per-run bookkeeping: current state, transition history, call counter.
struct RunContext {
    run_id: Uuid,
    state: RunState,
    transitions: Vec<StateTransition>,
    agent_calls: u32,
}

impl RunContext {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Pending,
            transitions: Vec::new(),
            agent_calls: 0,
        }
    }

    fn transition(&mut self, to: RunState, reason: Option<String>) {
        debug_assert!(
            self.state.can_transition_to(to),
            "invalid transition {} -> {}",
            self.state,
            to
        );
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            timestamp: Utc::now(),
            reason,
        });
        self.state = to;
    }
}

impl Workflow {
    pub fn new(
        agent: Arc<dyn InferenceAgent>,
        registry: Arc<SchemaRegistry>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            agent,
            registry,
            config,
        }
    }

    /// Process one email to its terminal response. The caller awaits the
    /// full run (the synchronous pattern).
    pub async fn run(&self, email: EmailInput) -> AgentResponse {
        self.execute(email, Uuid::new_v4(), Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Process one email on a background task (the non-blocking pattern).
    /// The returned handle can cancel the run and awaits the terminal
    /// response.
    pub fn spawn(&self, email: EmailInput) -> RunHandle {
        let run_id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let workflow = self.clone();
        let flag = Arc::clone(&cancel);
        let task = tokio::spawn(async move { workflow.execute(email, run_id, flag).await });
        RunHandle {
            run_id,
            cancel,
            task,
        }
    }

    async fn execute(
        &self,
        email: EmailInput,
        run_id: Uuid,
        cancel: Arc<AtomicBool>,
    ) -> AgentResponse {
        let mut ctx = RunContext::new(run_id);
        let mut errors: Vec<String> = Vec::new();

        ctx.transition(RunState::Classifying, None);
        let started = Instant::now();
        info!(
            run_id = %run_id,
            agent = self.agent.name(),
            from = %email.from,
            subject = %email.subject,
            "run started"
        );

        // Stage 1: classify. Failure here is fatal for the run — a second
        // call against an unreachable backend is assumed non-recoverable.
        let classification = match self.classify_bounded(&email, &mut ctx).await {
            Ok(classification) => classification,
            Err(e) => {
                errors.push(e.to_string());
                ctx.transition(RunState::Finalizing, Some("classification failed".into()));
                return self.finalize(
                    ctx,
                    started,
                    RunStatus::Failed,
                    VaultCategory::Unknown,
                    0.0,
                    None,
                    Vec::new(),
                    errors,
                );
            }
        };

        let confidence = classification.confidence.clamp(0.0, 1.0);
        let below_threshold = confidence < self.config.confidence_threshold;
        debug!(
            run_id = %run_id,
            category = %classification.category,
            confidence,
            "classified"
        );
        if below_threshold {
            warn!(
                run_id = %run_id,
                confidence,
                threshold = self.config.confidence_threshold,
                "confidence below acceptance threshold, proceeding best-effort"
            );
        }

        // Stage 2: resolve the schema. Unknown or unregistered categories
        // degrade to the open schema rather than failing the run.
        let (schema, resolution_miss) = self.registry.resolve_or_degenerate(classification.category);
        if let Some(e) = resolution_miss {
            errors.push(e.to_string());
        }
        if schema.is_open() {
            debug!(run_id = %run_id, category = %classification.category, "using degenerate schema");
        }

        // Stages 3–4: extract and validate, with bounded re-extraction.
        ctx.transition(RunState::Extracting, None);

        let mut attempt: u32 = 0;
        let mut last_extraction: Option<ExtractionResult> = None;
        let mut last_outcome: Option<ValidationOutcome> = None;
        let mut cancelled = false;

        loop {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                errors.push("run cancelled".into());
                break;
            }

            attempt += 1;
            let feedback = if self.config.feedback_on_retry {
                last_outcome.as_ref()
            } else {
                None
            };
            match self
                .extract_bounded(&email, schema, feedback, &mut ctx)
                .await
            {
                Ok(extraction) => {
                    ctx.transition(RunState::Validating, None);
                    let outcome = validate(&extraction, schema);
                    last_extraction = Some(extraction);
                    let valid = outcome.valid;
                    let failed_fields = outcome.errors.len();
                    last_outcome = Some(outcome);
                    if valid {
                        break;
                    }
                    warn!(
                        run_id = %run_id,
                        attempt,
                        failed_fields,
                        "extraction failed validation"
                    );
                }
                Err(e) => {
                    warn!(run_id = %run_id, attempt, error = %e, "extraction attempt failed");
                    errors.push(e.to_string());
                }
            }

            // attempt counts completed tries; total tries ≤ 1 + max_retries
            if attempt > self.config.max_retries {
                break;
            }

            ctx.transition(
                RunState::RetryingExtraction,
                Some(format!("attempt {attempt} unsuccessful")),
            );
            if !self.config.retry_backoff.is_zero() {
                tokio::time::sleep(self.config.retry_backoff).await;
            }
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                errors.push("run cancelled".into());
                break;
            }
            ctx.transition(RunState::Extracting, None);
        }

        // Stage 5: finalize.
        ctx.transition(
            RunState::Finalizing,
            cancelled.then(|| "cancelled".to_string()),
        );

        let validation_passed = last_outcome.as_ref().is_some_and(|o| o.valid);
        let has_fields = last_extraction
            .as_ref()
            .is_some_and(|e| !e.fields.is_empty());

        let status = if !cancelled && validation_passed && has_fields {
            if below_threshold {
                RunStatus::LowConfidence
            } else {
                RunStatus::Completed
            }
        } else {
            RunStatus::Failed
        };

        if status == RunStatus::Failed && !cancelled {
            if validation_passed && !has_fields {
                errors.push("extraction returned no usable fields".into());
            } else if !validation_passed && last_outcome.is_some() && errors.is_empty() {
                errors.push(format!(
                    "extraction failed validation after {attempt} attempts"
                ));
            }
        }

        let validation_errors = last_outcome
            .map(|o| o.errors.iter().map(ToString::to_string).collect())
            .unwrap_or_default();

        self.finalize(
            ctx,
            started,
            status,
            classification.category,
            confidence,
            last_extraction.map(|e| e.fields),
            validation_errors,
            errors,
        )
    }

    /// Assemble the single terminal response and close out the run.
    #[allow(clippy::too_many_arguments)]
    fn finalize(
        &self,
        mut ctx: RunContext,
        started: Instant,
        status: RunStatus,
        category: VaultCategory,
        confidence: f32,
        extracted_data: Option<serde_json::Map<String, serde_json::Value>>,
        validation_errors: Vec<String>,
        mut errors: Vec<String>,
    ) -> AgentResponse {
        // A failed run always explains itself.
        if status == RunStatus::Failed && errors.is_empty() {
            errors.push("run failed".into());
        }

        let processing_time = started.elapsed();
        let terminal = match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Failed => RunState::Failed,
            RunStatus::LowConfidence => RunState::LowConfidence,
        };
        ctx.transition(terminal, None);

        info!(
            run_id = %ctx.run_id,
            status = %status,
            category = %category,
            agent_calls = ctx.agent_calls,
            elapsed_ms = processing_time.as_millis() as u64,
            "run finished"
        );

        AgentResponse {
            run_id: ctx.run_id,
            category,
            confidence,
            extracted_data,
            validation_errors,
            errors,
            processing_time,
            agent_calls: ctx.agent_calls,
            status,
            transitions: ctx.transitions,
            completed_at: Utc::now(),
        }
    }

    async fn classify_bounded(
        &self,
        email: &EmailInput,
        ctx: &mut RunContext,
    ) -> Result<Classification, InferenceError> {
        ctx.agent_calls += 1;
        match tokio::time::timeout(self.config.call_timeout, self.agent.classify(email)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout {
                timeout: self.config.call_timeout,
            }),
        }
    }

    async fn extract_bounded(
        &self,
        email: &EmailInput,
        schema: &crate::schema::VaultSchema,
        feedback: Option<&ValidationOutcome>,
        ctx: &mut RunContext,
    ) -> Result<ExtractionResult, InferenceError> {
        ctx.agent_calls += 1;
        match tokio::time::timeout(
            self.config.call_timeout,
            self.agent.extract(email, schema, feedback),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout {
                timeout: self.config.call_timeout,
            }),
        }
    }
}
