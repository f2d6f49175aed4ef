//! Error types for the vault agent.

use std::time::Duration;

use crate::schema::VaultCategory;

/// Top-level error type for the crate.
///
/// Inference and validation failures never escape the workflow — they are
/// folded into the terminal `AgentResponse`. This type covers everything
/// outside a run: configuration, email parsing, and run-handle plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Schema registry errors.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("No schema registered for vault category '{category}'")]
    UnknownCategory { category: VaultCategory },
}

/// Inference agent errors.
///
/// Classification failures are fatal for a run (no retry); extraction
/// failures and timeouts are retried up to the configured bound.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Classification failed: {reason}")]
    Classification { reason: String },

    #[error("Extraction failed: {reason}")]
    Extraction { reason: String },

    #[error("Agent call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Email ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to parse raw message: {0}")]
    Parse(String),
}

/// Workflow plumbing errors (run handles, not run outcomes).
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Run {run_id} task terminated abnormally: {reason}")]
    TaskFailed { run_id: uuid::Uuid, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
