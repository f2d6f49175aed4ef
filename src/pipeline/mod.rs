//! Email → vault processing pipeline.
//!
//! Every inbound email flows through one workflow run:
//! 1. classify — the agent assigns a vault category and confidence
//! 2. resolve — the registry supplies that category's field schema
//! 3. extract — the agent pulls structured fields against the schema
//! 4. validate — pure per-field shape checks; bounded re-extraction on failure
//! 5. finalize — exactly one immutable `AgentResponse` per run
//!
//! Stage errors never propagate past the orchestrator — callers always
//! receive a well-formed response.

pub mod orchestrator;
pub mod state;
pub mod types;
pub mod validate;

pub use orchestrator::{RunHandle, Workflow};
pub use types::{AgentResponse, RunStatus};
pub use validate::{FieldError, ValidationOutcome, validate};
