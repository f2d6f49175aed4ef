//! Vault Agent — email → vault classification and extraction core.
//!
//! An inbound email is classified into a vault category, structured data
//! is extracted against that category's schema, validated, and finalized
//! into one confidence-scored [`pipeline::AgentResponse`] for downstream
//! storage or human review.

pub mod agent;
pub mod config;
pub mod email;
pub mod error;
pub mod pipeline;
pub mod schema;
