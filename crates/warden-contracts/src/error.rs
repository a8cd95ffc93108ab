//! Error taxonomy for the WARDEN permission core.
//!
//! Most of these never reach a caller as `Err`: the decision pipeline turns
//! them into deny results and the router turns them into failed responses.
//! They are still typed so each boundary can log and convert precisely.

use thiserror::Error;

use crate::tool::Tool;

/// The unified error type for the WARDEN crates.
#[derive(Debug, Error)]
pub enum WardenError {
    /// No agent with this id is registered. Terminal; never retried.
    #[error("agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },

    /// Registration attempted with an id that is already taken.
    #[error("agent '{agent_id}' is already registered")]
    DuplicateAgent { agent_id: String },

    /// The decision pipeline denied the operation.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        reason: String,
        required_tool: Option<Tool>,
    },

    /// An access pattern failed while deciding. The evaluator converts this
    /// into an uncached deny.
    #[error("access pattern '{pattern_id}' failed: {reason}")]
    PatternEvaluation { pattern_id: String, reason: String },

    /// The access-pattern subsystem as a whole could not run. The decision
    /// engine falls back to the tool-gated check.
    #[error("access pattern system failure: {reason}")]
    PatternSystemFailure { reason: String },

    /// A permission rule was malformed and has not been stored.
    #[error("invalid permission rule: {reason}")]
    RuleValidation { reason: String },

    /// A glob could not be compiled.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An agent handler returned an error.
    #[error("handler for agent '{agent_id}' failed: {reason}")]
    HandlerExecution { agent_id: String, reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;
