//! Access contexts and access-pattern results.
//!
//! The evaluator feeds an `AccessContext` to each access pattern and gets an
//! `AccessPatternResult` back. Contexts are built per request and never
//! stored; results may be cached by the evaluator.

use serde::{Deserialize, Serialize};

use crate::{agent::AgentId, operation::OperationType};

/// The file-specific part of an access context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAccess {
    /// Normalized path being accessed.
    pub file_path: String,
    /// Agent on whose behalf the file is touched.
    pub agent_id: AgentId,
}

/// Everything an access pattern may look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub requester_id: AgentId,
    pub operation: OperationType,
    /// Opaque resource string; equal to the file path for file contexts.
    pub resource: String,
    pub file: Option<FileAccess>,
}

impl AccessContext {
    /// A context for a non-file resource.
    pub fn new(requester_id: AgentId, operation: OperationType, resource: impl Into<String>) -> Self {
        Self {
            requester_id,
            operation,
            resource: resource.into(),
            file: None,
        }
    }

    /// A file access context; `resource` and `file.file_path` are both `path`.
    pub fn for_file(agent_id: AgentId, operation: OperationType, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            requester_id: agent_id.clone(),
            operation,
            resource: path.clone(),
            file: Some(FileAccess {
                file_path: path,
                agent_id,
            }),
        }
    }

    /// The file path when present, otherwise the resource string.
    pub fn path(&self) -> &str {
        self.file
            .as_ref()
            .map(|f| f.file_path.as_str())
            .unwrap_or(&self.resource)
    }
}

/// Severity tag attached to security-relevant results and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Debugging and ranking data carried alongside a pattern result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Priority of the pattern that produced the result; `None` reads as 0.
    #[serde(default)]
    pub priority: Option<i32>,
    /// False when the pattern did not apply to the context.
    #[serde(default = "default_true")]
    pub applicable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_type: Option<String>,
    /// Time window description for time-based patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// Results of every sub-pattern for composite patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_results: Vec<AccessPatternResult>,
}

fn default_true() -> bool {
    true
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self {
            priority: None,
            applicable: true,
            security_level: None,
            violation_type: None,
            window: None,
            sub_results: Vec::new(),
        }
    }
}

/// The decision a single access pattern produced for a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPatternResult {
    pub allowed: bool,
    pub reason: String,
    pub pattern_id: String,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl AccessPatternResult {
    pub const DOES_NOT_APPLY: &'static str = "Pattern does not apply";

    pub fn allow(pattern_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            pattern_id: pattern_id.into(),
            metadata: ResultMetadata::default(),
        }
    }

    pub fn deny(pattern_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            pattern_id: pattern_id.into(),
            metadata: ResultMetadata::default(),
        }
    }

    /// The deny result for a pattern whose `applies_to` returned false.
    pub fn not_applicable(pattern_id: impl Into<String>, priority: i32) -> Self {
        let mut result = Self::deny(pattern_id, Self::DOES_NOT_APPLY);
        result.metadata.priority = Some(priority);
        result.metadata.applicable = false;
        result
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.metadata.priority = Some(priority);
        self
    }

    /// The ranking priority; absent priorities count as 0.
    pub fn priority(&self) -> i32 {
        self.metadata.priority.unwrap_or(0)
    }

    pub fn is_applicable(&self) -> bool {
        self.metadata.applicable
    }
}
