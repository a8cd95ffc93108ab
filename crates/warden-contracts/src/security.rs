//! Security event records.
//!
//! These are what the router (or any caller) hands to a security event sink.
//! The auditor wraps each one with sequencing and hashes before storing it.

use serde::{Deserialize, Serialize};

use crate::{access::SecurityLevel, agent::AgentId, operation::OperationType};

/// What kind of security-relevant thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    AccessGranted,
    AccessDenied,
    ToolAccessDenied,
    SecurityViolation,
    RuleChanged,
    AgentRegistered,
    AgentUnregistered,
}

/// A security event as submitted to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventRecord {
    pub kind: SecurityEventKind,
    pub agent_id: AgentId,
    pub operation: Option<OperationType>,
    pub resource: Option<String>,
    pub allowed: bool,
    pub reason: String,
    pub severity: SecurityLevel,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SecurityEventRecord {
    pub fn new(kind: SecurityEventKind, agent_id: AgentId, allowed: bool, reason: impl Into<String>) -> Self {
        let severity = if allowed {
            SecurityLevel::Low
        } else {
            SecurityLevel::Medium
        };
        Self {
            kind,
            agent_id,
            operation: None,
            resource: None,
            allowed,
            reason: reason.into(),
            severity,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_operation(mut self, operation: OperationType) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_severity(mut self, severity: SecurityLevel) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
