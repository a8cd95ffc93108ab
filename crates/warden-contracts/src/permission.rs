//! Permission decisions, operator override rules, and decision audit entries.
//!
//! The decision engine produces a `PermissionResult` for every check and
//! appends a matching `AuditEntry`. `PermissionRule`s are the operator's
//! escape hatch: they can flip a pattern-based decision in either direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{agent::AgentId, operation::OperationType, tool::Tool};

/// An operator-supplied rule that overrides pattern-based decisions.
///
/// Example in TOML:
/// ```toml
/// [[rules]]
/// id = "protect-secrets"
/// agent_id = "*"
/// file_pattern = "secrets/**"
/// operations = ["EDIT_FILE", "DELETE_FILE"]
/// allow = false
/// priority = 95
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub id: String,
    /// Agent the rule applies to, or `"*"` for every agent.
    pub agent_id: String,
    pub file_pattern: String,
    pub operations: Vec<OperationType>,
    /// When set, the rule only applies if the required tool is listed.
    #[serde(default)]
    pub tools: Option<Vec<Tool>>,
    pub allow: bool,
    pub priority: i32,
    #[serde(default)]
    pub description: Option<String>,
}

impl PermissionRule {
    pub const ANY_AGENT: &'static str = "*";

    /// Return true if the rule targets `agent_id` (directly or via `"*"`).
    pub fn targets_agent(&self, agent_id: &AgentId) -> bool {
        self.agent_id == Self::ANY_AGENT || self.agent_id == agent_id.0
    }

    /// Return true if the rule covers `operation` and, when restricted by
    /// tools, `required`.
    pub fn covers(&self, operation: OperationType, required: Tool) -> bool {
        if !self.operations.contains(&operation) {
            return false;
        }
        match &self.tools {
            Some(tools) => tools.contains(&required),
            None => true,
        }
    }
}

/// The decision returned by the permission engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResult {
    pub allowed: bool,
    pub reason: String,
    /// The tool the operation needed.
    #[serde(default)]
    pub required_tool: Option<Tool>,
    /// Ids of override rules that shaped the decision.
    #[serde(default)]
    pub applied_rules: Vec<String>,
    /// Id of the access pattern that produced the base decision, if any.
    #[serde(default)]
    pub pattern_id: Option<String>,
    /// Set when a security check vetoed the request, e.g. `"path_traversal"`.
    #[serde(default)]
    pub violation_type: Option<String>,
}

impl PermissionResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            required_tool: None,
            applied_rules: Vec::new(),
            pattern_id: None,
            violation_type: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            ..Self::allow(reason)
        }
    }

    pub fn with_required_tool(mut self, tool: Tool) -> Self {
        self.required_tool = Some(tool);
        self
    }

    pub fn with_pattern(mut self, pattern_id: impl Into<String>) -> Self {
        self.pattern_id = Some(pattern_id.into());
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.applied_rules.push(rule_id.into());
        self
    }

    pub fn with_violation(mut self, violation_type: impl Into<String>) -> Self {
        self.violation_type = Some(violation_type.into());
        self
    }
}

/// One decision recorded by the engine's bounded audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: AgentId,
    pub operation: OperationType,
    pub file_path: Option<String>,
    pub result: PermissionResult,
    pub applied_rules: Vec<String>,
}

impl AuditEntry {
    pub fn new(
        agent_id: AgentId,
        operation: OperationType,
        file_path: Option<String>,
        result: PermissionResult,
    ) -> Self {
        let applied_rules = result.applied_rules.clone();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            agent_id,
            operation,
            file_path,
            result,
            applied_rules,
        }
    }
}
