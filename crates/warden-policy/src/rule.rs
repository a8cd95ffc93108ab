//! Override rule storage, validation, and matching.
//!
//! A `RuleSet` keeps rules in insertion order. When several rules match a
//! request the one with the highest priority wins; on equal priority the
//! rule added first wins.

use tracing::debug;

use warden_contracts::{
    agent::AgentId,
    error::{WardenError, WardenResult},
    operation::OperationType,
    permission::PermissionRule,
    tool::Tool,
};
use warden_core::glob;

/// Check that `rule` is well-formed. Invalid rules are never stored.
pub fn validate_rule(rule: &PermissionRule) -> WardenResult<()> {
    let invalid = |reason: String| Err(WardenError::RuleValidation { reason });

    if rule.id.trim().is_empty() {
        return invalid("rule id cannot be empty".to_string());
    }
    if rule.agent_id.trim().is_empty() {
        return invalid(format!("rule '{}': agent_id cannot be empty", rule.id));
    }
    if rule.file_pattern.trim().is_empty() {
        return invalid(format!("rule '{}': file_pattern cannot be empty", rule.id));
    }
    if rule.operations.is_empty() {
        return invalid(format!("rule '{}': operations cannot be empty", rule.id));
    }
    if matches!(&rule.tools, Some(tools) if tools.is_empty()) {
        return invalid(format!(
            "rule '{}': tools must list at least one tool when present",
            rule.id
        ));
    }
    if let Err(e) = glob::compile(&rule.file_pattern) {
        return invalid(format!("rule '{}': {}", rule.id, e));
    }
    Ok(())
}

/// Return true if `rule` applies to this agent, operation, tool, and path.
pub fn rule_matches(
    rule: &PermissionRule,
    agent_id: &AgentId,
    operation: OperationType,
    required: Tool,
    path: &str,
) -> bool {
    rule.targets_agent(agent_id)
        && rule.covers(operation, required)
        && glob::matches(&rule.file_pattern, path)
}

/// Ordered collection of override rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PermissionRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append `rule`. Rejects ids that are already present.
    pub fn add(&mut self, rule: PermissionRule) -> WardenResult<()> {
        validate_rule(&rule)?;
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(WardenError::RuleValidation {
                reason: format!("rule '{}' already exists", rule.id),
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn remove(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() != before
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules targeting `agent_id` (including `"*"` rules), or every rule.
    pub fn for_agent(&self, agent_id: Option<&AgentId>) -> Vec<PermissionRule> {
        self.rules
            .iter()
            .filter(|r| agent_id.map_or(true, |id| r.targets_agent(id)))
            .cloned()
            .collect()
    }

    /// The winning rule for a request, if any rule matches.
    pub fn best_match(
        &self,
        agent_id: &AgentId,
        operation: OperationType,
        required: Tool,
        path: &str,
    ) -> Option<&PermissionRule> {
        let mut best: Option<&PermissionRule> = None;
        for rule in &self.rules {
            if !rule_matches(rule, agent_id, operation, required, path) {
                continue;
            }
            if best.map_or(true, |current| rule.priority > current.priority) {
                best = Some(rule);
            }
        }
        if let Some(rule) = best {
            debug!(rule_id = %rule.id, priority = rule.priority, path = %path, "override rule matched");
        }
        best
    }
}
