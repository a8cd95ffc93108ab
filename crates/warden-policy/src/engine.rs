//! The permission decision engine.
//!
//! `PermissionEngine` implements the `PermissionChecker` trait from
//! warden-core. The full pipeline, in precedence order:
//!
//! 1. Unknown agent → deny "Agent not found".
//! 2. No path (or patterns disabled) → tool-gated check only.
//! 3. Access patterns via `AgentAccessChecker::check_agent_access`.
//!    a. `Err` → warn and fall back entirely to the tool-gated check.
//!    b. `Ok(None)` → the tool-gated result is the base decision.
//!    c. `Ok(Some(best))` → the best pattern result is the base decision.
//! 4. The highest-priority matching override rule replaces the base decision
//!    when its priority beats the pattern's, or when no pattern applied.
//! 5. Tool gate: an agent without the required tool is denied, whatever the
//!    steps above decided.
//! 6. The decision is appended to the bounded audit log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use warden_contracts::{
    access::AccessContext,
    agent::{AgentCapability, AgentId},
    error::{WardenError, WardenResult},
    operation::OperationType,
    permission::{AuditEntry, PermissionResult, PermissionRule},
    tool::{required_tool, Tool},
};
use warden_core::{
    directory::AgentDirectory,
    traits::{AgentAccessChecker, PermissionChecker},
};

use crate::{
    config::{EngineConfig, WardenConfig},
    rule::{validate_rule, RuleSet},
};

/// The WARDEN decision engine.
///
/// ```rust,ignore
/// let directory = Arc::new(AgentDirectory::default());
/// let engine = Arc::new(PermissionEngine::new(directory.clone()));
/// let router = Orchestrator::new(directory, engine.clone());
/// ```
pub struct PermissionEngine {
    directory: Arc<AgentDirectory>,
    access: Arc<dyn AgentAccessChecker>,
    rules: RwLock<RuleSet>,
    /// Config rules whose agent was not registered yet.
    pending: Mutex<Vec<PermissionRule>>,
    audit: Mutex<VecDeque<AuditEntry>>,
    config: EngineConfig,
}

impl PermissionEngine {
    /// An engine with default settings that evaluates patterns through
    /// `directory`.
    pub fn new(directory: Arc<AgentDirectory>) -> Self {
        Self::with_config(directory, EngineConfig::default())
    }

    pub fn with_config(directory: Arc<AgentDirectory>, config: EngineConfig) -> Self {
        let access: Arc<dyn AgentAccessChecker> = directory.clone();
        Self {
            directory,
            access,
            rules: RwLock::new(RuleSet::new()),
            pending: Mutex::new(Vec::new()),
            audit: Mutex::new(VecDeque::new()),
            config,
        }
    }

    /// Build an engine from a loaded configuration, adding its rules in
    /// order. Fails on the first malformed rule.
    ///
    /// Rules for agents that are not registered yet are validated and held
    /// back; call [`load_pending_rules`](Self::load_pending_rules) once the
    /// agents are registered.
    pub fn from_config(directory: Arc<AgentDirectory>, config: &WardenConfig) -> WardenResult<Self> {
        let engine = Self::with_config(directory, config.engine.clone());
        for rule in &config.rules {
            if engine.knows_agent(&rule.agent_id) {
                engine.add_rule(rule.clone())?;
            } else {
                validate_rule(rule)?;
                debug!(rule_id = %rule.id, agent_id = %rule.agent_id, "rule deferred until agent registers");
                engine.lock_pending().push(rule.clone());
            }
        }
        Ok(engine)
    }

    /// Evaluate access patterns through `checker` instead of the directory.
    pub fn with_access_checker(mut self, checker: Arc<dyn AgentAccessChecker>) -> Self {
        self.access = checker;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Rule management ───────────────────────────────────────────────────────

    /// Validate and store an override rule. The rule must target `"*"` or a
    /// registered agent.
    pub fn add_rule(&self, rule: PermissionRule) -> WardenResult<()> {
        validate_rule(&rule)?;
        if !self.knows_agent(&rule.agent_id) {
            return Err(WardenError::RuleValidation {
                reason: format!("rule '{}': unknown agent '{}'", rule.id, rule.agent_id),
            });
        }
        let rule_id = rule.id.clone();
        let (agent_id, priority, allow) = (rule.agent_id.clone(), rule.priority, rule.allow);
        self.write_rules().add(rule)?;
        info!(rule_id = %rule_id, agent_id = %agent_id, priority, allow, "override rule added");
        Ok(())
    }

    /// Add every deferred config rule whose agent is now registered.
    /// Returns how many were added; the rest stay pending.
    pub fn load_pending_rules(&self) -> WardenResult<usize> {
        let ready: Vec<PermissionRule> = {
            let mut pending = self.lock_pending();
            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .drain(..)
                .partition(|rule| self.knows_agent(&rule.agent_id));
            *pending = waiting;
            ready
        };
        let added = ready.len();
        for rule in ready {
            self.add_rule(rule)?;
        }
        Ok(added)
    }

    /// Config rules still waiting for their agent.
    pub fn pending_rules(&self) -> Vec<PermissionRule> {
        self.lock_pending().clone()
    }

    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let removed = self.write_rules().remove(rule_id);
        if removed {
            info!(rule_id = %rule_id, "override rule removed");
        }
        removed
    }

    /// Rules in insertion order, optionally limited to those that target
    /// `agent_id` (wildcard rules included).
    pub fn get_rules(&self, agent_id: Option<&AgentId>) -> Vec<PermissionRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .for_agent(agent_id)
    }

    // ── Audit log ─────────────────────────────────────────────────────────────

    /// Recorded decisions, newest first.
    pub fn get_audit_log(&self, agent_id: Option<&AgentId>, limit: Option<usize>) -> Vec<AuditEntry> {
        let audit = self.lock_audit();
        audit
            .iter()
            .rev()
            .filter(|e| agent_id.map_or(true, |id| &e.agent_id == id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn clear_audit_log(&self) {
        self.lock_audit().clear();
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn write_rules(&self) -> std::sync::RwLockWriteGuard<'_, RuleSet> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<PermissionRule>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn knows_agent(&self, agent_id: &str) -> bool {
        agent_id == PermissionRule::ANY_AGENT || self.directory.contains(&AgentId::new(agent_id))
    }

    fn lock_audit(&self) -> std::sync::MutexGuard<'_, VecDeque<AuditEntry>> {
        self.audit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, agent_id: &AgentId, operation: OperationType, path: Option<&str>, result: &PermissionResult) {
        if !self.config.audit_enabled {
            return;
        }
        let entry = AuditEntry::new(
            agent_id.clone(),
            operation,
            path.map(str::to_string),
            result.clone(),
        );
        let mut audit = self.lock_audit();
        audit.push_back(entry);
        while audit.len() > self.config.max_audit_entries {
            audit.pop_front();
        }
    }

    fn agent_not_found(agent_id: &AgentId, tool: Tool) -> PermissionResult {
        PermissionResult::deny(format!("Agent not found: {}", agent_id)).with_required_tool(tool)
    }

    /// The tool-gated decision.
    fn tool_check(agent: &AgentCapability, tool: Tool) -> PermissionResult {
        if agent.has_tool(tool) {
            PermissionResult::allow(format!("Agent has required tool {}", tool)).with_required_tool(tool)
        } else {
            PermissionResult::deny(format!("Agent lacks required tool {}", tool)).with_required_tool(tool)
        }
    }

    /// Steps 3 and 4: patterns, then override rules.
    async fn pattern_decision(
        &self,
        agent: &AgentCapability,
        operation: OperationType,
        path: &str,
        tool: Tool,
    ) -> PermissionResult {
        let ctx = AccessContext::for_file(agent.id.clone(), operation, path);

        let (base, base_priority, applicable) = match self.access.check_agent_access(&agent.id, &ctx).await {
            Err(err) => {
                warn!(
                    agent_id = %agent.id,
                    path = %path,
                    error = %err,
                    "access pattern system failed, falling back to tool check"
                );
                return Self::tool_check(agent, tool);
            }
            Ok(None) => (Self::tool_check(agent, tool), 0, false),
            Ok(Some(best)) => {
                let priority = best.priority();
                let applicable = best.is_applicable();
                let mut base = if best.allowed {
                    PermissionResult::allow(best.reason)
                } else {
                    PermissionResult::deny(best.reason)
                };
                if !best.allowed {
                    base.violation_type = best.metadata.violation_type;
                }
                (
                    base.with_pattern(best.pattern_id).with_required_tool(tool),
                    priority,
                    applicable,
                )
            }
        };

        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let Some(rule) = rules.best_match(&agent.id, operation, tool, path) else {
            return base;
        };
        if applicable && rule.priority <= base_priority {
            debug!(
                rule_id = %rule.id,
                rule_priority = rule.priority,
                pattern_priority = base_priority,
                "override rule outranked by access pattern"
            );
            return base;
        }

        let verdict = if rule.allow { "allowed" } else { "denied" };
        let reason = match &rule.description {
            Some(description) => format!("Rule {}: access {} ({})", rule.id, verdict, description),
            None => format!("Rule {}: access {}", rule.id, verdict),
        };
        let mut result = if rule.allow {
            PermissionResult::allow(reason)
        } else {
            PermissionResult::deny(reason)
        };
        result.required_tool = Some(tool);
        result.pattern_id = base.pattern_id;
        result.with_rule(&rule.id)
    }
}

#[async_trait]
impl PermissionChecker for PermissionEngine {
    fn check_permission(
        &self,
        agent_id: &AgentId,
        operation: OperationType,
        path: Option<&str>,
    ) -> PermissionResult {
        let tool = required_tool(operation, path);
        let result = match self.directory.get(agent_id) {
            Some(agent) => Self::tool_check(&agent, tool),
            None => Self::agent_not_found(agent_id, tool),
        };
        self.record(agent_id, operation, path, &result);
        result
    }

    async fn check_permission_async(
        &self,
        agent_id: &AgentId,
        operation: OperationType,
        path: Option<&str>,
    ) -> PermissionResult {
        let tool = required_tool(operation, path);

        // ── Step 1: Agent lookup ─────────────────────────────────────────────
        let Some(agent) = self.directory.get(agent_id) else {
            let result = Self::agent_not_found(agent_id, tool);
            warn!(agent_id = %agent_id, operation = %operation, "permission check for unknown agent");
            self.record(agent_id, operation, path, &result);
            return result;
        };

        // ── Steps 2-4: Patterns and override rules ───────────────────────────
        let mut result = match path {
            Some(path) if self.config.patterns_enabled => {
                self.pattern_decision(&agent, operation, path, tool).await
            }
            _ => Self::tool_check(&agent, tool),
        };

        // ── Step 5: Tool gate ────────────────────────────────────────────────
        //
        // Final. No pattern or rule can grant a tool the agent does not hold.
        if !agent.has_tool(tool) && result.allowed {
            warn!(
                agent_id = %agent_id,
                tool = %tool,
                "allow overridden by tool gate"
            );
            result.allowed = false;
            result.reason = format!("Agent lacks required tool {}", tool);
        }
        result.required_tool = Some(tool);

        debug!(
            agent_id = %agent_id,
            operation = %operation,
            path = ?path,
            allowed = result.allowed,
            reason = %result.reason,
            "permission decided"
        );

        // ── Step 6: Audit ────────────────────────────────────────────────────
        self.record(agent_id, operation, path, &result);
        result
    }
}
