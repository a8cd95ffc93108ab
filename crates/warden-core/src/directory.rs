//! The agent directory.
//!
//! Holds every registered `AgentCapability` in registration order, answers
//! "who owns this path" and "does this agent hold tool T", and keeps the
//! access patterns attached to each agent (plus global patterns that apply
//! to all agents). Lookups are linear in agents × patterns; nothing is
//! cached here.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    agent::{AgentCapability, AgentId},
    error::{WardenError, WardenResult},
    tool::Tool,
};

use crate::{
    evaluator::AccessPatternEvaluator,
    glob::{self, Specificity},
    traits::{AccessPattern, AgentAccessChecker},
};

#[derive(Default)]
struct PatternTable {
    global: Vec<Arc<dyn AccessPattern>>,
    per_agent: HashMap<AgentId, Vec<Arc<dyn AccessPattern>>>,
}

/// Registry of agents and their access patterns.
pub struct AgentDirectory {
    agents: RwLock<Vec<AgentCapability>>,
    patterns: RwLock<PatternTable>,
    evaluator: Arc<AccessPatternEvaluator>,
}

impl AgentDirectory {
    pub fn new(evaluator: Arc<AccessPatternEvaluator>) -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
            patterns: RwLock::new(PatternTable::default()),
            evaluator,
        }
    }

    pub fn evaluator(&self) -> &Arc<AccessPatternEvaluator> {
        &self.evaluator
    }

    /// Register an agent.
    ///
    /// Rejects duplicate ids and directory patterns that are not valid globs.
    pub fn register(&self, agent: AgentCapability) -> WardenResult<()> {
        for pattern in &agent.directory_patterns {
            glob::compile(pattern)?;
        }

        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        if agents.iter().any(|a| a.id == agent.id) {
            return Err(WardenError::DuplicateAgent {
                agent_id: agent.id.0,
            });
        }

        info!(
            agent_id = %agent.id,
            tools = agent.tools.len(),
            patterns = agent.directory_patterns.len(),
            "agent registered"
        );
        agents.push(agent);
        Ok(())
    }

    /// Remove an agent and every access pattern attached to it.
    pub fn unregister(&self, agent_id: &AgentId) -> bool {
        let removed = {
            let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
            let before = agents.len();
            agents.retain(|a| &a.id != agent_id);
            agents.len() != before
        };

        if removed {
            let mut table = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
            table.per_agent.remove(agent_id);
            info!(agent_id = %agent_id, "agent unregistered");
        }
        removed
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<AgentCapability> {
        let agents = self.agents.read().unwrap_or_else(PoisonError::into_inner);
        agents.iter().find(|a| &a.id == agent_id).cloned()
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        let agents = self.agents.read().unwrap_or_else(PoisonError::into_inner);
        agents.iter().any(|a| &a.id == agent_id)
    }

    /// Every agent, in registration order.
    pub fn all(&self) -> Vec<AgentCapability> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the agent responsible for `path`.
    ///
    /// When several agents have a matching directory pattern, the agent with
    /// the most specific matching pattern wins; remaining ties go to the
    /// agent registered first.
    pub fn find_responsible_agent(&self, path: &str) -> Option<AgentCapability> {
        let agents = self.agents.read().unwrap_or_else(PoisonError::into_inner);

        let mut best: Option<(Specificity, &AgentCapability)> = None;
        for agent in agents.iter() {
            let strongest = agent
                .directory_patterns
                .iter()
                .filter(|p| glob::matches(p, path))
                .map(|p| Specificity::of(p))
                .max();

            if let Some(specificity) = strongest {
                let better = match &best {
                    Some((current, _)) => specificity > *current,
                    None => true,
                };
                if better {
                    best = Some((specificity, agent));
                }
            }
        }

        let found = best.map(|(_, agent)| agent.clone());
        debug!(
            path = %path,
            agent_id = ?found.as_ref().map(|a| a.id.0.as_str()),
            "resolved responsible agent"
        );
        found
    }

    /// Return true if `agent_id` is registered and holds `tool`.
    pub fn has_tool(&self, agent_id: &AgentId, tool: Tool) -> bool {
        let agents = self.agents.read().unwrap_or_else(PoisonError::into_inner);
        agents
            .iter()
            .find(|a| &a.id == agent_id)
            .map(|a| a.has_tool(tool))
            .unwrap_or(false)
    }

    // ── Access patterns ───────────────────────────────────────────────────────

    /// Attach an access pattern to a registered agent.
    pub fn add_pattern(&self, agent_id: &AgentId, pattern: Arc<dyn AccessPattern>) -> WardenResult<()> {
        if !self.contains(agent_id) {
            return Err(WardenError::AgentNotFound {
                agent_id: agent_id.0.clone(),
            });
        }
        let mut table = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        debug!(agent_id = %agent_id, pattern_id = %pattern.id(), "access pattern attached");
        table
            .per_agent
            .entry(agent_id.clone())
            .or_default()
            .push(pattern);
        Ok(())
    }

    /// Attach an access pattern evaluated for every agent.
    pub fn add_global_pattern(&self, pattern: Arc<dyn AccessPattern>) {
        let mut table = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        debug!(pattern_id = %pattern.id(), "global access pattern attached");
        table.global.push(pattern);
    }

    /// Remove every pattern with `pattern_id`, agent-scoped or global.
    pub fn remove_pattern(&self, pattern_id: &str) -> bool {
        let mut table = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;

        let before = table.global.len();
        table.global.retain(|p| p.id() != pattern_id);
        removed |= table.global.len() != before;

        for patterns in table.per_agent.values_mut() {
            let before = patterns.len();
            patterns.retain(|p| p.id() != pattern_id);
            removed |= patterns.len() != before;
        }
        removed
    }

    /// The patterns evaluated for `agent_id`: its own first, then global.
    pub fn patterns_for(&self, agent_id: &AgentId) -> Vec<Arc<dyn AccessPattern>> {
        let table = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
        table
            .per_agent
            .get(agent_id)
            .into_iter()
            .flatten()
            .chain(table.global.iter())
            .cloned()
            .collect()
    }
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new(Arc::new(AccessPatternEvaluator::default()))
    }
}

#[async_trait]
impl AgentAccessChecker for AgentDirectory {
    async fn check_agent_access(
        &self,
        agent_id: &AgentId,
        ctx: &AccessContext,
    ) -> WardenResult<Option<AccessPatternResult>> {
        let patterns = {
            let agents = self.agents.read().map_err(|e| WardenError::PatternSystemFailure {
                reason: format!("agent table lock poisoned: {}", e),
            })?;
            if !agents.iter().any(|a| &a.id == agent_id) {
                return Err(WardenError::PatternSystemFailure {
                    reason: format!("agent '{}' is not known to the pattern system", agent_id),
                });
            }
            drop(agents);
            self.patterns_for(agent_id)
        };

        if patterns.is_empty() {
            return Ok(None);
        }

        let results = self.evaluator.evaluate_all(&patterns, ctx).await;

        // Priority only ranks patterns that apply. A "does not apply" result
        // wins only when nothing applied.
        let (applicable, inapplicable): (Vec<_>, Vec<_>) =
            results.iter().cloned().partition(AccessPatternResult::is_applicable);
        let best = if applicable.is_empty() {
            AccessPatternEvaluator::best_match(&inapplicable).cloned()
        } else {
            AccessPatternEvaluator::best_match(&applicable).cloned()
        };
        debug!(
            agent_id = %agent_id,
            evaluated = results.len(),
            applicable = applicable.len(),
            pattern_id = ?best.as_ref().map(|r| r.pattern_id.as_str()),
            allowed = ?best.as_ref().map(|r| r.allowed),
            "access patterns evaluated"
        );
        Ok(best)
    }
}
