//! The WARDEN orchestrator: routes operations to the agents that own them.
//!
//! Every request runs the same pipeline:
//!
//!   Receive → Resolve agent → Permission check → [AgentHandler::handle] → Record
//!
//! The security invariant is structural: `AgentHandler::handle()` is only
//! reachable after `PermissionChecker::check_permission_async()` allowed the
//! operation for the resolved agent. Every failure along the way becomes a
//! structured `AgentResponse`; nothing escapes `execute_request` as an error.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use warden_contracts::{
    access::SecurityLevel,
    agent::{AgentCapability, AgentId},
    error::{WardenError, WardenResult},
    operation::{AgentRequest, AgentResponse},
    permission::PermissionResult,
    security::{SecurityEventKind, SecurityEventRecord},
    tool::required_tool,
};

use crate::{
    directory::AgentDirectory,
    events::{EventBus, RouterEvent},
    traits::{AgentHandler, PermissionChecker, SecurityEventSink},
};

/// Router settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Requests and responses kept in history (each, oldest dropped first).
    pub max_history: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { max_history: 1000 }
    }
}

/// A request as recorded in history.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request: AgentRequest,
    /// The agent the request was routed to; `None` if routing failed.
    pub routed_to: Option<AgentId>,
    pub received_at: DateTime<Utc>,
}

/// Request and response counts for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub requests: usize,
    pub responses: usize,
    pub failures: usize,
}

/// Aggregates over the current history window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub registered_agents: usize,
    pub total_requests: usize,
    pub total_responses: usize,
    pub successful_responses: usize,
    pub failed_responses: usize,
    /// Keyed by agent id; responses produced by the router itself are
    /// counted under `"orchestrator"`.
    pub per_agent: BTreeMap<String, AgentStats>,
}

#[derive(Default)]
struct History {
    requests: VecDeque<RequestRecord>,
    responses: VecDeque<AgentResponse>,
}

/// Owns agent registration and handlers and dispatches requests.
pub struct Orchestrator {
    directory: Arc<AgentDirectory>,
    checker: Arc<dyn PermissionChecker>,
    handlers: RwLock<HashMap<AgentId, Arc<dyn AgentHandler>>>,
    history: Mutex<History>,
    events: EventBus,
    security: Option<Arc<dyn SecurityEventSink>>,
    config: RouterConfig,
}

impl Orchestrator {
    /// Create a router over `directory` that authorizes through `checker`.
    ///
    /// `checker` should consult the same directory, otherwise agents
    /// registered here are unknown to it.
    pub fn new(directory: Arc<AgentDirectory>, checker: Arc<dyn PermissionChecker>) -> Self {
        Self {
            directory,
            checker,
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(History::default()),
            events: EventBus::new(),
            security: None,
            config: RouterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Forward every allow/deny decision to `sink`.
    pub fn with_security_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.security = Some(sink);
        self
    }

    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Register an agent and optionally bind its handler.
    ///
    /// Legacy boolean permission flags are folded into the tool set when no
    /// tools were declared.
    pub fn register_agent(
        &self,
        mut capability: AgentCapability,
        handler: Option<Arc<dyn AgentHandler>>,
    ) -> WardenResult<()> {
        if capability.normalize_legacy_permissions() {
            debug!(
                agent_id = %capability.id,
                tools = capability.tools.len(),
                "legacy permission flags converted to tools"
            );
        }

        let agent_id = capability.id.clone();
        self.directory.register(capability)?;

        if let Some(handler) = handler {
            self.write_handlers().insert(agent_id.clone(), handler);
        }

        self.report(SecurityEventRecord::new(
            SecurityEventKind::AgentRegistered,
            agent_id.clone(),
            true,
            "agent registered",
        ));
        self.events.emit(&RouterEvent::AgentRegistered { agent_id });
        Ok(())
    }

    /// Bind or replace the handler of an already registered agent.
    pub fn bind_handler(&self, agent_id: &AgentId, handler: Arc<dyn AgentHandler>) -> WardenResult<()> {
        if !self.directory.contains(agent_id) {
            return Err(WardenError::AgentNotFound {
                agent_id: agent_id.0.clone(),
            });
        }
        self.write_handlers().insert(agent_id.clone(), handler);
        Ok(())
    }

    /// Remove an agent's registration and handler.
    pub fn unregister_agent(&self, agent_id: &AgentId) -> bool {
        let removed = self.directory.unregister(agent_id);
        self.write_handlers().remove(agent_id);

        if removed {
            self.report(SecurityEventRecord::new(
                SecurityEventKind::AgentUnregistered,
                agent_id.clone(),
                true,
                "agent unregistered",
            ));
            self.events.emit(&RouterEvent::AgentUnregistered {
                agent_id: agent_id.clone(),
            });
        }
        removed
    }

    // ── Request execution ─────────────────────────────────────────────────────

    /// Execute one request end to end.
    ///
    /// # Pipeline
    ///
    /// 1. Record the request and emit `requestReceived`
    /// 2. Resolve the responsible agent: explicit target, then path owner,
    ///    then an agent exposing the endpoint that matches the operation
    /// 3. Call `checker.check_permission_async()` for that agent:
    ///    - deny → emit `permissionDenied` (and `toolAccessDenied` when the
    ///      agent lacks the required tool), return a failed response
    ///    - allow → emit `toolAccessGranted` and continue
    /// 4. Call the agent's handler; **only reachable after step 3 allows**
    /// 5. Stamp `handled_by` / `request_id`, record, emit `requestCompleted`
    ///
    /// Routing failures and handler errors are converted into a response
    /// with `success = false` and `handled_by = "orchestrator"`.
    pub async fn execute_request(&self, request: AgentRequest) -> AgentResponse {
        debug!(
            request_id = %request.id,
            operation = %request.operation,
            path = ?request.file_path,
            "request received"
        );
        self.events.emit(&RouterEvent::RequestReceived {
            request_id: request.id.clone(),
            operation: request.operation,
        });
        self.record_request(&request);

        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(request_id = %request.id, error = %err, "request failed");
                self.events.emit(&RouterEvent::RequestFailed {
                    request_id: request.id.clone(),
                    error: err.to_string(),
                });
                AgentResponse::orchestrator_failure(&request.id, err.to_string())
            }
        };

        self.record_response(&response);
        response
    }

    async fn dispatch(&self, request: &AgentRequest) -> WardenResult<AgentResponse> {
        // ── Step 2: Resolve the responsible agent ────────────────────────────
        let agent = self.resolve_agent(request)?;
        self.mark_routed(&request.id, &agent.id);
        self.events.emit(&RouterEvent::RequestRouted {
            request_id: request.id.clone(),
            agent_id: agent.id.clone(),
        });

        // ── Step 3: Permission check ─────────────────────────────────────────
        //
        // The only gate in front of the handler.
        let path = request.file_path.as_deref();
        let decision = self
            .checker
            .check_permission_async(&agent.id, request.operation, path)
            .await;
        let tool = decision
            .required_tool
            .unwrap_or_else(|| required_tool(request.operation, path));

        if !decision.allowed {
            warn!(
                request_id = %request.id,
                agent_id = %agent.id,
                operation = %request.operation,
                reason = %decision.reason,
                "permission denied"
            );
            self.events.emit(&RouterEvent::PermissionDenied {
                request_id: request.id.clone(),
                agent_id: agent.id.clone(),
                reason: decision.reason.clone(),
            });
            let tool_missing = !agent.has_tool(tool);
            if tool_missing {
                self.events.emit(&RouterEvent::ToolAccessDenied {
                    request_id: request.id.clone(),
                    agent_id: agent.id.clone(),
                    tool,
                });
            }
            self.report_decision(request, &agent.id, &decision, tool_missing);

            let err = WardenError::PermissionDenied {
                reason: decision.reason.clone(),
                required_tool: decision.required_tool,
            };
            let mut response = AgentResponse::orchestrator_failure(&request.id, err.to_string());
            response.required_tool = Some(tool);
            return Ok(response);
        }

        self.events.emit(&RouterEvent::ToolAccessGranted {
            request_id: request.id.clone(),
            agent_id: agent.id.clone(),
            tool,
        });
        self.report_decision(request, &agent.id, &decision, false);

        // ── Step 4: Handler execution ────────────────────────────────────────
        //
        // Only reachable after the permission check allowed the operation.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&agent.id)
            .cloned()
            .ok_or_else(|| WardenError::HandlerExecution {
                agent_id: agent.id.0.clone(),
                reason: "no handler registered".to_string(),
            })?;

        let mut response = handler
            .handle(request)
            .await
            .map_err(|e| WardenError::HandlerExecution {
                agent_id: agent.id.0.clone(),
                reason: e.to_string(),
            })?;

        // ── Step 5: Stamp and announce ───────────────────────────────────────
        response.handled_by = agent.id.0.clone();
        response.request_id = request.id.clone();

        info!(
            request_id = %request.id,
            agent_id = %agent.id,
            success = response.success,
            "request completed"
        );
        self.events.emit(&RouterEvent::RequestCompleted {
            request_id: request.id.clone(),
            agent_id: agent.id.clone(),
            success: response.success,
        });
        Ok(response)
    }

    fn resolve_agent(&self, request: &AgentRequest) -> WardenResult<AgentCapability> {
        if let Some(target) = &request.target_agent {
            return self
                .directory
                .get(target)
                .ok_or_else(|| WardenError::AgentNotFound {
                    agent_id: target.0.clone(),
                });
        }

        if let Some(path) = &request.file_path {
            if let Some(agent) = self.directory.find_responsible_agent(path) {
                return Ok(agent);
            }
        }

        let agents = self.directory.all();
        for name in request.operation.endpoint_names() {
            if let Some(agent) = agents.iter().find(|a| a.has_endpoint(name)) {
                return Ok(agent.clone());
            }
        }

        Err(WardenError::AgentNotFound {
            agent_id: format!(
                "no agent can handle {} for '{}'",
                request.operation,
                request.file_path.as_deref().unwrap_or("<no path>")
            ),
        })
    }

    // ── History ───────────────────────────────────────────────────────────────

    /// Recorded requests, oldest first.
    pub fn request_history(&self) -> Vec<RequestRecord> {
        self.lock_history().requests.iter().cloned().collect()
    }

    /// Recorded responses, oldest first.
    pub fn response_history(&self) -> Vec<AgentResponse> {
        self.lock_history().responses.iter().cloned().collect()
    }

    /// Drop request/response history. The decision engine's audit log is
    /// not touched.
    pub fn clear_history(&self) {
        let mut history = self.lock_history();
        history.requests.clear();
        history.responses.clear();
    }

    pub fn get_stats(&self) -> RouterStats {
        let history = self.lock_history();
        let mut stats = RouterStats {
            registered_agents: self.directory.len(),
            total_requests: history.requests.len(),
            total_responses: history.responses.len(),
            ..RouterStats::default()
        };

        for record in &history.requests {
            if let Some(agent_id) = &record.routed_to {
                stats.per_agent.entry(agent_id.0.clone()).or_default().requests += 1;
            }
        }
        for response in &history.responses {
            let entry = stats.per_agent.entry(response.handled_by.clone()).or_default();
            entry.responses += 1;
            if response.success {
                stats.successful_responses += 1;
            } else {
                entry.failures += 1;
                stats.failed_responses += 1;
            }
        }
        stats
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn write_handlers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<AgentId, Arc<dyn AgentHandler>>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_request(&self, request: &AgentRequest) {
        let mut history = self.lock_history();
        history.requests.push_back(RequestRecord {
            request: request.clone(),
            routed_to: None,
            received_at: Utc::now(),
        });
        while history.requests.len() > self.config.max_history {
            history.requests.pop_front();
        }
    }

    fn mark_routed(&self, request_id: &str, agent_id: &AgentId) {
        let mut history = self.lock_history();
        if let Some(record) = history
            .requests
            .iter_mut()
            .rev()
            .find(|r| r.request.id == request_id)
        {
            record.routed_to = Some(agent_id.clone());
        }
    }

    fn record_response(&self, response: &AgentResponse) {
        let mut history = self.lock_history();
        history.responses.push_back(response.clone());
        while history.responses.len() > self.config.max_history {
            history.responses.pop_front();
        }
    }

    fn report(&self, event: SecurityEventRecord) {
        if let Some(sink) = &self.security {
            sink.record(event);
        }
    }

    fn report_decision(
        &self,
        request: &AgentRequest,
        agent_id: &AgentId,
        decision: &PermissionResult,
        tool_missing: bool,
    ) {
        if self.security.is_none() {
            return;
        }
        let violation = decision.violation_type.as_deref().filter(|_| !decision.allowed);
        let kind = match (decision.allowed, violation, tool_missing) {
            (true, _, _) => SecurityEventKind::AccessGranted,
            (false, Some(_), _) => SecurityEventKind::SecurityViolation,
            (false, None, true) => SecurityEventKind::ToolAccessDenied,
            (false, None, false) => SecurityEventKind::AccessDenied,
        };
        let mut event = SecurityEventRecord::new(kind, agent_id.clone(), decision.allowed, &decision.reason)
            .with_operation(request.operation)
            .with_metadata(serde_json::json!({
                "request_id": request.id,
                "applied_rules": decision.applied_rules,
                "pattern_id": decision.pattern_id,
                "violation_type": violation,
            }));
        if let Some(path) = &request.file_path {
            event = event.with_resource(path);
        }
        // A vetoed security check is critical; a rule-driven denial is high.
        if violation.is_some() {
            event = event.with_severity(SecurityLevel::Critical);
        } else if !decision.allowed && !decision.applied_rules.is_empty() {
            event = event.with_severity(SecurityLevel::High);
        }
        self.report(event);
    }
}
