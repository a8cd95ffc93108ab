//! Core trait definitions for the WARDEN permission pipeline.
//!
//! These traits mark the seams between the pieces of the core:
//!
//! - `AccessPattern`      — a declarative or programmatic allow/deny rule
//! - `AgentAccessChecker` — runs an agent's access patterns for a context
//! - `PermissionChecker`  — the full decision pipeline the router consults
//! - `AgentHandler`       — per-agent work, only reached after authorization
//! - `SecurityEventSink`  — receives allow/deny events for security auditing
//!
//! The router wires them together. Handlers are never called unless the
//! permission checker first allows the operation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    agent::AgentId,
    error::WardenResult,
    operation::{AgentRequest, AgentResponse, OperationType},
    permission::PermissionResult,
    security::SecurityEventRecord,
};

/// A single access policy primitive.
///
/// `applies_to` is the cheap applicability test; `validate` is the full
/// decision and is only called when `applies_to` returned true. An `Err`
/// from either is converted by the evaluator into an uncached deny.
#[async_trait]
pub trait AccessPattern: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Tie-break rank among applicable patterns. Higher wins.
    fn priority(&self) -> i32;

    fn applies_to(&self, ctx: &AccessContext) -> WardenResult<bool>;

    async fn validate(&self, ctx: &AccessContext) -> WardenResult<AccessPatternResult>;
}

/// Pattern-based access evaluation for one agent.
#[async_trait]
pub trait AgentAccessChecker: Send + Sync {
    /// Evaluate every pattern registered for `agent_id` against `ctx` and
    /// return the best match.
    ///
    /// `Ok(None)` means no pattern is registered for the agent. `Err` means
    /// the pattern system itself could not run.
    async fn check_agent_access(
        &self,
        agent_id: &AgentId,
        ctx: &AccessContext,
    ) -> WardenResult<Option<AccessPatternResult>>;
}

/// The permission decision pipeline as seen by the router.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Tool-gated check only. Never consults access patterns.
    fn check_permission(
        &self,
        agent_id: &AgentId,
        operation: OperationType,
        path: Option<&str>,
    ) -> PermissionResult;

    /// The full pipeline: tool gate, access patterns, override rules, audit.
    async fn check_permission_async(
        &self,
        agent_id: &AgentId,
        operation: OperationType,
        path: Option<&str>,
    ) -> PermissionResult;
}

/// The work an agent performs for an authorized request.
///
/// The router stamps `handled_by` and `request_id` on the returned response,
/// so handlers may leave them empty.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    async fn handle(&self, request: &AgentRequest) -> WardenResult<AgentResponse>;
}

/// Adapter that lets an async closure act as an `AgentHandler`.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> AgentHandler for FnHandler<F>
where
    F: Fn(AgentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = WardenResult<AgentResponse>> + Send,
{
    async fn handle(&self, request: &AgentRequest) -> WardenResult<AgentResponse> {
        (self.0)(request.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn AgentHandler>
where
    F: Fn(AgentRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WardenResult<AgentResponse>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Receives security events. Implementations must not block for long; the
/// router calls this inline on every decision.
pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: SecurityEventRecord);
}
