//! Wiring for the demo: directory, engine, router, and auditor.

use std::sync::Arc;

use tracing::info;
use warden_audit::SecurityAuditor;
use warden_contracts::{
    error::WardenResult,
    operation::AgentResponse,
};
use warden_core::{
    directory::AgentDirectory,
    evaluator::AccessPatternEvaluator,
    router::Orchestrator,
};
use warden_policy::{config::WardenConfig, engine::PermissionEngine};

/// Configuration embedded in the binary, used when no `--config` is given.
pub const DEFAULT_CONFIG: &str = include_str!("../config/warden.toml");

/// One fully wired WARDEN stack.
pub struct Runtime {
    pub directory: Arc<AgentDirectory>,
    pub engine: Arc<PermissionEngine>,
    pub router: Orchestrator,
    pub auditor: Arc<SecurityAuditor>,
}

impl Runtime {
    pub fn build(config: &WardenConfig) -> WardenResult<Self> {
        let evaluator = Arc::new(AccessPatternEvaluator::new(config.evaluator.clone()));
        let directory = Arc::new(AgentDirectory::new(evaluator));
        let engine = Arc::new(PermissionEngine::from_config(directory.clone(), config)?);
        let auditor = Arc::new(SecurityAuditor::new());
        let router = Orchestrator::new(directory.clone(), engine.clone())
            .with_config(config.router.clone())
            .with_security_sink(auditor.clone());
        info!(rules = config.rules.len(), "runtime wired");

        Ok(Self {
            directory,
            engine,
            router,
            auditor,
        })
    }

    /// Attach config rules whose agents have registered since the build.
    pub fn attach_config_rules(&self) -> WardenResult<()> {
        let added = self.engine.load_pending_rules()?;
        info!(
            added,
            still_pending = self.engine.pending_rules().len(),
            "config rules attached"
        );
        Ok(())
    }

    /// Print the tail of the audit trail and the chain status.
    pub fn print_audit_summary(&self) {
        let decisions = self.engine.get_audit_log(None, None);
        let stats = self.router.get_stats();
        println!(
            "  Decisions audited:      {} ({} request(s), {} failed)",
            decisions.len(),
            stats.total_requests,
            stats.failed_responses
        );
        println!(
            "  Security chain:         {} ({} event(s))",
            if self.auditor.verify_integrity() { "VERIFIED" } else { "FAILED" },
            self.auditor.len()
        );
    }
}

/// Print one outcome line and return whether it matched `expect_allowed`.
pub fn report_outcome(label: &str, response: &AgentResponse, expect_allowed: bool) -> bool {
    let outcome = if response.success { "ALLOWED" } else { "DENIED" };
    let matched = response.success == expect_allowed;
    println!(
        "  {:<44} {:<8} {}",
        label,
        outcome,
        if matched { "(expected)" } else { "(UNEXPECTED)" }
    );
    if let Some(error) = &response.error {
        println!("      reason: {}", error);
    }
    matched
}
