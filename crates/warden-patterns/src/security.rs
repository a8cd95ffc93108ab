//! Access pattern that runs file security checks before its own verdict.

use async_trait::async_trait;
use glob::Pattern;
use tracing::warn;

use warden_contracts::{
    access::{AccessContext, AccessPatternResult, SecurityLevel},
    error::WardenResult,
};
use warden_core::{glob as paths, traits::AccessPattern};

use crate::checks::{self, check_path_traversal, SecurityCheck, SecurityCheckFn, DEFAULT_CHECKS};

/// Applies to paths on its allow-list, and to any path that attempts
/// directory traversal. Validation runs every security check in order; the
/// first failure denies with a HIGH security level. When all checks pass the
/// configured allow/deny is returned.
///
/// The traversal check always runs first, even when `with_checks` replaced
/// the default list.
pub struct SecurityValidatedAccessPattern {
    id: String,
    description: String,
    priority: i32,
    compiled: Vec<Pattern>,
    allow: bool,
    checks: Vec<SecurityCheckFn>,
}

impl SecurityValidatedAccessPattern {
    pub fn new<I, S>(
        id: impl Into<String>,
        description: impl Into<String>,
        allowed_paths: I,
        allow: bool,
        priority: i32,
    ) -> WardenResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = allowed_paths
            .into_iter()
            .map(|p| paths::compile(p.as_ref()))
            .collect::<WardenResult<Vec<_>>>()?;
        Ok(Self {
            id: id.into(),
            description: description.into(),
            priority,
            compiled,
            allow,
            checks: DEFAULT_CHECKS.to_vec(),
        })
    }

    /// Replace the check list. Checks run in the given order.
    pub fn with_checks(mut self, checks: Vec<SecurityCheckFn>) -> Self {
        self.checks = checks;
        self
    }

    /// Append a check after the configured ones.
    pub fn add_check(&mut self, check: SecurityCheckFn) {
        self.checks.push(check);
    }

    fn violation(&self, ctx: &AccessContext, failed: SecurityCheck) -> AccessPatternResult {
        let reason = failed
            .reason
            .unwrap_or_else(|| "Security check failed".to_string());
        warn!(
            pattern_id = %self.id,
            agent_id = %ctx.requester_id,
            operation = %ctx.operation,
            path = %ctx.path(),
            violation = ?failed.violation_type,
            "security check failed"
        );
        let mut result = AccessPatternResult::deny(&self.id, reason);
        result.metadata.security_level = Some(SecurityLevel::High);
        result.metadata.violation_type = failed.violation_type;
        result
    }
}

#[async_trait]
impl AccessPattern for SecurityValidatedAccessPattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, ctx: &AccessContext) -> WardenResult<bool> {
        let path = ctx.path();
        Ok(paths::matches_any(&self.compiled, path) || !check_path_traversal(path, ctx.operation).passed)
    }

    async fn validate(&self, ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
        let path = ctx.path();

        let traversal = check_path_traversal(path, ctx.operation);
        if !traversal.passed {
            return Ok(self.violation(ctx, traversal));
        }
        if let Some(failed) = checks::run_checks(&self.checks, path, ctx.operation) {
            return Ok(self.violation(ctx, failed));
        }

        Ok(if self.allow {
            AccessPatternResult::allow(
                &self.id,
                format!("Access allowed by pattern: {} (security checks passed)", self.description),
            )
        } else {
            AccessPatternResult::deny(
                &self.id,
                format!("Access denied by pattern: {}", self.description),
            )
        })
    }
}
