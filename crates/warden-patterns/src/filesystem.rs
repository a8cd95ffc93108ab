//! Glob-scoped allow/deny access pattern.

use std::collections::HashSet;

use async_trait::async_trait;
use glob::Pattern;

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    error::WardenResult,
    operation::OperationType,
};
use warden_core::{glob as paths, traits::AccessPattern};

/// Allows or denies every operation on paths matching any of its globs.
///
/// When an operation set is configured the pattern only applies to those
/// operations; otherwise it applies to every operation on a matching path.
pub struct FileSystemAccessPattern {
    id: String,
    description: String,
    priority: i32,
    globs: Vec<String>,
    compiled: Vec<Pattern>,
    allow: bool,
    operations: Option<HashSet<OperationType>>,
}

impl FileSystemAccessPattern {
    /// Build a pattern over `globs`. Fails if any glob does not compile.
    pub fn new<I, S>(
        id: impl Into<String>,
        description: impl Into<String>,
        globs: I,
        allow: bool,
        priority: i32,
    ) -> WardenResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let globs: Vec<String> = globs.into_iter().map(Into::into).collect();
        let compiled = globs
            .iter()
            .map(|g| paths::compile(g))
            .collect::<WardenResult<Vec<_>>>()?;
        Ok(Self {
            id: id.into(),
            description: description.into(),
            priority,
            globs,
            compiled,
            allow,
            operations: None,
        })
    }

    /// Restrict the pattern to `operations`.
    pub fn with_operations(mut self, operations: impl IntoIterator<Item = OperationType>) -> Self {
        self.operations = Some(operations.into_iter().collect());
        self
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }

    pub fn allows(&self) -> bool {
        self.allow
    }
}

#[async_trait]
impl AccessPattern for FileSystemAccessPattern {
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
        if let Some(ops) = &self.operations {
            if !ops.contains(&ctx.operation) {
                return Ok(false);
            }
        }
        Ok(paths::matches_any(&self.compiled, ctx.path()))
    }

    async fn validate(&self, _ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
        Ok(if self.allow {
            AccessPatternResult::allow(
                &self.id,
                format!("Access allowed by pattern: {}", self.description),
            )
        } else {
            AccessPatternResult::deny(
                &self.id,
                format!("Access denied by pattern: {}", self.description),
            )
        })
    }
}
