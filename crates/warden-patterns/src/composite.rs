//! AND / OR combination of access patterns.

use std::fmt;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    error::{WardenError, WardenResult},
};
use warden_core::traits::AccessPattern;

/// How sub-pattern results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeMode {
    And,
    Or,
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeMode::And => f.write_str("AND"),
            CompositeMode::Or => f.write_str("OR"),
        }
    }
}

/// A pattern built from other patterns.
///
/// Applies when all (AND) or any (OR) children apply. Validation runs every
/// child and combines the verdicts the same way; the child results are kept
/// in `metadata.sub_results`.
pub struct CompositeAccessPattern {
    id: String,
    description: String,
    priority: i32,
    mode: CompositeMode,
    children: Vec<Box<dyn AccessPattern>>,
}

impl CompositeAccessPattern {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        mode: CompositeMode,
        children: Vec<Box<dyn AccessPattern>>,
        priority: i32,
    ) -> WardenResult<Self> {
        let id = id.into();
        if children.is_empty() {
            return Err(WardenError::InvalidPattern {
                pattern: id,
                reason: "composite pattern needs at least one child".to_string(),
            });
        }
        Ok(Self {
            id,
            description: description.into(),
            priority,
            mode,
            children,
        })
    }

    pub fn and(
        id: impl Into<String>,
        description: impl Into<String>,
        children: Vec<Box<dyn AccessPattern>>,
        priority: i32,
    ) -> WardenResult<Self> {
        Self::new(id, description, CompositeMode::And, children, priority)
    }

    pub fn or(
        id: impl Into<String>,
        description: impl Into<String>,
        children: Vec<Box<dyn AccessPattern>>,
        priority: i32,
    ) -> WardenResult<Self> {
        Self::new(id, description, CompositeMode::Or, children, priority)
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }
}

#[async_trait]
impl AccessPattern for CompositeAccessPattern {
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
        let applies = self.children.iter().map(|child| child.applies_to(ctx));
        match self.mode {
            CompositeMode::And => {
                for result in applies {
                    if !result? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CompositeMode::Or => {
                for result in applies {
                    if result? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    async fn validate(&self, ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
        let outcomes = join_all(self.children.iter().map(|child| child.validate(ctx))).await;

        let mut sub_results = Vec::with_capacity(outcomes.len());
        for (child, outcome) in self.children.iter().zip(outcomes) {
            let mut result = outcome?;
            result.pattern_id = child.id().to_string();
            result.metadata.priority = Some(child.priority());
            sub_results.push(result);
        }

        let allowed = match self.mode {
            CompositeMode::And => sub_results.iter().all(|r| r.allowed),
            CompositeMode::Or => sub_results.iter().any(|r| r.allowed),
        };
        let separator = format!(" {} ", self.mode);
        let reason = sub_results
            .iter()
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join(&separator);

        let mut result = if allowed {
            AccessPatternResult::allow(&self.id, reason)
        } else {
            AccessPatternResult::deny(&self.id, reason)
        };
        result.metadata.sub_results = sub_results;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use warden_contracts::{access::AccessContext, agent::AgentId, operation::OperationType};
    use warden_core::traits::AccessPattern;

    use super::{CompositeAccessPattern, CompositeMode};
    use crate::filesystem::FileSystemAccessPattern;

    fn fs(id: &str, glob: &str, allow: bool) -> Box<dyn AccessPattern> {
        Box::new(FileSystemAccessPattern::new(id, id, [glob], allow, 0).unwrap())
    }

    fn ctx(path: &str) -> AccessContext {
        AccessContext::for_file(AgentId::from("a"), OperationType::EditFile, path)
    }

    #[tokio::test]
    async fn test_and_requires_every_child() {
        let pattern = CompositeAccessPattern::and(
            "both",
            "src and ts",
            vec![fs("src", "src/**", true), fs("ts", "**/*.ts", false)],
            5,
        )
        .unwrap();

        assert!(pattern.applies_to(&ctx("src/a.ts")).unwrap());
        assert!(!pattern.applies_to(&ctx("src/a.rs")).unwrap());

        let result = pattern.validate(&ctx("src/a.ts")).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(
            result.reason,
            "Access allowed by pattern: src AND Access denied by pattern: ts"
        );
        assert_eq!(result.metadata.sub_results.len(), 2);
        assert_eq!(result.metadata.sub_results[1].pattern_id, "ts");
    }

    #[tokio::test]
    async fn test_or_needs_one_child() {
        let pattern = CompositeAccessPattern::or(
            "either",
            "docs or src",
            vec![fs("docs", "docs/**", false), fs("src", "src/**", true)],
            0,
        )
        .unwrap();
        assert_eq!(pattern.mode(), CompositeMode::Or);

        assert!(pattern.applies_to(&ctx("docs/a.md")).unwrap());
        assert!(!pattern.applies_to(&ctx("lib/a.md")).unwrap());

        let result = pattern.validate(&ctx("docs/a.md")).await.unwrap();
        assert!(result.allowed);
        assert!(result.reason.contains(" OR "));
    }

    #[test]
    fn test_empty_composite_rejected() {
        assert!(CompositeAccessPattern::and("none", "none", vec![], 0).is_err());
    }
}
