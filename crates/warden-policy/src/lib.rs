//! # warden-policy
//!
//! The permission decision engine for the WARDEN runtime.
//!
//! ## Overview
//!
//! This crate provides [`PermissionEngine`], which implements the
//! [`PermissionChecker`](warden_core::traits::PermissionChecker) trait. A
//! decision combines, in order: the agent's tool set, its access patterns,
//! operator override rules, and a final tool gate. Every decision is written
//! to a bounded audit log.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use warden_policy::{config::WardenConfig, engine::PermissionEngine};
//!
//! let config = WardenConfig::from_file(Path::new("warden.toml"))?;
//! let engine = PermissionEngine::from_config(directory.clone(), &config)?;
//! // Pass `Arc::new(engine)` to `warden_core::Orchestrator::new(...)`.
//! ```
//!
//! ## Override rules
//!
//! A rule matches on agent (`"*"` for any), operation, optional tool list,
//! and a glob over the path. The highest-priority matching rule wins and
//! replaces the pattern decision when it outranks it.

pub mod config;
pub mod engine;
pub mod rule;

pub use config::{EngineConfig, WardenConfig};
pub use engine::PermissionEngine;
pub use rule::{rule_matches, validate_rule, RuleSet};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use warden_contracts::{
        access::{AccessContext, AccessPatternResult},
        agent::{AgentCapability, AgentId},
        error::{WardenError, WardenResult},
        operation::OperationType,
        permission::PermissionRule,
        tool::Tool,
    };
    use warden_core::{
        directory::AgentDirectory,
        traits::{AgentAccessChecker, PermissionChecker},
    };
    use warden_patterns::{FileSystemAccessPattern, SecurityValidatedAccessPattern};

    use crate::{EngineConfig, PermissionEngine, WardenConfig};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn editor_id() -> AgentId {
        AgentId::from("editor")
    }

    /// Editor with only the `edit` tool and an allow pattern over `src/**`
    /// at priority 60.
    fn editor_setup() -> (Arc<AgentDirectory>, PermissionEngine) {
        let directory = Arc::new(AgentDirectory::default());
        directory
            .register(
                AgentCapability::new("editor", "Editor")
                    .with_directory_patterns(["src/**"])
                    .with_tools([Tool::Edit]),
            )
            .unwrap();
        directory
            .add_pattern(
                &editor_id(),
                Arc::new(FileSystemAccessPattern::new("src-tree", "source tree", ["src/**"], true, 60).unwrap()),
            )
            .unwrap();
        let engine = PermissionEngine::new(directory.clone());
        (directory, engine)
    }

    fn rule(id: &str, pattern: &str, ops: &[OperationType], allow: bool, priority: i32) -> PermissionRule {
        PermissionRule {
            id: id.to_string(),
            agent_id: "*".to_string(),
            file_pattern: pattern.to_string(),
            operations: ops.to_vec(),
            tools: None,
            allow,
            priority,
            description: None,
        }
    }

    /// An access checker whose pattern system is always down.
    struct FailingChecker;

    #[async_trait]
    impl AgentAccessChecker for FailingChecker {
        async fn check_agent_access(
            &self,
            _agent_id: &AgentId,
            _ctx: &AccessContext,
        ) -> WardenResult<Option<AccessPatternResult>> {
            Err(WardenError::PatternSystemFailure {
                reason: "pattern store offline".to_string(),
            })
        }
    }

    // ── 1. Basic pipeline ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_unknown_agent_denied() {
        let (_, engine) = editor_setup();
        let result = engine
            .check_permission_async(&AgentId::from("ghost"), OperationType::ReadFile, Some("a"))
            .await;
        assert!(!result.allowed);
        assert_eq!(result.reason, "Agent not found: ghost");
    }

    #[tokio::test]
    async fn test_pathless_request_is_tool_gated() {
        let (_, engine) = editor_setup();
        let result = engine
            .check_permission_async(&editor_id(), OperationType::Question, None)
            .await;
        assert!(!result.allowed);
        assert_eq!(result.reason, "Agent lacks required tool inter-agent-communication");
        assert_eq!(result.required_tool, Some(Tool::InterAgentCommunication));
    }

    #[test]
    fn test_sync_check_never_consults_patterns() {
        let (_, engine) = editor_setup();
        // The pattern would say "does not apply"; the sync path only sees tools.
        let result = engine.check_permission(&editor_id(), OperationType::EditFile, Some("secrets/x.ts"));
        assert!(result.allowed);
        assert_eq!(result.reason, "Agent has required tool edit");
        assert!(result.pattern_id.is_none());
    }

    // ── 2. Editor scenario ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_editor_scenario() {
        let (_, engine) = editor_setup();

        let inside = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/x.ts"))
            .await;
        assert!(inside.allowed, "expected allow, got: {}", inside.reason);
        assert_eq!(inside.pattern_id.as_deref(), Some("src-tree"));

        let outside = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("secrets/x.ts"))
            .await;
        assert!(!outside.allowed);
        assert_eq!(outside.reason, AccessPatternResult::DOES_NOT_APPLY);

        engine
            .add_rule(rule("protect-secrets", "secrets/**", &[OperationType::EditFile], false, 95))
            .unwrap();
        let with_rule = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("secrets/x.ts"))
            .await;
        assert!(!with_rule.allowed);
        assert!(with_rule.reason.starts_with("Rule protect-secrets"), "{}", with_rule.reason);
        assert_eq!(with_rule.applied_rules, vec!["protect-secrets".to_string()]);
    }

    #[tokio::test]
    async fn test_inapplicable_high_priority_pattern_does_not_win() {
        let (directory, engine) = editor_setup();
        directory
            .add_pattern(
                &editor_id(),
                Arc::new(FileSystemAccessPattern::new("config-guard", "config", ["config/**"], false, 90).unwrap()),
            )
            .unwrap();

        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/x.ts"))
            .await;
        assert!(result.allowed, "expected allow, got: {}", result.reason);
        assert_eq!(result.pattern_id.as_deref(), Some("src-tree"));

        let guarded = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("config/app.toml"))
            .await;
        assert!(!guarded.allowed);
        assert_eq!(guarded.pattern_id.as_deref(), Some("config-guard"));
        assert_ne!(guarded.reason, AccessPatternResult::DOES_NOT_APPLY);
    }

    #[tokio::test]
    async fn test_security_veto_carries_violation_type() {
        let (directory, engine) = editor_setup();
        directory
            .add_pattern(
                &editor_id(),
                Arc::new(SecurityValidatedAccessPattern::new("guard", "sources", ["src/**"], true, 80).unwrap()),
            )
            .unwrap();

        let vetoed = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("../etc/passwd"))
            .await;
        assert!(!vetoed.allowed);
        assert_eq!(vetoed.pattern_id.as_deref(), Some("guard"));
        assert_eq!(vetoed.violation_type.as_deref(), Some("path_traversal"));

        let clean = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/x.ts"))
            .await;
        assert!(clean.allowed);
        assert!(clean.violation_type.is_none());
    }

    // ── 3. Override rules ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_rule_override_symmetry() {
        let (_, engine) = editor_setup();

        // Allow rule grants where the pattern does not apply.
        engine
            .add_rule(rule("open-docs", "docs/**", &[OperationType::EditFile], true, 10))
            .unwrap();
        assert!(engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("docs/a.md"))
            .await
            .allowed);

        // A deny rule below the pattern priority leaves the allow in place.
        engine
            .add_rule(rule("weak-deny", "src/**", &[OperationType::EditFile], false, 50))
            .unwrap();
        assert!(engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/a.ts"))
            .await
            .allowed);

        // Above it, the deny wins.
        engine
            .add_rule(rule("strong-deny", "src/**", &[OperationType::EditFile], false, 70))
            .unwrap();
        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/a.ts"))
            .await;
        assert!(!result.allowed);
        assert_eq!(result.applied_rules, vec!["strong-deny".to_string()]);
        assert_eq!(result.pattern_id.as_deref(), Some("src-tree"));
    }

    #[tokio::test]
    async fn test_equal_priority_rules_keep_first_added() {
        let (_, engine) = editor_setup();
        engine
            .add_rule(rule("first", "docs/**", &[OperationType::EditFile], true, 10))
            .unwrap();
        engine
            .add_rule(rule("second", "docs/**", &[OperationType::EditFile], false, 10))
            .unwrap();
        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("docs/a.md"))
            .await;
        assert!(result.allowed);
        assert_eq!(result.applied_rules, vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_rule_tool_filter_and_agent_scope() {
        let (directory, engine) = editor_setup();
        directory
            .register(AgentCapability::new("reviewer", "Reviewer").with_tools([Tool::Edit]))
            .unwrap();
        let mut read_only = rule("reads", "docs/**", &[OperationType::EditFile], true, 10);
        read_only.tools = Some(vec![Tool::ReadLocal]);
        engine.add_rule(read_only).unwrap();

        let mut other_agent = rule("other", "docs/**", &[OperationType::EditFile], true, 10);
        other_agent.agent_id = "reviewer".to_string();
        engine.add_rule(other_agent).unwrap();

        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("docs/a.md"))
            .await;
        assert!(!result.allowed, "neither rule should apply: {}", result.reason);
        assert!(result.applied_rules.is_empty());

        assert_eq!(engine.get_rules(Some(&editor_id())).len(), 1);
        assert_eq!(engine.get_rules(None).len(), 2);
    }

    // ── 4. Tool gate ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_tool_gate_dominates_allow_rule() {
        let (_, engine) = editor_setup();
        engine
            .add_rule(rule("let-delete", "src/**", &[OperationType::DeleteFile], true, 100))
            .unwrap();

        let result = engine
            .check_permission_async(&editor_id(), OperationType::DeleteFile, Some("src/a.ts"))
            .await;
        assert!(!result.allowed);
        assert_eq!(result.required_tool, Some(Tool::Delete));
        assert_eq!(result.reason, "Agent lacks required tool delete");
    }

    // ── 5. Fail-soft fallback ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pattern_failure_falls_back_to_tool_check() {
        let (directory, _) = editor_setup();
        let engine = PermissionEngine::new(directory).with_access_checker(Arc::new(FailingChecker));
        engine
            .add_rule(rule("deny-src", "src/**", &[OperationType::EditFile], false, 100))
            .unwrap();

        // Rules are skipped along with patterns.
        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/a.ts"))
            .await;
        assert!(result.allowed);
        assert_eq!(result.reason, "Agent has required tool edit");
    }

    #[tokio::test]
    async fn test_agent_without_patterns_uses_tool_result_and_rules() {
        let directory = Arc::new(AgentDirectory::default());
        directory
            .register(AgentCapability::new("plain", "Plain").with_tools([Tool::Edit]))
            .unwrap();
        let engine = PermissionEngine::new(directory);
        let id = AgentId::from("plain");

        assert!(engine
            .check_permission_async(&id, OperationType::EditFile, Some("lib/a.rs"))
            .await
            .allowed);

        engine
            .add_rule(rule("no-lib", "lib/**", &[OperationType::EditFile], false, 1))
            .unwrap();
        assert!(!engine
            .check_permission_async(&id, OperationType::EditFile, Some("lib/a.rs"))
            .await
            .allowed);
    }

    #[tokio::test]
    async fn test_patterns_disabled_is_tool_only() {
        let (directory, _) = editor_setup();
        let engine = PermissionEngine::with_config(
            directory,
            EngineConfig {
                patterns_enabled: false,
                ..EngineConfig::default()
            },
        );
        let result = engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("secrets/x.ts"))
            .await;
        assert!(result.allowed);
    }

    // ── 6. Audit log ──────────────────────────────────────────────────────────

    #[test]
    fn test_audit_log_is_bounded_and_newest_first() {
        let (_, engine) = editor_setup();
        for i in 0..1001 {
            let path = format!("src/f{}.ts", i);
            engine.check_permission(&editor_id(), OperationType::EditFile, Some(path.as_str()));
        }

        let log = engine.get_audit_log(None, None);
        assert_eq!(log.len(), 1000);
        assert_eq!(log[0].file_path.as_deref(), Some("src/f1000.ts"));
        assert_eq!(log[999].file_path.as_deref(), Some("src/f1.ts"));

        assert_eq!(engine.get_audit_log(Some(&editor_id()), Some(5)).len(), 5);
        assert!(engine.get_audit_log(Some(&AgentId::from("ghost")), None).is_empty());

        engine.clear_audit_log();
        assert!(engine.get_audit_log(None, None).is_empty());
    }

    #[tokio::test]
    async fn test_audit_records_rules_and_can_be_disabled() {
        let (directory, engine) = editor_setup();
        engine
            .add_rule(rule("protect-secrets", "secrets/**", &[OperationType::EditFile], false, 95))
            .unwrap();
        engine
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("secrets/x.ts"))
            .await;
        let log = engine.get_audit_log(None, Some(1));
        assert_eq!(log[0].applied_rules, vec!["protect-secrets".to_string()]);
        assert!(!log[0].result.allowed);

        let quiet = PermissionEngine::with_config(
            directory,
            EngineConfig {
                audit_enabled: false,
                ..EngineConfig::default()
            },
        );
        quiet
            .check_permission_async(&editor_id(), OperationType::EditFile, Some("src/x.ts"))
            .await;
        assert!(quiet.get_audit_log(None, None).is_empty());
    }

    // ── 7. Rule validation ────────────────────────────────────────────────────

    #[test]
    fn test_invalid_rules_rejected() {
        let (_, engine) = editor_setup();
        let ops = [OperationType::EditFile];

        let mut cases = vec![
            rule("", "src/**", &ops, true, 1),
            rule("no-ops", "src/**", &[], true, 1),
            rule("no-pattern", "  ", &ops, true, 1),
            rule("bad-glob", "src/[x", &ops, true, 1),
        ];
        let mut no_agent = rule("no-agent", "src/**", &ops, true, 1);
        no_agent.agent_id = String::new();
        cases.push(no_agent);
        let mut empty_tools = rule("empty-tools", "src/**", &ops, true, 1);
        empty_tools.tools = Some(vec![]);
        cases.push(empty_tools);

        for bad in cases {
            let id = bad.id.clone();
            match engine.add_rule(bad) {
                Err(WardenError::RuleValidation { .. }) => {}
                other => panic!("rule '{}': expected RuleValidation, got {:?}", id, other),
            }
        }
        assert!(engine.get_rules(None).is_empty());
    }

    #[test]
    fn test_rule_for_unknown_agent_rejected() {
        let (_, engine) = editor_setup();
        let mut ghost = rule("ghost-rule", "src/**", &[OperationType::EditFile], true, 1);
        ghost.agent_id = "ghost".to_string();
        match engine.add_rule(ghost) {
            Err(WardenError::RuleValidation { reason }) => {
                assert!(reason.contains("unknown agent 'ghost'"), "{reason}");
            }
            other => panic!("expected RuleValidation, got {:?}", other),
        }

        let mut named = rule("editor-rule", "src/**", &[OperationType::EditFile], true, 1);
        named.agent_id = "editor".to_string();
        engine.add_rule(named).unwrap();
        assert_eq!(engine.get_rules(None).len(), 1);
    }

    #[test]
    fn test_duplicate_rule_id_rejected_and_remove() {
        let (_, engine) = editor_setup();
        engine
            .add_rule(rule("r1", "src/**", &[OperationType::EditFile], true, 1))
            .unwrap();
        assert!(engine
            .add_rule(rule("r1", "lib/**", &[OperationType::EditFile], true, 1))
            .is_err());

        assert!(engine.remove_rule("r1"));
        assert!(!engine.remove_rule("r1"));
        assert!(engine.get_rules(None).is_empty());
    }

    // ── 8. Configuration ──────────────────────────────────────────────────────

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [engine]
            max_audit_entries = 10

            [evaluator]
            cache_ttl_ms = 1000

            [[rules]]
            id = "protect-secrets"
            agent_id = "*"
            file_pattern = "secrets/**"
            operations = ["EDIT_FILE", "DELETE_FILE"]
            tools = ["edit", "delete"]
            allow = false
            priority = 95
            description = "secrets are read-only"
        "#;

        let config = WardenConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.engine.max_audit_entries, 10);
        assert!(config.engine.audit_enabled);
        assert_eq!(config.evaluator.cache_ttl_ms, 1000);
        assert_eq!(config.router.max_history, 1000);
        assert_eq!(config.rules[0].tools, Some(vec![Tool::Edit, Tool::Delete]));

        let (directory, _) = editor_setup();
        let engine = PermissionEngine::from_config(directory, &config).unwrap();
        assert_eq!(engine.get_rules(None).len(), 1);
        assert_eq!(engine.config().max_audit_entries, 10);
    }

    #[test]
    fn test_config_invalid_rule_fails_engine_build() {
        let toml = r#"
            [[rules]]
            id = "broken"
            agent_id = "*"
            file_pattern = "secrets/**"
            operations = []
            allow = false
            priority = 1
        "#;
        let config = WardenConfig::from_toml_str(toml).unwrap();
        let (directory, _) = editor_setup();
        assert!(PermissionEngine::from_config(directory, &config).is_err());
    }

    #[test]
    fn test_config_rules_for_unregistered_agents_are_deferred() {
        let toml = r#"
            [[rules]]
            id = "everyone"
            agent_id = "*"
            file_pattern = "secrets/**"
            operations = ["EDIT_FILE"]
            allow = false
            priority = 95

            [[rules]]
            id = "reviewer-docs"
            agent_id = "reviewer"
            file_pattern = "docs/**"
            operations = ["EDIT_FILE"]
            allow = true
            priority = 40
        "#;
        let config = WardenConfig::from_toml_str(toml).unwrap();
        let (directory, _) = editor_setup();
        let engine = PermissionEngine::from_config(directory.clone(), &config).unwrap();

        assert_eq!(engine.get_rules(None).len(), 1);
        assert_eq!(engine.pending_rules().len(), 1);
        assert_eq!(engine.load_pending_rules().unwrap(), 0);

        directory
            .register(AgentCapability::new("reviewer", "Reviewer").with_tools([Tool::Edit]))
            .unwrap();
        assert_eq!(engine.load_pending_rules().unwrap(), 1);
        assert!(engine.pending_rules().is_empty());
        assert_eq!(engine.get_rules(Some(&AgentId::from("reviewer"))).len(), 2);
    }

    #[test]
    fn test_config_malformed_deferred_rule_fails_engine_build() {
        let toml = r#"
            [[rules]]
            id = "broken"
            agent_id = "reviewer"
            file_pattern = "docs/[x"
            operations = ["EDIT_FILE"]
            allow = true
            priority = 1
        "#;
        let config = WardenConfig::from_toml_str(toml).unwrap();
        let (directory, _) = editor_setup();
        match PermissionEngine::from_config(directory, &config) {
            Err(WardenError::RuleValidation { .. }) => {}
            Err(other) => panic!("expected RuleValidation, got {:?}", other),
            Ok(_) => panic!("expected RuleValidation, got an engine"),
        }
    }

    #[test]
    fn test_toml_parse_error() {
        match WardenConfig::from_toml_str("this is not valid toml ][[[") {
            Err(WardenError::Config { reason }) => {
                assert!(
                    reason.contains("failed to parse WARDEN TOML"),
                    "expected parse error message, got: {reason}"
                );
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
