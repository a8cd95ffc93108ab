//! # warden-core
//!
//! The permission and routing runtime for WARDEN agents.
//!
//! This crate provides:
//! - The seam traits (`AccessPattern`, `AgentAccessChecker`,
//!   `PermissionChecker`, `AgentHandler`, `SecurityEventSink`)
//! - The `AgentDirectory` of registered agents and their access patterns
//! - The caching `AccessPatternEvaluator`
//! - The `Orchestrator`, which only calls a handler after the permission
//!   checker allowed the request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{AgentDirectory, Orchestrator, traits::PermissionChecker};
//! ```

pub mod clock;
pub mod directory;
pub mod evaluator;
pub mod events;
pub mod glob;
pub mod router;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::AgentDirectory;
pub use evaluator::{AccessPatternEvaluator, CacheStats, EvaluatorConfig};
pub use events::{EventBus, EventKind, RouterEvent, SubscriptionId};
pub use router::{AgentStats, Orchestrator, RequestRecord, RouterConfig, RouterStats};

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    use warden_contracts::{
        access::{AccessContext, AccessPatternResult},
        agent::{AgentCapability, AgentId},
        error::{WardenError, WardenResult},
        operation::OperationType,
        tool::Tool,
    };

    use crate::{
        clock::ManualClock,
        directory::AgentDirectory,
        evaluator::{AccessPatternEvaluator, EvaluatorConfig},
        traits::{AccessPattern, AgentAccessChecker},
    };

    // ── Mock helpers ─────────────────────────────────────────────────────────

    /// A pattern with a fixed answer that counts validate() calls.
    struct StubPattern {
        id: String,
        priority: i32,
        applies: bool,
        allow: bool,
        fail: bool,
        validations: Arc<Mutex<u32>>,
    }

    impl StubPattern {
        fn new(id: &str, priority: i32, allow: bool) -> Self {
            Self {
                id: id.to_string(),
                priority,
                applies: true,
                allow,
                fail: false,
                validations: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl AccessPattern for StubPattern {
        fn id(&self) -> &str {
            &self.id
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn applies_to(&self, _ctx: &AccessContext) -> WardenResult<bool> {
            Ok(self.applies)
        }

        async fn validate(&self, _ctx: &AccessContext) -> WardenResult<AccessPatternResult> {
            *self.validations.lock().unwrap() += 1;
            if self.fail {
                return Err(WardenError::PatternEvaluation {
                    pattern_id: self.id.clone(),
                    reason: "boom".to_string(),
                });
            }
            Ok(if self.allow {
                AccessPatternResult::allow("ignored", "stub allow")
            } else {
                AccessPatternResult::deny("ignored", "stub deny")
            })
        }
    }

    fn ctx(path: &str) -> AccessContext {
        AccessContext::for_file(AgentId::from("editor"), OperationType::ReadFile, path)
    }

    fn manual_evaluator(ttl_ms: u64) -> (AccessPatternEvaluator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        let config = EvaluatorConfig {
            cache_ttl_ms: ttl_ms,
            ..EvaluatorConfig::default()
        };
        (AccessPatternEvaluator::with_clock(config, clock.clone()), clock)
    }

    // ── Evaluator ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_evaluator_stamps_pattern_id_and_priority() {
        let evaluator = AccessPatternEvaluator::default();
        let pattern = StubPattern::new("p1", 7, true);

        let result = evaluator.evaluate(&pattern, &ctx("src/a.ts")).await;
        assert!(result.allowed);
        assert_eq!(result.pattern_id, "p1");
        assert_eq!(result.metadata.priority, Some(7));
    }

    #[tokio::test]
    async fn test_evaluator_cache_hits_until_ttl_expires() {
        let (evaluator, clock) = manual_evaluator(1_000);
        let pattern = StubPattern::new("p1", 0, true);
        let validations = pattern.validations.clone();

        evaluator.evaluate(&pattern, &ctx("src/a.ts")).await;
        evaluator.evaluate(&pattern, &ctx("src/a.ts")).await;
        assert_eq!(*validations.lock().unwrap(), 1, "second call should hit cache");

        clock.advance(Duration::milliseconds(1_000));
        evaluator.evaluate(&pattern, &ctx("src/a.ts")).await;
        assert_eq!(*validations.lock().unwrap(), 2, "entry at ttl is expired");

        let stats = evaluator.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_evaluator_disabled_cache_always_validates() {
        let evaluator = AccessPatternEvaluator::new(EvaluatorConfig {
            cache_enabled: false,
            ..EvaluatorConfig::default()
        });
        let pattern = StubPattern::new("p1", 0, true);
        let validations = pattern.validations.clone();

        evaluator.evaluate(&pattern, &ctx("a")).await;
        evaluator.evaluate(&pattern, &ctx("a")).await;
        assert_eq!(*validations.lock().unwrap(), 2);
        assert_eq!(evaluator.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_evaluator_not_applicable_result_is_cached() {
        let evaluator = AccessPatternEvaluator::default();
        let mut pattern = StubPattern::new("p1", 3, true);
        pattern.applies = false;

        let result = evaluator.evaluate(&pattern, &ctx("a")).await;
        assert!(!result.allowed);
        assert!(!result.is_applicable());
        assert_eq!(result.reason, AccessPatternResult::DOES_NOT_APPLY);
        assert_eq!(*pattern.validations.lock().unwrap(), 0);
        assert_eq!(evaluator.cache_stats().entries, 1);
    }

    #[tokio::test]
    async fn test_evaluator_error_denies_and_is_not_cached() {
        let evaluator = AccessPatternEvaluator::default();
        let mut pattern = StubPattern::new("p1", 2, true);
        pattern.fail = true;

        let result = evaluator.evaluate(&pattern, &ctx("a")).await;
        assert!(!result.allowed);
        assert!(result.reason.starts_with("Pattern evaluation error:"));
        assert_eq!(result.priority(), 2);
        assert_eq!(evaluator.cache_stats().entries, 0);

        evaluator.evaluate(&pattern, &ctx("a")).await;
        assert_eq!(*pattern.validations.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_evaluator_evicts_oldest_when_full() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let evaluator = AccessPatternEvaluator::with_clock(
            EvaluatorConfig {
                max_cache_size: 5,
                ..EvaluatorConfig::default()
            },
            clock.clone(),
        );
        let pattern = StubPattern::new("p1", 0, true);

        for i in 0..6 {
            evaluator.evaluate(&pattern, &ctx(&format!("f{}", i))).await;
            clock.advance(Duration::seconds(1));
        }
        // Inserting the sixth entry dropped the oldest one.
        assert_eq!(evaluator.cache_stats().entries, 5);

        evaluator.clear_cache();
        assert_eq!(evaluator.cache_stats().entries, 0);
    }

    #[test]
    fn test_cache_key_separates_fields() {
        let a = AccessContext::new(AgentId::from("ab"), OperationType::ReadFile, "c");
        let b = AccessContext::new(AgentId::from("a"), OperationType::ReadFile, "bc");
        assert_ne!(
            AccessPatternEvaluator::cache_key("p", &a),
            AccessPatternEvaluator::cache_key("p", &b)
        );
        assert_eq!(
            AccessPatternEvaluator::cache_key("p", &a),
            AccessPatternEvaluator::cache_key("p", &a.clone())
        );
    }

    #[test]
    fn test_best_match_priority_then_allow_then_order() {
        let results = vec![
            AccessPatternResult::deny("low", "x").with_priority(1),
            AccessPatternResult::deny("high-deny", "x").with_priority(5),
            AccessPatternResult::allow("high-allow", "x").with_priority(5),
            AccessPatternResult::allow("high-allow-2", "x").with_priority(5),
        ];
        let best = AccessPatternEvaluator::best_match(&results).unwrap();
        assert_eq!(best.pattern_id, "high-allow");

        let missing_priority = vec![
            AccessPatternResult::deny("neg", "x").with_priority(-1),
            AccessPatternResult::deny("none", "x"),
        ];
        assert_eq!(
            AccessPatternEvaluator::best_match(&missing_priority).unwrap().pattern_id,
            "none"
        );
        assert!(AccessPatternEvaluator::best_match(&[]).is_none());
    }

    #[tokio::test]
    async fn test_evaluate_all_preserves_order() {
        let evaluator = AccessPatternEvaluator::default();
        let patterns: Vec<Arc<dyn AccessPattern>> = vec![
            Arc::new(StubPattern::new("first", 0, false)),
            Arc::new(StubPattern::new("second", 9, true)),
            Arc::new(StubPattern::new("third", 1, true)),
        ];
        let ids: Vec<String> = evaluator
            .evaluate_all(&patterns, &ctx("a"))
            .await
            .into_iter()
            .map(|r| r.pattern_id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    // ── Directory ────────────────────────────────────────────────────────────

    fn agent(id: &str, patterns: &[&str]) -> AgentCapability {
        AgentCapability::new(id, id)
            .with_directory_patterns(patterns.iter().copied())
            .with_tools([Tool::ReadLocal])
    }

    #[test]
    fn test_directory_rejects_duplicate_and_bad_glob() {
        let directory = AgentDirectory::default();
        directory.register(agent("a", &["src/**"])).unwrap();

        match directory.register(agent("a", &["lib/**"])) {
            Err(WardenError::DuplicateAgent { agent_id }) => assert_eq!(agent_id, "a"),
            other => panic!("expected DuplicateAgent, got {:?}", other),
        }
        match directory.register(agent("b", &["src/[unclosed"])) {
            Err(WardenError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "src/[unclosed"),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_find_responsible_agent_prefers_specific_pattern() {
        let directory = AgentDirectory::default();
        directory.register(agent("broad", &["src/**"])).unwrap();
        directory.register(agent("tests", &["src/tests/*.ts"])).unwrap();
        directory.register(agent("broad-2", &["src/**"])).unwrap();

        let owner = directory.find_responsible_agent("src/tests/a.ts").unwrap();
        assert_eq!(owner.id.as_str(), "tests");

        // Equal specificity: registration order.
        let owner = directory.find_responsible_agent("src/lib/a.ts").unwrap();
        assert_eq!(owner.id.as_str(), "broad");

        assert!(directory.find_responsible_agent("docs/a.md").is_none());
    }

    #[test]
    fn test_unregister_drops_agent_and_patterns() {
        let directory = AgentDirectory::default();
        let id = AgentId::from("a");
        directory.register(agent("a", &["src/**"])).unwrap();
        directory
            .add_pattern(&id, Arc::new(StubPattern::new("p", 0, true)))
            .unwrap();
        assert_eq!(directory.patterns_for(&id).len(), 1);

        assert!(directory.unregister(&id));
        assert!(!directory.unregister(&id));
        assert!(directory.patterns_for(&id).is_empty());
        assert!(!directory.has_tool(&id, Tool::ReadLocal));
    }

    #[test]
    fn test_add_pattern_requires_registered_agent() {
        let directory = AgentDirectory::default();
        let err = directory
            .add_pattern(&AgentId::from("ghost"), Arc::new(StubPattern::new("p", 0, true)))
            .unwrap_err();
        assert!(matches!(err, WardenError::AgentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_check_agent_access_none_without_patterns() {
        let directory = AgentDirectory::default();
        directory.register(agent("editor", &["src/**"])).unwrap();
        let result = directory
            .check_agent_access(&AgentId::from("editor"), &ctx("src/a.ts"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_check_agent_access_unknown_agent_is_system_failure() {
        let directory = AgentDirectory::default();
        match directory
            .check_agent_access(&AgentId::from("ghost"), &ctx("a"))
            .await
        {
            Err(WardenError::PatternSystemFailure { .. }) => {}
            other => panic!("expected PatternSystemFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_agent_access_merges_global_patterns() {
        let directory = AgentDirectory::default();
        let id = AgentId::from("editor");
        directory.register(agent("editor", &["src/**"])).unwrap();
        directory
            .add_pattern(&id, Arc::new(StubPattern::new("own", 1, true)))
            .unwrap();
        directory.add_global_pattern(Arc::new(StubPattern::new("global", 10, false)));

        let best = directory
            .check_agent_access(&id, &ctx("src/a.ts"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.pattern_id, "global");
        assert!(!best.allowed);

        assert!(directory.remove_pattern("global"));
        let best = directory
            .check_agent_access(&id, &ctx("src/b.ts"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.pattern_id, "own");
    }

    #[tokio::test]
    async fn test_check_agent_access_ignores_inapplicable_higher_priority() {
        let directory = AgentDirectory::default();
        let id = AgentId::from("editor");
        directory.register(agent("editor", &["src/**"])).unwrap();
        directory
            .add_pattern(&id, Arc::new(StubPattern::new("src", 60, true)))
            .unwrap();
        let mut config_guard = StubPattern::new("cfg", 90, false);
        config_guard.applies = false;
        directory.add_pattern(&id, Arc::new(config_guard)).unwrap();

        let best = directory
            .check_agent_access(&id, &ctx("src/x.ts"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.pattern_id, "src");
        assert!(best.allowed);
        assert!(best.is_applicable());
    }

    #[tokio::test]
    async fn test_check_agent_access_falls_back_to_not_applicable() {
        let directory = AgentDirectory::default();
        let id = AgentId::from("editor");
        directory.register(agent("editor", &["src/**"])).unwrap();
        for (pattern_id, priority) in [("low", 10), ("high", 50)] {
            let mut pattern = StubPattern::new(pattern_id, priority, true);
            pattern.applies = false;
            directory.add_pattern(&id, Arc::new(pattern)).unwrap();
        }

        let best = directory
            .check_agent_access(&id, &ctx("docs/a.md"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.pattern_id, "high");
        assert!(!best.allowed);
        assert!(!best.is_applicable());
        assert_eq!(best.reason, AccessPatternResult::DOES_NOT_APPLY);
    }
}
