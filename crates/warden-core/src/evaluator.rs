//! Access pattern evaluation with an expiring result cache.
//!
//! The evaluator is the only place access patterns are invoked. It owns:
//!
//! - the cache, keyed by a SHA-256 of (pattern id, requester, operation,
//!   resource) and expired by TTL,
//! - fail-closed error handling: a pattern that errors yields an uncached
//!   deny,
//! - best-match selection across several pattern results.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use warden_contracts::{
    access::{AccessContext, AccessPatternResult},
    error::WardenError,
};

use crate::{
    clock::{Clock, SystemClock},
    traits::AccessPattern,
};

/// Evaluator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub cache_enabled: bool,
    /// Entries older than this are treated as absent.
    pub cache_ttl_ms: u64,
    pub max_cache_size: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_ms: 5 * 60 * 1000,
            max_cache_size: 1000,
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CacheEntry {
    result: AccessPatternResult,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Runs access patterns against contexts.
pub struct AccessPatternEvaluator {
    config: EvaluatorConfig,
    clock: Arc<dyn Clock>,
    cache: Mutex<CacheState>,
}

impl AccessPatternEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EvaluatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            cache: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Deterministic cache key for a pattern/context pair.
    pub fn cache_key(pattern_id: &str, ctx: &AccessContext) -> String {
        let mut hasher = Sha256::new();
        for part in [
            pattern_id,
            ctx.requester_id.as_str(),
            ctx.operation.as_str(),
            ctx.resource.as_str(),
        ] {
            hasher.update(part.as_bytes());
            // Unit separator keeps ("ab","c") distinct from ("a","bc").
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }

    /// Evaluate one pattern.
    ///
    /// Cached results are returned while fresh. A pattern that does not
    /// apply yields a "does not apply" deny, which is cached like any other
    /// result. Pattern errors yield a deny that is not cached.
    pub async fn evaluate(&self, pattern: &dyn AccessPattern, ctx: &AccessContext) -> AccessPatternResult {
        let key = self
            .config
            .cache_enabled
            .then(|| Self::cache_key(pattern.id(), ctx));

        if let Some(key) = &key {
            if let Some(hit) = self.lookup(key) {
                debug!(pattern_id = %pattern.id(), resource = %ctx.resource, "access pattern cache hit");
                return hit;
            }
        }

        let applies = match pattern.applies_to(ctx) {
            Ok(applies) => applies,
            Err(err) => return Self::failure(pattern, err),
        };

        let result = if applies {
            match pattern.validate(ctx).await {
                Ok(mut result) => {
                    result.pattern_id = pattern.id().to_string();
                    result.metadata.priority = Some(pattern.priority());
                    result
                }
                Err(err) => return Self::failure(pattern, err),
            }
        } else {
            AccessPatternResult::not_applicable(pattern.id(), pattern.priority())
        };

        if let Some(key) = key {
            self.store(key, result.clone());
        }
        result
    }

    /// Evaluate every pattern concurrently. Output order matches input order.
    pub async fn evaluate_all(
        &self,
        patterns: &[Arc<dyn AccessPattern>],
        ctx: &AccessContext,
    ) -> Vec<AccessPatternResult> {
        join_all(patterns.iter().map(|p| self.evaluate(p.as_ref(), ctx))).await
    }

    /// Pick the winning result: highest priority first, and on equal
    /// priority an allow beats a deny. Earlier results win remaining ties.
    pub fn best_match(results: &[AccessPatternResult]) -> Option<&AccessPatternResult> {
        let mut ranked: Vec<&AccessPatternResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| b.allowed.cmp(&a.allowed))
        });
        ranked.into_iter().next()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.entries.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: cache.entries.len(),
            hits: cache.hits,
            misses: cache.misses,
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn ttl(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.config.cache_ttl_ms).unwrap_or(i64::MAX))
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.timestamp) >= self.ttl()
    }

    fn lookup(&self, key: &str) -> Option<AccessPatternResult> {
        let now = self.clock.now();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        let cached = cache
            .entries
            .get(key)
            .map(|entry| (self.is_expired(entry, now), entry.result.clone()));
        let fresh = match cached {
            Some((false, result)) => Some(result),
            Some((true, _)) => {
                cache.entries.remove(key);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            cache.hits += 1;
        } else {
            cache.misses += 1;
        }
        fresh
    }

    fn store(&self, key: String, result: AccessPatternResult) {
        let now = self.clock.now();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if cache.entries.len() >= self.config.max_cache_size {
            cache.entries.retain(|_, entry| !self.is_expired(entry, now));
        }

        if cache.entries.len() >= self.config.max_cache_size {
            let drop_count = (cache.entries.len() / 5).max(1);
            let mut by_age: Vec<(DateTime<Utc>, String)> = cache
                .entries
                .iter()
                .map(|(k, entry)| (entry.timestamp, k.clone()))
                .collect();
            by_age.sort();
            for (_, stale) in by_age.into_iter().take(drop_count) {
                cache.entries.remove(&stale);
            }
            debug!(evicted = drop_count, "access pattern cache at capacity, evicted oldest entries");
        }

        cache.entries.insert(
            key,
            CacheEntry {
                result,
                timestamp: now,
            },
        );
    }

    fn failure(pattern: &dyn AccessPattern, err: WardenError) -> AccessPatternResult {
        warn!(
            pattern_id = %pattern.id(),
            error = %err,
            "access pattern evaluation failed, denying"
        );
        AccessPatternResult::deny(pattern.id(), format!("Pattern evaluation error: {}", err))
            .with_priority(pattern.priority())
    }
}

impl Default for AccessPatternEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}
