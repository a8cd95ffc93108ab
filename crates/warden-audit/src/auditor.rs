//! The security auditor.
//!
//! `SecurityAuditor` keeps the most recent security events in a bounded,
//! hash-chained buffer and answers queries and summary reports over them.
//! It implements `SecurityEventSink`, so it can be attached to the router
//! directly.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use warden_contracts::{
    access::SecurityLevel,
    agent::AgentId,
    security::SecurityEventRecord,
};
use warden_core::{
    clock::{Clock, SystemClock},
    traits::SecurityEventSink,
};

use crate::{
    chain::{hash_event, verify_chain},
    event::{CountEntry, DailyTrend, SecurityEvent, SecurityReport},
};

/// Events kept before the oldest are dropped.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

const TOP_N: usize = 10;
const TREND_DAYS: i64 = 7;

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct AuditorState {
    pub(crate) events: VecDeque<SecurityEvent>,
    /// The next sequence number to assign.
    sequence: u64,
    /// The `this_hash` of the last event, or `GENESIS_HASH`.
    last_hash: String,
}

// ── Public auditor ────────────────────────────────────────────────────────────

/// Bounded, hash-chained store of security events.
pub struct SecurityAuditor {
    pub(crate) state: Mutex<AuditorState>,
    max_events: usize,
    clock: Arc<dyn Clock>,
}

impl SecurityAuditor {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// An auditor that keeps at most `max_events` events (minimum 1).
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            state: Mutex::new(AuditorState {
                events: VecDeque::new(),
                sequence: 0,
                last_hash: SecurityEvent::GENESIS_HASH.to_string(),
            }),
            max_events: max_events.max(1),
            clock: Arc::new(SystemClock),
        }
    }

    /// Timestamp events and compute report windows with `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append `record` to the chain and return the stored event.
    pub fn log_security_event(&self, record: SecurityEventRecord) -> SecurityEvent {
        let timestamp = self.clock.now();
        let mut state = self.lock();

        let sequence = state.sequence;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_event(sequence, &timestamp, &record, &prev_hash);

        match (record.allowed, record.severity) {
            (_, SecurityLevel::Critical) | (false, SecurityLevel::High) => warn!(
                agent_id = %record.agent_id,
                kind = ?record.kind,
                severity = ?record.severity,
                resource = ?record.resource,
                reason = %record.reason,
                "security event"
            ),
            _ => debug!(
                agent_id = %record.agent_id,
                kind = ?record.kind,
                allowed = record.allowed,
                "security event"
            ),
        }

        let event = SecurityEvent {
            sequence,
            timestamp,
            record,
            prev_hash,
            this_hash: this_hash.clone(),
        };

        state.events.push_back(event.clone());
        while state.events.len() > self.max_events {
            state.events.pop_front();
        }
        state.sequence += 1;
        state.last_hash = this_hash;

        event
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Queries (all newest first) ────────────────────────────────────────────

    pub fn get_recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.query(|_| true, Some(limit))
    }

    pub fn get_events_by_agent(&self, agent_id: &AgentId, limit: Option<usize>) -> Vec<SecurityEvent> {
        self.query(|e| &e.record.agent_id == agent_id, limit)
    }

    pub fn get_denied_events(&self, limit: Option<usize>) -> Vec<SecurityEvent> {
        self.query(|e| !e.record.allowed, limit)
    }

    pub fn get_critical_events(&self, limit: Option<usize>) -> Vec<SecurityEvent> {
        self.query(|e| e.record.severity == SecurityLevel::Critical, limit)
    }

    // ── Reporting ─────────────────────────────────────────────────────────────

    /// Summarize retained events.
    ///
    /// Totals and top lists cover `range` (inclusive) when given, otherwise
    /// every retained event. Trends always cover the seven days ending
    /// today.
    pub fn generate_security_report(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> SecurityReport {
        let now = self.clock.now();
        let state = self.lock();

        let in_range: Vec<&SecurityEvent> = state
            .events
            .iter()
            .filter(|e| match range {
                Some((from, to)) => e.timestamp >= from && e.timestamp <= to,
                None => true,
            })
            .collect();

        let mut agents: HashMap<&str, usize> = HashMap::new();
        let mut resources: HashMap<&str, usize> = HashMap::new();
        for event in &in_range {
            *agents.entry(event.record.agent_id.as_str()).or_default() += 1;
            if let Some(resource) = &event.record.resource {
                *resources.entry(resource.as_str()).or_default() += 1;
            }
        }

        let today = now.date_naive();
        let security_trends = (0..TREND_DAYS)
            .rev()
            .map(|days_ago| {
                let date = today - Duration::days(days_ago);
                daily_trend(date, state.events.iter())
            })
            .collect();

        let report = SecurityReport {
            generated_at: now,
            range,
            total_events: in_range.len(),
            denied_events: in_range.iter().filter(|e| !e.record.allowed).count(),
            critical_events: in_range
                .iter()
                .filter(|e| e.record.severity == SecurityLevel::Critical)
                .count(),
            top_agents: top_n(agents),
            top_resources: top_n(resources),
            security_trends,
        };

        info!(
            total = report.total_events,
            denied = report.denied_events,
            critical = report.critical_events,
            "security report generated"
        );
        report
    }

    /// Verify that the retained events form an intact chain.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(self.lock().events.iter())
    }

    /// Drop every retained event. The chain continues from the last hash.
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, AuditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query<F>(&self, filter: F, limit: Option<usize>) -> Vec<SecurityEvent>
    where
        F: Fn(&SecurityEvent) -> bool,
    {
        let state = self.lock();
        state
            .events
            .iter()
            .rev()
            .filter(|e| filter(*e))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

impl Default for SecurityAuditor {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityEventSink for SecurityAuditor {
    fn record(&self, event: SecurityEventRecord) {
        self.log_security_event(event);
    }
}

fn top_n(counts: HashMap<&str, usize>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(key, count)| CountEntry {
            key: key.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(TOP_N);
    entries
}

fn daily_trend<'a>(date: NaiveDate, events: impl Iterator<Item = &'a SecurityEvent>) -> DailyTrend {
    let mut trend = DailyTrend {
        date,
        total: 0,
        denied: 0,
        critical: 0,
    };
    for event in events.filter(|e| e.timestamp.date_naive() == date) {
        trend.total += 1;
        if !event.record.allowed {
            trend.denied += 1;
        }
        if event.record.severity == SecurityLevel::Critical {
            trend.critical += 1;
        }
    }
    trend
}
