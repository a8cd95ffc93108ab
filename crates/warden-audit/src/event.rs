//! Security event and report types.
//!
//! `SecurityEvent` wraps a `SecurityEventRecord` with its position in the
//! auditor's SHA-256 hash chain. `SecurityReport` is the summary produced by
//! `SecurityAuditor::generate_security_report`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use warden_contracts::security::SecurityEventRecord;

/// A single entry in the security hash chain.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Position in the chain, starting at 0. Never reused, even after the
    /// oldest events are dropped.
    pub sequence: u64,

    /// When the auditor accepted the event.
    pub timestamp: DateTime<Utc>,

    pub record: SecurityEventRecord,

    /// SHA-256 hash (hex) of the previous event, or `GENESIS_HASH` for the
    /// first event ever logged.
    pub prev_hash: String,

    /// SHA-256 hash (hex) over (sequence, timestamp, prev_hash, record).
    pub this_hash: String,
}

impl SecurityEvent {
    /// The `prev_hash` of the first event in a fresh auditor.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A key and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

/// Event counts for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub total: usize,
    pub denied: usize,
    pub critical: usize,
}

/// Summary over the retained events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub generated_at: DateTime<Utc>,
    /// The requested range, if any. Totals and top lists honour it.
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub total_events: usize,
    pub denied_events: usize,
    pub critical_events: usize,
    /// Agents with the most events, at most ten, most frequent first.
    pub top_agents: Vec<CountEntry>,
    /// Resources with the most events, at most ten, most frequent first.
    pub top_resources: Vec<CountEntry>,
    /// The seven days ending today, oldest first.
    pub security_trends: Vec<DailyTrend>,
}
