//! Hash-chain primitives for security events.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. timestamp as RFC 3339 (UTF-8)
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the record (serde_json, no pretty-printing)

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use warden_contracts::security::SecurityEventRecord;

use crate::event::SecurityEvent;

/// Compute the SHA-256 hash of one security event as lowercase hex.
///
/// # Panics
///
/// Panics if `record` cannot be serialized to JSON, which cannot happen for
/// `SecurityEventRecord`.
pub fn hash_event(
    sequence: u64,
    timestamp: &DateTime<Utc>,
    record: &SecurityEventRecord,
    prev_hash: &str,
) -> String {
    let record_json =
        serde_json::to_vec(record).expect("SecurityEventRecord must always be serializable to JSON");

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    hex::encode(hasher.finalize())
}

/// Verify a run of consecutive events.
///
/// The run may start anywhere in the chain (older events may have been
/// dropped), so linkage is checked from the first event's own `prev_hash`.
/// Sequence numbers must be consecutive and every `this_hash` must match
/// its recomputed value. An empty run is valid.
pub fn verify_chain<'a>(events: impl IntoIterator<Item = &'a SecurityEvent>) -> bool {
    let mut expected: Option<(u64, String)> = None;

    for event in events {
        if let Some((sequence, prev_hash)) = &expected {
            if event.sequence != sequence + 1 || &event.prev_hash != prev_hash {
                return false;
            }
        }

        let recomputed = hash_event(event.sequence, &event.timestamp, &event.record, &event.prev_hash);
        if event.this_hash != recomputed {
            return false;
        }

        expected = Some((event.sequence, event.this_hash.clone()));
    }

    true
}
