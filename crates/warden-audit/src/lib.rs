//! # warden-audit
//!
//! Security event auditing for the WARDEN runtime.
//!
//! ## Overview
//!
//! Every allow/deny decision the router makes can be forwarded to a
//! [`SecurityAuditor`], which stores it in a bounded buffer of
//! SHA-256 hash-chained [`SecurityEvent`]s. Tampering with a retained event
//! breaks the chain and is detected by `verify_integrity`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_audit::SecurityAuditor;
//!
//! let auditor = Arc::new(SecurityAuditor::new());
//! let router = Orchestrator::new(directory, engine).with_security_sink(auditor.clone());
//! // ... run requests ...
//! assert!(auditor.verify_integrity());
//! let report = auditor.generate_security_report(None);
//! ```

pub mod auditor;
pub mod chain;
pub mod event;

pub use auditor::{SecurityAuditor, DEFAULT_MAX_EVENTS};
pub use chain::{hash_event, verify_chain};
pub use event::{CountEntry, DailyTrend, SecurityEvent, SecurityReport};

// ── Tests ─────────────────────────────────────────────────────────────────────
