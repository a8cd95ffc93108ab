//! TOML configuration for the decision engine.
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```toml
//! [engine]
//! audit_enabled = true
//! max_audit_entries = 1000
//! patterns_enabled = true
//!
//! [evaluator]
//! cache_enabled = true
//! cache_ttl_ms = 300000
//! max_cache_size = 1000
//!
//! [router]
//! max_history = 1000
//!
//! [[rules]]
//! id = "protect-secrets"
//! agent_id = "*"
//! file_pattern = "secrets/**"
//! operations = ["EDIT_FILE", "DELETE_FILE"]
//! allow = false
//! priority = 95
//! ```
//!
//! Agents are registered in code, not here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use warden_contracts::{
    error::{WardenError, WardenResult},
    permission::PermissionRule,
};
use warden_core::{evaluator::EvaluatorConfig, router::RouterConfig};

/// Decision engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record every decision in the audit log.
    pub audit_enabled: bool,
    /// Audit entries kept before the oldest are dropped.
    pub max_audit_entries: usize,
    /// Consult access patterns for requests that carry a path. When false
    /// every decision is tool-gated only.
    pub patterns_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            max_audit_entries: 1000,
            patterns_enabled: true,
        }
    }
}

/// The top-level structure deserialized from a WARDEN TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub engine: EngineConfig,
    pub evaluator: EvaluatorConfig,
    pub router: RouterConfig,
    /// Override rules, added in file order.
    pub rules: Vec<PermissionRule>,
}

impl WardenConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `WardenError::Config` if the TOML is malformed or does not
    /// match the expected schema. Rules are validated when handed to the
    /// engine, not here.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse WARDEN TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
