//! Tool grants and required-tool derivation.
//!
//! A tool is a discrete capability an agent either holds or does not. Every
//! operation maps to exactly one required tool, derived from the operation
//! type and whether the target path lies outside the project tree. The
//! decision engine treats a missing tool as a final deny.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operation::OperationType;

/// A capability grant held by an agent.
///
/// Serialized in kebab-case (`"read-local"`, `"inter-agent-communication"`)
/// so TOML rule files read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    ReadLocal,
    ReadGlobal,
    Edit,
    Create,
    Delete,
    CreateDirectory,
    Execute,
    Network,
    InterAgentCommunication,
}

impl Tool {
    /// Every known tool, in declaration order.
    pub const ALL: [Tool; 9] = [
        Tool::ReadLocal,
        Tool::ReadGlobal,
        Tool::Edit,
        Tool::Create,
        Tool::Delete,
        Tool::CreateDirectory,
        Tool::Execute,
        Tool::Network,
        Tool::InterAgentCommunication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::ReadLocal => "read-local",
            Tool::ReadGlobal => "read-global",
            Tool::Edit => "edit",
            Tool::Create => "create",
            Tool::Delete => "delete",
            Tool::CreateDirectory => "create-directory",
            Tool::Execute => "execute",
            Tool::Network => "network",
            Tool::InterAgentCommunication => "inter-agent-communication",
        }
    }

    /// Parse the kebab-case name; `None` for anything unknown.
    pub fn parse(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return true if `path` points outside the project tree.
///
/// Absolute paths, home-relative paths (`~`), and Windows drive paths
/// (`C:\...`, `C:/...`) count as global.
pub fn is_global_access(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') || path.starts_with('~') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Derive the tool required for `operation` on `path`.
///
/// Deterministic in `(operation, path, is_global_access(path))`.
pub fn required_tool(operation: OperationType, path: Option<&str>) -> Tool {
    let global = path.map(is_global_access).unwrap_or(false);
    match operation {
        OperationType::ReadFile | OperationType::Validate => {
            if global {
                Tool::ReadGlobal
            } else {
                Tool::ReadLocal
            }
        }
        OperationType::WriteFile => Tool::Create,
        OperationType::EditFile | OperationType::Transform => Tool::Edit,
        OperationType::DeleteFile => Tool::Delete,
        OperationType::CreateDirectory => Tool::CreateDirectory,
        OperationType::Execute => Tool::Execute,
        OperationType::NetworkRequest => Tool::Network,
        OperationType::Question => Tool::InterAgentCommunication,
    }
}
