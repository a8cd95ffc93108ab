//! Agent identity and capability records.
//!
//! An agent is a named handler of operations. What it may touch is declared
//! up front: the directories it owns (glob patterns) and the tools it holds.
//! The directory stores these records; nothing downstream mutates them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// Stable, human-readable identifier for an agent.
///
/// Used across the directory, override rules, audit entries, and events.
/// Example: `AgentId("frontend-editor")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Construct an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A named entry point an agent exposes to the router.
///
/// Requests without a path are matched to agents by endpoint name
/// (`"question"`, `"validate"`, `"transform"`, `"handle"`, `"process"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Boolean permission flags used by older agent definitions.
///
/// When an agent is registered with an empty tool set, the router folds
/// these flags into tools via [`LegacyPermissions::to_tools`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyPermissions {
    pub can_read: bool,
    pub can_read_global: bool,
    pub can_write: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_create_directories: bool,
    pub can_execute: bool,
    pub can_access_network: bool,
    pub can_ask_questions: bool,
}

impl LegacyPermissions {
    /// Map each set flag to the tool(s) it used to imply.
    ///
    /// `can_write` historically covered both creating and editing files.
    pub fn to_tools(&self) -> BTreeSet<Tool> {
        let mut tools = BTreeSet::new();
        if self.can_read {
            tools.insert(Tool::ReadLocal);
        }
        if self.can_read_global {
            tools.insert(Tool::ReadGlobal);
        }
        if self.can_write {
            tools.insert(Tool::Create);
            tools.insert(Tool::Edit);
        }
        if self.can_edit {
            tools.insert(Tool::Edit);
        }
        if self.can_delete {
            tools.insert(Tool::Delete);
        }
        if self.can_create_directories {
            tools.insert(Tool::CreateDirectory);
        }
        if self.can_execute {
            tools.insert(Tool::Execute);
        }
        if self.can_access_network {
            tools.insert(Tool::Network);
        }
        if self.can_ask_questions {
            tools.insert(Tool::InterAgentCommunication);
        }
        tools
    }
}

/// Everything the core knows about one agent.
///
/// Owned by the agent directory once registered. The decision engine only
/// ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Glob patterns for the paths this agent is responsible for.
    #[serde(default)]
    pub directory_patterns: Vec<String>,
    #[serde(default)]
    pub tools: BTreeSet<Tool>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Pre-tool permission flags; only consulted when `tools` is empty.
    #[serde(default)]
    pub legacy: Option<LegacyPermissions>,
}

impl AgentCapability {
    /// A capability record with no patterns, tools, or endpoints.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.into(),
            description: String::new(),
            directory_patterns: Vec::new(),
            tools: BTreeSet::new(),
            endpoints: Vec::new(),
            legacy: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_directory_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directory_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.endpoints.push(Endpoint::new(name, description));
        self
    }

    pub fn with_legacy(mut self, legacy: LegacyPermissions) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Return true if the agent holds `tool`.
    pub fn has_tool(&self, tool: Tool) -> bool {
        self.tools.contains(&tool)
    }

    /// Return true if the agent declares an endpoint called `name`.
    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints.iter().any(|e| e.name == name)
    }

    /// Fill `tools` from the legacy flags when no tools were declared.
    ///
    /// Returns true if any tools were added.
    pub fn normalize_legacy_permissions(&mut self) -> bool {
        if !self.tools.is_empty() {
            return false;
        }
        match &self.legacy {
            Some(legacy) => {
                self.tools = legacy.to_tools();
                !self.tools.is_empty()
            }
            None => false,
        }
    }
}
