//! Operations, router requests, and handler responses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{agent::AgentId, tool::Tool};

/// The kind of work a request asks an agent to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    ReadFile,
    WriteFile,
    EditFile,
    DeleteFile,
    CreateDirectory,
    Execute,
    NetworkRequest,
    Question,
    Validate,
    Transform,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::ReadFile => "READ_FILE",
            OperationType::WriteFile => "WRITE_FILE",
            OperationType::EditFile => "EDIT_FILE",
            OperationType::DeleteFile => "DELETE_FILE",
            OperationType::CreateDirectory => "CREATE_DIRECTORY",
            OperationType::Execute => "EXECUTE",
            OperationType::NetworkRequest => "NETWORK_REQUEST",
            OperationType::Question => "QUESTION",
            OperationType::Validate => "VALIDATE",
            OperationType::Transform => "TRANSFORM",
        }
    }

    /// True for operations that change the file system.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            OperationType::WriteFile
                | OperationType::EditFile
                | OperationType::DeleteFile
                | OperationType::CreateDirectory
                | OperationType::Transform
        )
    }

    /// Endpoint names the router tries, in order, when a request carries
    /// no path to route by.
    pub fn endpoint_names(&self) -> &'static [&'static str] {
        match self {
            OperationType::Question => &["question"],
            OperationType::Validate => &["validate"],
            OperationType::Transform => &["transform"],
            _ => &["handle", "process"],
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation submitted to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Unique request id (UUID v4 unless the caller supplies one).
    pub id: String,
    pub operation: OperationType,
    /// Target path for file operations.
    pub file_path: Option<String>,
    /// Route to this agent directly instead of resolving by path or endpoint.
    pub target_agent: Option<AgentId>,
    /// The agent that originated the request, if any.
    pub requester: Option<AgentId>,
    /// Operation body handed to the handler untouched.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentRequest {
    pub fn new(operation: OperationType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            file_path: None,
            target_agent: None,
            requester: None,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn to_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.target_agent = Some(AgentId::new(agent_id));
        self
    }

    pub fn from_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.requester = Some(AgentId::new(agent_id));
        self
    }
}

/// The structured outcome of a routed request.
///
/// Failures are always reported through this type; the router never lets an
/// error cross its boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub request_id: String,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// The agent id that produced the response, or `"orchestrator"`.
    pub handled_by: String,
    /// Present on tool-gate denials.
    pub required_tool: Option<Tool>,
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    /// Handler id used for responses the router produces itself.
    pub const ORCHESTRATOR: &'static str = "orchestrator";

    pub fn success(data: serde_json::Value) -> Self {
        Self {
            request_id: String::new(),
            success: true,
            data: Some(data),
            error: None,
            handled_by: String::new(),
            required_tool: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            success: false,
            data: None,
            error: Some(error.into()),
            handled_by: String::new(),
            required_tool: None,
            timestamp: Utc::now(),
        }
    }

    /// A failure produced by the router itself for `request_id`.
    pub fn orchestrator_failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            handled_by: Self::ORCHESTRATOR.to_string(),
            ..Self::failure(error)
        }
    }
}
