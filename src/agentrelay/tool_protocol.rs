//! Tool protocol abstraction.
//!
//! An orchestrating agent reaches every capability it can call, remote agents included, through
//! the [`ToolProtocol`] trait.  A [`ToolRegistry`] indexes the tools exposed by one or more
//! protocols so the caller can dispatch by tool name alone.
//!
//! ```text
//! orchestrator → ToolRegistry → ToolProtocol (trait) → [RemoteAgentProtocol | user-defined]
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentrelay::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType};
//!
//! let metadata = ToolMetadata::new("invoke_remote_agent", "Delegate a request")
//!     .with_parameter(
//!         ToolParameter::new("agent", ToolParameterType::String)
//!             .with_description("Registered agent name")
//!             .required(),
//!     );
//! assert_eq!(metadata.parameters.len(), 1);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Represents the result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: serde_json::Value,
    /// Human-readable reason when `success` is false.
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }

    /// Attach application specific metadata (e.g. the task id of a delegation).
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Defines the type of a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Object,
}

/// Defines a parameter for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Metadata about a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    /// Additional metadata specific to the protocol
    pub protocol_metadata: HashMap<String, serde_json::Value>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            protocol_metadata: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_protocol_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.protocol_metadata.insert(key.into(), value);
        self
    }
}

/// Trait for implementing tool execution protocols
#[async_trait]
pub trait ToolProtocol: Send + Sync {
    /// Execute a tool with the given parameters
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>>;

    /// Get metadata about available tools
    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>>;

    /// Get metadata about a specific tool
    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>>;

    /// Protocol identifier (e.g. "a2a")
    fn protocol_name(&self) -> &str;
}

/// Error types for tool operations
#[derive(Debug, Clone)]
pub enum ToolError {
    /// Requested tool is not registered in the current registry/protocol.
    NotFound(String),
    /// The provided JSON parameters failed validation or deserialization.
    InvalidParameters(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
        }
    }
}

impl Error for ToolError {}

/// Routes tool calls to whichever registered protocol exposes the tool.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolMetadata>,
    routes: HashMap<String, Arc<dyn ToolProtocol>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every tool `protocol` lists.  A tool name already registered is taken over by the
    /// newer protocol.
    pub async fn add_protocol(
        &mut self,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let tools = protocol.list_tools().await?;
        let count = tools.len();
        for metadata in tools {
            if self.routes.contains_key(&metadata.name) {
                log::warn!(
                    "tool '{}' re-registered by protocol '{}'",
                    metadata.name,
                    protocol.protocol_name()
                );
            }
            self.routes
                .insert(metadata.name.clone(), Arc::clone(&protocol));
            self.tools.insert(metadata.name.clone(), metadata);
        }
        Ok(count)
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolMetadata> {
        self.tools.get(name)
    }

    /// Metadata for every registered tool, sorted by name.
    pub fn list_tools(&self) -> Vec<&ToolMetadata> {
        let mut tools: Vec<&ToolMetadata> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a named tool with serialized parameters.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let protocol = self
            .routes
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        protocol.execute(tool_name, parameters).await
    }
}
