//! # MCP Protocol Types
//!
//! Wire-format types for the Model Context Protocol: the initialize
//! handshake, client/server capabilities, and the tools, prompts, and
//! resources catalogs. These are the fixed schema the session engine
//! serializes against; the engine itself lives in `quill-mcp-server`.

pub mod content;
pub mod initialize;
pub mod logging;
pub mod method;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod tools;

// Re-export main types
pub use content::{Content, ResourceContents};
pub use initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, LoggingCapabilities,
    PromptsCapabilities, ResourcesCapabilities, RootsCapabilities, SamplingCapabilities,
    ServerCapabilities, ToolsCapabilities,
};
pub use logging::{LoggingLevel, SetLevelParams};
pub use method::McpMethod;
pub use prompts::{
    GetPromptParams, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    Resource, ResourceTemplate,
};
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, Tool, ToolSchema};

use quill_mcp_json_rpc::{error_codes, ErrorObject};

/// The protocol version this server negotiates during `initialize`.
pub const LATEST_PROTOCOL_VERSION: &str = "2024-11-05";

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP domain errors. Handler failures are caught at the session dispatch
/// boundary and translated into JSON-RPC error responses via
/// [`McpError::to_error_object`].
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("Resource execution failed: {0}")]
    ResourceExecutionError(String),

    #[error("Prompt execution failed: {0}")]
    PromptExecutionError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl McpError {
    /// Create a missing parameter error
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecutionError(message.into())
    }

    /// The JSON-RPC error object this domain error reports as.
    pub fn to_error_object(&self) -> ErrorObject {
        let code = match self {
            McpError::ToolNotFound(_)
            | McpError::ResourceNotFound(_)
            | McpError::PromptNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParameters(_) | McpError::MissingParameter(_) => {
                error_codes::INVALID_PARAMS
            }
            McpError::VersionMismatch { .. } => error_codes::INVALID_REQUEST,
            _ => error_codes::INTERNAL_ERROR,
        };
        ErrorObject::new(code, self.to_string())
    }
}

impl From<String> for McpError {
    fn from(message: String) -> Self {
        Self::ToolExecutionError(message)
    }
}

impl From<&str> for McpError {
    fn from(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_object_codes() {
        assert_eq!(
            McpError::ToolNotFound("x".into()).to_error_object().code,
            -32601
        );
        assert_eq!(
            McpError::invalid_params("x").to_error_object().code,
            -32602
        );
        assert_eq!(
            McpError::tool_execution("x").to_error_object().code,
            -32603
        );
    }
}
