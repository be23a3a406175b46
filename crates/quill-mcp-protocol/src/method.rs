//! Typed MCP method names.
//!
//! Dispatch matches on [`McpMethod`] rather than raw strings. Methods not
//! in the core set parse into [`McpMethod::Extension`], which keeps dispatch
//! total: an unregistered extension method yields a method-not-found error
//! instead of a parse failure.

use std::fmt;

/// Every method name the server understands, plus a catch-all for
/// server-specific extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum McpMethod {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
    PromptsList,
    PromptsGet,
    ResourcesList,
    ResourcesTemplatesList,
    ResourcesRead,
    LoggingSetLevel,
    Extension(String),
}

impl McpMethod {
    pub fn parse(method: &str) -> Self {
        match method {
            "initialize" => McpMethod::Initialize,
            "notifications/initialized" => McpMethod::Initialized,
            "ping" => McpMethod::Ping,
            "tools/list" => McpMethod::ToolsList,
            "tools/call" => McpMethod::ToolsCall,
            "prompts/list" => McpMethod::PromptsList,
            "prompts/get" => McpMethod::PromptsGet,
            "resources/list" => McpMethod::ResourcesList,
            "resources/templates/list" => McpMethod::ResourcesTemplatesList,
            "resources/read" => McpMethod::ResourcesRead,
            "logging/setLevel" => McpMethod::LoggingSetLevel,
            other => McpMethod::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            McpMethod::Initialize => "initialize",
            McpMethod::Initialized => "notifications/initialized",
            McpMethod::Ping => "ping",
            McpMethod::ToolsList => "tools/list",
            McpMethod::ToolsCall => "tools/call",
            McpMethod::PromptsList => "prompts/list",
            McpMethod::PromptsGet => "prompts/get",
            McpMethod::ResourcesList => "resources/list",
            McpMethod::ResourcesTemplatesList => "resources/templates/list",
            McpMethod::ResourcesRead => "resources/read",
            McpMethod::LoggingSetLevel => "logging/setLevel",
            McpMethod::Extension(name) => name,
        }
    }
}

impl fmt::Display for McpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for McpMethod {
    fn from(method: &str) -> Self {
        McpMethod::parse(method)
    }
}
