//! Built-in handlers for the core MCP methods. Each serves from the
//! registry snapshot it was built with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use quill_mcp_protocol::{
    CallToolParams, CallToolResult, GetPromptParams, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, LoggingLevel, McpError,
    McpResult, ReadResourceParams, ResourceTemplate, SetLevelParams,
};

use crate::prompt::McpPrompt;
use crate::resource::McpResource;
use crate::server::McpHandler;
use crate::tool::McpTool;

type ToolRegistry = Arc<HashMap<String, Arc<dyn McpTool>>>;
type PromptRegistry = Arc<HashMap<String, Arc<dyn McpPrompt>>>;
type ResourceRegistry = Arc<HashMap<String, Arc<dyn McpResource>>>;

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|e| McpError::invalid_params(e.to_string()))
}

/// `ping`. Returns an empty object so the client knows the session is alive.
pub struct PingHandler;

#[async_trait]
impl McpHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        Ok(json!({}))
    }
}

/// `tools/list`.
pub struct ToolsListHandler {
    tools: ToolRegistry,
}

impl ToolsListHandler {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl McpHandler for ToolsListHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        let mut tools: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListToolsResult { tools })?)
    }
}

/// `tools/call`. Execution failures are reported in-band with
/// `isError: true` rather than as JSON-RPC errors, so a broken tool does
/// not look like a broken session.
pub struct ToolsCallHandler {
    tools: ToolRegistry,
}

impl ToolsCallHandler {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl McpHandler for ToolsCallHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        let params: CallToolParams = parse_params(params)?;

        let result = match self.tools.get(&params.name) {
            None => CallToolResult::error(format!("Unknown tool: {}", params.name)),
            Some(tool) => {
                debug!(tool = %params.name, "calling tool");
                match tool.call(params.arguments).await {
                    Ok(result) => result,
                    Err(e) => CallToolResult::error(e.to_string()),
                }
            }
        };
        Ok(serde_json::to_value(result)?)
    }
}

/// `prompts/list`.
pub struct PromptsListHandler {
    prompts: PromptRegistry,
}

impl PromptsListHandler {
    pub fn new(prompts: PromptRegistry) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl McpHandler for PromptsListHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        let mut prompts: Vec<_> = self.prompts.values().map(|p| p.descriptor()).collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(serde_json::to_value(ListPromptsResult { prompts })?)
    }
}

/// `prompts/get`.
pub struct PromptsGetHandler {
    prompts: PromptRegistry,
}

impl PromptsGetHandler {
    pub fn new(prompts: PromptRegistry) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl McpHandler for PromptsGetHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        let params: GetPromptParams = parse_params(params)?;
        let prompt = self
            .prompts
            .get(&params.name)
            .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;
        let result = prompt.render(params.arguments).await?;
        Ok(serde_json::to_value(result)?)
    }
}

/// `resources/list`.
pub struct ResourcesListHandler {
    resources: ResourceRegistry,
}

impl ResourcesListHandler {
    pub fn new(resources: ResourceRegistry) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl McpHandler for ResourcesListHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        let mut resources: Vec<_> = self.resources.values().map(|r| r.descriptor()).collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(serde_json::to_value(ListResourcesResult { resources })?)
    }
}

/// `resources/read`.
pub struct ResourcesReadHandler {
    resources: ResourceRegistry,
}

impl ResourcesReadHandler {
    pub fn new(resources: ResourceRegistry) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl McpHandler for ResourcesReadHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ReadResourceParams = parse_params(params)?;
        let resource = self
            .resources
            .get(&params.uri)
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;
        let result = resource.read().await?;
        Ok(serde_json::to_value(result)?)
    }
}

/// `resources/templates/list`.
pub struct ResourceTemplatesHandler {
    templates: Vec<ResourceTemplate>,
}

impl ResourceTemplatesHandler {
    pub fn new(templates: Vec<ResourceTemplate>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl McpHandler for ResourceTemplatesHandler {
    async fn handle(&self, _params: Option<Value>) -> McpResult<Value> {
        Ok(serde_json::to_value(ListResourceTemplatesResult {
            resource_templates: self.templates.clone(),
        })?)
    }
}

/// `logging/setLevel`. Remembers the client's requested minimum severity
/// for `notifications/message` filtering.
pub struct LoggingSetLevelHandler {
    level: Arc<RwLock<LoggingLevel>>,
}

impl LoggingSetLevelHandler {
    pub fn new() -> Self {
        Self {
            level: Arc::new(RwLock::new(LoggingLevel::Info)),
        }
    }

    pub fn level_handle(&self) -> Arc<RwLock<LoggingLevel>> {
        Arc::clone(&self.level)
    }
}

impl Default for LoggingSetLevelHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpHandler for LoggingSetLevelHandler {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
        let params: SetLevelParams = parse_params(params)?;
        if let Ok(mut level) = self.level.write() {
            *level = params.level;
        }
        info!(level = %params.level, "log level set by client");
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_mcp_protocol::{Tool, ToolSchema};

    struct EchoTool;

    #[async_trait]
    impl McpTool for EchoTool {
        fn descriptor(&self) -> Tool {
            Tool::new("echo", ToolSchema::object())
        }

        async fn call(&self, arguments: Option<Value>) -> McpResult<CallToolResult> {
            let text = arguments
                .and_then(|a| a.get("text").and_then(|t| t.as_str().map(String::from)))
                .ok_or_else(|| McpError::missing_param("text"))?;
            Ok(CallToolResult::from_text(text))
        }
    }

    fn echo_registry() -> ToolRegistry {
        let mut tools: HashMap<String, Arc<dyn McpTool>> = HashMap::new();
        tools.insert("echo".to_string(), Arc::new(EchoTool));
        Arc::new(tools)
    }

    #[tokio::test]
    async fn test_ping_returns_empty_object() {
        let result = PingHandler.handle(None).await.unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let handler = ToolsListHandler::new(echo_registry());
        let result = handler.handle(None).await.unwrap();
        assert_eq!(result["tools"][0]["name"], json!("echo"));
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let handler = ToolsCallHandler::new(echo_registry());
        let result = handler
            .handle(Some(json!({"name": "echo", "arguments": {"text": "hi"}})))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], json!("hi"));
        assert!(result.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool_is_in_band_error() {
        let handler = ToolsCallHandler::new(echo_registry());
        let result = handler
            .handle(Some(json!({"name": "missing"})))
            .await
            .unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["content"][0]["text"], json!("Unknown tool: missing"));
    }

    #[tokio::test]
    async fn test_tools_call_failure_is_in_band_error() {
        let handler = ToolsCallHandler::new(echo_registry());
        let result = handler
            .handle(Some(json!({"name": "echo"})))
            .await
            .unwrap();
        assert_eq!(result["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_tools_call_rejects_missing_name() {
        let handler = ToolsCallHandler::new(echo_registry());
        let err = handler.handle(Some(json!({}))).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_set_level_updates_shared_handle() {
        let handler = LoggingSetLevelHandler::new();
        let level = handler.level_handle();
        handler
            .handle(Some(json!({"level": "warning"})))
            .await
            .unwrap();
        assert_eq!(*level.read().unwrap(), LoggingLevel::Warning);
    }
}
