//! The method registry: maps MCP method names to handlers and computes the
//! capability advertisement from what is registered.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use quill_mcp_protocol::{
    Implementation, LoggingCapabilities, McpMethod, McpResult, PromptsCapabilities,
    ResourceTemplate, ResourcesCapabilities, ServerCapabilities, ToolsCapabilities,
};

use crate::handlers::{
    LoggingSetLevelHandler, PingHandler, PromptsGetHandler, PromptsListHandler,
    ResourceTemplatesHandler, ResourcesListHandler, ResourcesReadHandler, ToolsCallHandler,
    ToolsListHandler,
};
use crate::prompt::McpPrompt;
use crate::resource::McpResource;
use crate::session::InitializationOptions;
use crate::tool::McpTool;

/// A request handler bound to one or more method names.
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> McpResult<Value>;
}

/// A handler for client-to-server notifications.
#[async_trait]
pub trait McpNotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> McpResult<()>;
}

/// Which list-changed notifications the server intends to emit. Controls
/// the `listChanged` flags in the capability advertisement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationOptions {
    pub prompts_changed: bool,
    pub resources_changed: bool,
    pub resources_subscribe: bool,
    pub tools_changed: bool,
}

/// The server registry: identity, registered handlers, and the tool,
/// prompt, and resource catalogs the built-in handlers serve from.
pub struct McpServer {
    server_info: Implementation,
    instructions: Option<String>,
    handlers: HashMap<McpMethod, Arc<dyn McpHandler>>,
    notification_handlers: HashMap<McpMethod, Arc<dyn McpNotificationHandler>>,
    notification_options: NotificationOptions,
    experimental: Option<HashMap<String, Value>>,
}

impl McpServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    pub fn get_handler(&self, method: &McpMethod) -> Option<Arc<dyn McpHandler>> {
        self.handlers.get(method).cloned()
    }

    pub fn get_notification_handler(
        &self,
        method: &McpMethod,
    ) -> Option<Arc<dyn McpNotificationHandler>> {
        self.notification_handlers.get(method).cloned()
    }

    fn has_handler(&self, method: McpMethod) -> bool {
        self.handlers.contains_key(&method)
    }

    /// The capability advertisement reflecting what is registered right now.
    /// A capability appears if and only if the corresponding list (or
    /// setLevel) handler is present.
    pub fn capabilities(&self) -> ServerCapabilities {
        let opts = self.notification_options;
        ServerCapabilities {
            logging: self
                .has_handler(McpMethod::LoggingSetLevel)
                .then(LoggingCapabilities::default),
            prompts: self.has_handler(McpMethod::PromptsList).then(|| {
                PromptsCapabilities {
                    list_changed: opts.prompts_changed.then_some(true),
                }
            }),
            resources: self.has_handler(McpMethod::ResourcesList).then(|| {
                ResourcesCapabilities {
                    subscribe: opts.resources_subscribe.then_some(true),
                    list_changed: opts.resources_changed.then_some(true),
                }
            }),
            tools: self.has_handler(McpMethod::ToolsList).then(|| {
                ToolsCapabilities {
                    list_changed: opts.tools_changed.then_some(true),
                }
            }),
            experimental: self.experimental.clone(),
        }
    }

    /// Snapshot identity and capabilities for a session about to start.
    pub fn create_initialization_options(&self) -> InitializationOptions {
        InitializationOptions {
            server_name: self.server_info.name.clone(),
            server_version: self.server_info.version.clone(),
            capabilities: self.capabilities(),
            instructions: self.instructions.clone(),
        }
    }
}

/// Builder for [`McpServer`]. Registering tools, prompts, or resources
/// installs the corresponding built-in list/get/read handlers; `ping` is
/// always installed.
pub struct McpServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    tools: HashMap<String, Arc<dyn McpTool>>,
    prompts: HashMap<String, Arc<dyn McpPrompt>>,
    resources: HashMap<String, Arc<dyn McpResource>>,
    resource_templates: Vec<ResourceTemplate>,
    handlers: HashMap<McpMethod, Arc<dyn McpHandler>>,
    notification_handlers: HashMap<McpMethod, Arc<dyn McpNotificationHandler>>,
    notification_options: NotificationOptions,
    experimental: Option<HashMap<String, Value>>,
    logging: bool,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "quill-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            tools: HashMap::new(),
            prompts: HashMap::new(),
            resources: HashMap::new(),
            resource_templates: Vec::new(),
            handlers: HashMap::new(),
            notification_handlers: HashMap::new(),
            notification_options: NotificationOptions::default(),
            experimental: None,
            logging: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool(mut self, tool: impl McpTool + 'static) -> Self {
        self.tools.insert(tool.name(), Arc::new(tool));
        self
    }

    pub fn prompt(mut self, prompt: impl McpPrompt + 'static) -> Self {
        self.prompts.insert(prompt.name(), Arc::new(prompt));
        self
    }

    pub fn resource(mut self, resource: impl McpResource + 'static) -> Self {
        self.resources.insert(resource.uri(), Arc::new(resource));
        self
    }

    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        self.resource_templates.push(template);
        self
    }

    /// Enable the `logging/setLevel` handler and advertise the logging
    /// capability.
    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    /// Register a custom handler for a method, including extension methods.
    pub fn handler(mut self, method: &str, handler: impl McpHandler + 'static) -> Self {
        self.handlers
            .insert(McpMethod::parse(method), Arc::new(handler));
        self
    }

    pub fn notification_handler(
        mut self,
        method: &str,
        handler: impl McpNotificationHandler + 'static,
    ) -> Self {
        self.notification_handlers
            .insert(McpMethod::parse(method), Arc::new(handler));
        self
    }

    pub fn notification_options(mut self, options: NotificationOptions) -> Self {
        self.notification_options = options;
        self
    }

    /// Advertise experimental capabilities verbatim.
    pub fn experimental(mut self, experimental: HashMap<String, Value>) -> Self {
        self.experimental = Some(experimental);
        self
    }

    pub fn build(mut self) -> McpServer {
        let mut handlers = std::mem::take(&mut self.handlers);

        handlers
            .entry(McpMethod::Ping)
            .or_insert_with(|| Arc::new(PingHandler));

        if !self.tools.is_empty() {
            let tools = Arc::new(self.tools);
            handlers.insert(
                McpMethod::ToolsList,
                Arc::new(ToolsListHandler::new(Arc::clone(&tools))),
            );
            handlers.insert(
                McpMethod::ToolsCall,
                Arc::new(ToolsCallHandler::new(tools)),
            );
        }

        if !self.prompts.is_empty() {
            let prompts = Arc::new(self.prompts);
            handlers.insert(
                McpMethod::PromptsList,
                Arc::new(PromptsListHandler::new(Arc::clone(&prompts))),
            );
            handlers.insert(
                McpMethod::PromptsGet,
                Arc::new(PromptsGetHandler::new(prompts)),
            );
        }

        if !self.resources.is_empty() || !self.resource_templates.is_empty() {
            let resources = Arc::new(self.resources);
            handlers.insert(
                McpMethod::ResourcesList,
                Arc::new(ResourcesListHandler::new(Arc::clone(&resources))),
            );
            handlers.insert(
                McpMethod::ResourcesRead,
                Arc::new(ResourcesReadHandler::new(resources)),
            );
            handlers.insert(
                McpMethod::ResourcesTemplatesList,
                Arc::new(ResourceTemplatesHandler::new(self.resource_templates)),
            );
        }

        if self.logging {
            handlers.insert(
                McpMethod::LoggingSetLevel,
                Arc::new(LoggingSetLevelHandler::new()),
            );
        }

        debug!(
            server = %self.name,
            methods = handlers.len(),
            "built server registry"
        );

        McpServer {
            server_info: Implementation::new(self.name, self.version),
            instructions: self.instructions,
            handlers,
            notification_handlers: self.notification_handlers,
            notification_options: self.notification_options,
            experimental: self.experimental,
        }
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_mcp_protocol::{CallToolResult, Tool, ToolSchema};

    struct NullTool;

    #[async_trait]
    impl McpTool for NullTool {
        fn descriptor(&self) -> Tool {
            Tool::new("null", ToolSchema::object())
        }

        async fn call(&self, _arguments: Option<Value>) -> McpResult<CallToolResult> {
            Ok(CallToolResult::from_text("null"))
        }
    }

    #[test]
    fn test_bare_server_advertises_nothing() {
        let server = McpServer::builder().name("bare").build();
        let caps = server.capabilities();
        assert!(caps.tools.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.resources.is_none());
        assert!(caps.logging.is_none());
        // ping is always answerable
        assert!(server.get_handler(&McpMethod::Ping).is_some());
    }

    #[test]
    fn test_tool_registration_advertises_tools() {
        let server = McpServer::builder().tool(NullTool).build();
        assert!(server.capabilities().tools.is_some());
        assert!(server.get_handler(&McpMethod::ToolsList).is_some());
        assert!(server.get_handler(&McpMethod::ToolsCall).is_some());
    }

    #[test]
    fn test_logging_capability() {
        let server = McpServer::builder().with_logging().build();
        assert!(server.capabilities().logging.is_some());
    }

    #[test]
    fn test_initialization_options_snapshot() {
        let server = McpServer::builder()
            .name("snap")
            .version("9.9.9")
            .instructions("be nice")
            .build();
        let options = server.create_initialization_options();
        assert_eq!(options.server_name, "snap");
        assert_eq!(options.server_version, "9.9.9");
        assert_eq!(options.instructions.as_deref(), Some("be nice"));
    }

    #[test]
    fn test_list_changed_flags_follow_notification_options() {
        let server = McpServer::builder()
            .tool(NullTool)
            .notification_options(NotificationOptions {
                tools_changed: true,
                ..Default::default()
            })
            .build();
        let caps = server.capabilities();
        assert_eq!(caps.tools.unwrap().list_changed, Some(true));
    }
}
