//! The per-connection session: initialize handshake state machine and
//! request/notification dispatch.
//!
//! A session owns no I/O. It pops inbound messages from the transport's
//! inbound queue and pushes responses and server notifications to the
//! outbound queue; the runner's read and write units move bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use quill_mcp_json_rpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ResultPayload,
};
use quill_mcp_protocol::notifications::{
    self, LoggingMessageParams, ProgressParams, ResourceUpdatedParams,
};
use quill_mcp_protocol::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, LoggingLevel,
    McpMethod, ServerCapabilities,
};

use crate::queue::MessageQueue;
use crate::server::McpServer;
use crate::{Result, ServerError};

/// Where a session is in the initialize handshake.
///
/// `Initialized` is entered only when the client's
/// `notifications/initialized` arrives; answering the `initialize` request
/// is not enough. Until then only `initialize` itself is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    NotInitialized,
    Initializing,
    Initialized,
}

/// Identity and capability snapshot a session advertises in its
/// `initialize` response. Produced by
/// [`McpServer::create_initialization_options`].
#[derive(Debug, Clone)]
pub struct InitializationOptions {
    pub server_name: String,
    pub server_version: String,
    pub capabilities: ServerCapabilities,
    pub instructions: Option<String>,
}

/// One client connection's worth of protocol state.
pub struct ServerSession {
    server: Arc<McpServer>,
    options: InitializationOptions,
    state: RwLock<InitializationState>,
    client_capabilities: RwLock<Option<ClientCapabilities>>,
    client_info: RwLock<Option<Implementation>>,
    inbound: Arc<MessageQueue<JsonRpcMessage>>,
    outbound: Arc<MessageQueue<JsonRpcMessage>>,
    started: AtomicBool,
}

impl ServerSession {
    pub fn new(
        server: Arc<McpServer>,
        options: InitializationOptions,
        streams: (Arc<MessageQueue<JsonRpcMessage>>, Arc<MessageQueue<JsonRpcMessage>>),
    ) -> Self {
        let (inbound, outbound) = streams;
        Self {
            server,
            options,
            state: RwLock::new(InitializationState::NotInitialized),
            client_capabilities: RwLock::new(None),
            client_info: RwLock::new(None),
            inbound,
            outbound,
            started: AtomicBool::new(false),
        }
    }

    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::Session("session already started".to_string()));
        }
        Ok(())
    }

    pub async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.outbound.close().await;
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> InitializationState {
        *self.state.read().await
    }

    pub async fn client_info(&self) -> Option<Implementation> {
        self.client_info.read().await.clone()
    }

    /// Whether the client declared every capability (and sub-flag) present
    /// in `required` during `initialize`.
    pub async fn check_client_capability(&self, required: &ClientCapabilities) -> bool {
        let declared = self.client_capabilities.read().await;
        let Some(declared) = declared.as_ref() else {
            return false;
        };

        if let Some(required_roots) = &required.roots {
            match &declared.roots {
                None => return false,
                Some(declared_roots) => {
                    if required_roots.list_changed == Some(true)
                        && declared_roots.list_changed != Some(true)
                    {
                        return false;
                    }
                }
            }
        }

        if required.sampling.is_some() && declared.sampling.is_none() {
            return false;
        }

        if let Some(required_experimental) = &required.experimental {
            match &declared.experimental {
                None => return false,
                Some(declared_experimental) => {
                    for key in required_experimental.keys() {
                        if !declared_experimental.contains_key(key) {
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    /// Pop and dispatch one inbound message.
    ///
    /// `Ok(false)` means nothing arrived within `timeout`. Handshake
    /// violations come back as `Err`; the caller logs them and keeps the
    /// session alive.
    pub async fn process_next_message(&self, timeout: Duration) -> Result<bool> {
        let Some(message) = self.inbound.pop(Some(timeout)).await else {
            return Ok(false);
        };

        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request).await?,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await?
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                // No server-initiated requests, so nothing can be awaiting this
                warn!("dropping unexpected response from client");
            }
        }
        Ok(true)
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Result<()> {
        let method = McpMethod::parse(&request.method);
        let state = self.state().await;

        if method == McpMethod::Initialize {
            // Serviced in any state; a repeat restarts the handshake
            if state != InitializationState::NotInitialized {
                info!(state = ?state, "initialize received again, restarting handshake");
            }
            let params: InitializeParams = match request.params_value() {
                Some(value) => match serde_json::from_value(value) {
                    Ok(params) => params,
                    Err(e) => {
                        warn!(error = %e, "initialize carried malformed params");
                        self.send(JsonRpcMessage::Error(JsonRpcError::invalid_params(
                            request.id,
                            format!("invalid initialize params: {e}"),
                        )))
                        .await?;
                        return Ok(());
                    }
                },
                None => InitializeParams::default(),
            };
            let result = self.handle_initialize(params).await;
            let payload = ResultPayload::from_value(serde_json::to_value(&result).map_err(
                |e| ServerError::Session(format!("failed to serialize initialize result: {e}")),
            )?);
            self.send(JsonRpcMessage::Response(JsonRpcResponse::new(
                request.id, payload,
            )))
            .await?;
            return Ok(());
        }

        if state != InitializationState::Initialized {
            return Err(ServerError::Session(format!(
                "request '{}' received before initialization completed",
                request.method
            )));
        }

        let Some(handler) = self.server.get_handler(&method) else {
            debug!(method = %request.method, "no handler registered");
            self.send(JsonRpcMessage::Error(JsonRpcError::method_not_found(
                request.id,
                &request.method,
            )))
            .await?;
            return Ok(());
        };

        match handler.handle(request.params_value()).await {
            Ok(value) => {
                self.send(JsonRpcMessage::Response(JsonRpcResponse::new(
                    request.id,
                    ResultPayload::from_value(value),
                )))
                .await?;
            }
            Err(e) => {
                warn!(method = %request.method, error = %e, "handler failed");
                self.send(JsonRpcMessage::Error(JsonRpcError::new(
                    Some(request.id),
                    e.to_error_object(),
                )))
                .await?;
            }
        }
        Ok(())
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        let method = McpMethod::parse(&notification.method);
        let state = self.state().await;

        if method == McpMethod::Initialized {
            match state {
                InitializationState::Initializing => {
                    *self.state.write().await = InitializationState::Initialized;
                    info!("session initialized");
                }
                // A duplicate completion is harmless
                InitializationState::Initialized => {
                    debug!("ignoring repeated notifications/initialized")
                }
                InitializationState::NotInitialized => {
                    return Err(ServerError::Session(
                        "notifications/initialized received before initialize".to_string(),
                    ));
                }
            }
            return Ok(());
        }

        if state != InitializationState::Initialized {
            return Err(ServerError::Session(format!(
                "notification '{}' received before initialization completed",
                notification.method
            )));
        }

        match self.server.get_notification_handler(&method) {
            Some(handler) => {
                if let Err(e) = handler.handle(notification.params_value()).await {
                    warn!(method = %notification.method, error = %e, "notification handler failed");
                }
            }
            // Notifications never get responses, unknown ones are dropped
            None => debug!(method = %notification.method, "ignoring unhandled notification"),
        }
        Ok(())
    }

    async fn handle_initialize(&self, params: InitializeParams) -> InitializeResult {
        info!(
            client = params
                .client_info
                .as_ref()
                .map(|i| i.name.as_str())
                .unwrap_or("unknown"),
            requested_version = params.protocol_version.as_deref().unwrap_or("none"),
            "initialize received"
        );

        *self.client_capabilities.write().await = Some(params.capabilities);
        *self.client_info.write().await = params.client_info;
        *self.state.write().await = InitializationState::Initializing;

        // Always answer with the version this server speaks; a client that
        // cannot accept it is expected to disconnect
        let result = InitializeResult::new(
            self.options.capabilities.clone(),
            Implementation::new(&self.options.server_name, &self.options.server_version),
        );
        match &self.options.instructions {
            Some(instructions) => result.with_instructions(instructions),
            None => result,
        }
    }

    async fn send(&self, message: JsonRpcMessage) -> Result<()> {
        if self.outbound.push(message, None).await {
            Ok(())
        } else {
            Err(ServerError::Transport("outbound queue closed".to_string()))
        }
    }

    async fn send_notification(&self, method: &str, params: Map<String, Value>) -> Result<()> {
        let notification = JsonRpcNotification::with_object_params(method, params);
        self.send(JsonRpcMessage::Notification(notification)).await
    }

    fn param_map<T: serde::Serialize>(params: &T) -> Result<Map<String, Value>> {
        match serde_json::to_value(params) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ServerError::Session(
                "notification params must be an object".to_string(),
            )),
            Err(e) => Err(ServerError::Session(e.to_string())),
        }
    }

    /// Emit a `notifications/message` log entry to the client.
    pub async fn send_log_message(
        &self,
        level: LoggingLevel,
        data: Value,
        logger: Option<String>,
    ) -> Result<()> {
        let params = LoggingMessageParams {
            level,
            logger,
            data,
        };
        self.send_notification(notifications::methods::MESSAGE, Self::param_map(&params)?)
            .await
    }

    /// Emit a `notifications/progress` update for a long-running request.
    pub async fn send_progress(
        &self,
        progress_token: Value,
        progress: f64,
        total: Option<f64>,
    ) -> Result<()> {
        let params = ProgressParams {
            progress_token,
            progress,
            total,
        };
        self.send_notification(notifications::methods::PROGRESS, Self::param_map(&params)?)
            .await
    }

    /// Tell the client a resource it cares about changed.
    pub async fn send_resource_updated(&self, uri: impl Into<String>) -> Result<()> {
        let params = ResourceUpdatedParams { uri: uri.into() };
        self.send_notification(
            notifications::methods::RESOURCE_UPDATED,
            Self::param_map(&params)?,
        )
        .await
    }

    pub async fn send_resource_list_changed(&self) -> Result<()> {
        self.send_notification(notifications::methods::RESOURCE_LIST_CHANGED, Map::new())
            .await
    }

    pub async fn send_tool_list_changed(&self) -> Result<()> {
        self.send_notification(notifications::methods::TOOL_LIST_CHANGED, Map::new())
            .await
    }

    pub async fn send_prompt_list_changed(&self) -> Result<()> {
        self.send_notification(notifications::methods::PROMPT_LIST_CHANGED, Map::new())
            .await
    }

    /// The server never issues client-bound requests, so there is never a
    /// response to wait for.
    pub async fn wait_for_response(&self) -> Result<JsonRpcMessage> {
        Err(ServerError::Session(
            "server-initiated requests are not supported".to_string(),
        ))
    }
}
