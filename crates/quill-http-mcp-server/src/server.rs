//! The hyper front end: accepts connections, routes the SSE and message
//! paths, and runs the session engine behind an [`SseServerTransport`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use quill_mcp_json_rpc::JsonRpcError;
use quill_mcp_server::{McpServer, RunnerConfig, ServerRunner};

use crate::sse::SseServerTransport;
use crate::{HttpServerError, Result};

type ResponseBody = BoxBody<Bytes, Infallible>;

/// Settings for the HTTP front end.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind_address: SocketAddr,
    /// Path clients open their event stream on
    pub sse_path: String,
    /// Path clients post JSON-RPC messages to
    pub messages_path: String,
    /// Upper bound on a posted message body
    pub max_body_size: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: ([127, 0, 0, 1], 8080).into(),
            sse_path: "/sse".to_string(),
            messages_path: "/messages".to_string(),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Serves an [`McpServer`] over HTTP with SSE downstream delivery.
pub struct HttpMcpServer {
    server: McpServer,
    config: HttpServerConfig,
    runner_config: RunnerConfig,
}

impl HttpMcpServer {
    pub fn new(server: McpServer) -> Self {
        Self {
            server,
            config: HttpServerConfig::default(),
            runner_config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HttpServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_runner_config(mut self, runner_config: RunnerConfig) -> Self {
        self.runner_config = runner_config;
        self
    }

    /// Bind and serve until the session engine stops.
    pub async fn run(self) -> Result<()> {
        let config = Arc::new(self.config);
        let transport = Arc::new(SseServerTransport::new(config.messages_path.clone()));

        let runner = ServerRunner::with_config(self.server, self.runner_config);
        let shutdown = runner.shutdown_token();
        let engine = tokio::spawn(runner.run(Arc::clone(&transport)));

        let listener = TcpListener::bind(config.bind_address).await?;
        info!(
            address = %config.bind_address,
            sse_path = %config.sse_path,
            messages_path = %config.messages_path,
            "HTTP server listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "connection accepted");

                    let transport = Arc::clone(&transport);
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        let service = service_fn(move |request| {
                            handle_request(request, Arc::clone(&transport), Arc::clone(&config))
                        });
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!(error = %e, "connection ended");
                        }
                    });
                }
            }
        }

        match engine.await {
            Ok(result) => result?,
            Err(e) => error!(error = %e, "session engine panicked"),
        }
        Ok(())
    }
}

async fn handle_request(
    request: Request<Incoming>,
    transport: Arc<SseServerTransport>,
    config: Arc<HttpServerConfig>,
) -> std::result::Result<Response<ResponseBody>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = match (method, path.as_str()) {
        (Method::GET, path) if path == config.sse_path => handle_sse(transport).await,
        (Method::POST, path) if path == config.messages_path => {
            handle_post(request, transport, &config).await
        }
        _ => not_found(),
    };
    Ok(response)
}

async fn handle_sse(transport: Arc<SseServerTransport>) -> Response<ResponseBody> {
    let (session_id, receiver) = transport.handle_sse_request().await;
    debug!(session_id = %session_id, "event stream started");

    let frames = UnboundedReceiverStream::new(receiver)
        .map(|frame| Ok::<_, Infallible>(Frame::data(Bytes::from(frame))));

    match Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("access-control-allow-origin", "*")
        .body(BodyExt::boxed(StreamBody::new(frames)))
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build SSE response");
            internal_error()
        }
    }
}

async fn handle_post(
    request: Request<Incoming>,
    transport: Arc<SseServerTransport>,
    config: &HttpServerConfig,
) -> Response<ResponseBody> {
    let session_id = match query_param(request.uri().query(), "session_id") {
        Some(id) => id,
        None => {
            return json_response(
                StatusCode::BAD_REQUEST,
                "{\"error\":\"session_id query parameter required\"}".to_string(),
            );
        }
    };

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return json_response(
                StatusCode::BAD_REQUEST,
                "{\"error\":\"failed to read request body\"}".to_string(),
            );
        }
    };
    if body.len() > config.max_body_size {
        let error = HttpServerError::BodyTooLarge(config.max_body_size);
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, &error);
    }

    match transport.handle_post_request(&session_id, &body).await {
        Ok(()) => json_response(StatusCode::OK, "{\"success\":true}".to_string()),
        Err(e @ HttpServerError::SessionNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, &e)
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn json_response(status: StatusCode, body: String) -> Response<ResponseBody> {
    match Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "failed to build response");
            internal_error()
        }
    }
}

/// Body is the JSON-RPC error envelope so clients can parse failures the
/// same way on both transports.
fn error_response(status: StatusCode, error: &HttpServerError) -> Response<ResponseBody> {
    let envelope = JsonRpcError::new(None, error.to_error_object());
    let body = serde_json::to_string(&envelope)
        .unwrap_or_else(|_| "{\"error\":\"internal error\"}".to_string());
    json_response(status, body)
}

fn not_found() -> Response<ResponseBody> {
    json_response(
        StatusCode::NOT_FOUND,
        "{\"error\":\"not found\"}".to_string(),
    )
}

fn internal_error() -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from("internal error")).boxed());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_parsing() {
        assert_eq!(
            query_param(Some("session_id=abc&x=1"), "session_id").as_deref(),
            Some("abc")
        );
        assert_eq!(
            query_param(Some("x=1&session_id=abc"), "session_id").as_deref(),
            Some("abc")
        );
        assert_eq!(query_param(Some("x=1"), "session_id"), None);
        assert_eq!(query_param(None, "session_id"), None);
    }

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.sse_path, "/sse");
        assert_eq!(config.messages_path, "/messages");
        assert_eq!(config.max_body_size, 1024 * 1024);
    }
}
