//! # HTTP Front End for MCP
//!
//! Serves MCP over HTTP: clients open a long-lived SSE stream on the SSE
//! path and post JSON-RPC messages to the messages path, addressed by the
//! `session_id` assigned when the stream opened. Server-to-client traffic
//! is broadcast to every open stream as `message` events.

pub mod server;
pub mod sse;

pub use server::{HttpMcpServer, HttpServerConfig};
pub use sse::SseServerTransport;

use quill_mcp_json_rpc::{CodecError, ErrorObject};
use quill_mcp_server::ServerError;

/// Result type for the HTTP front end
pub type Result<T> = std::result::Result<T, HttpServerError>;

/// Errors the HTTP layer reports. Request-scoped variants map onto
/// JSON-RPC error objects for the response body.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Request body too large (limit {0} bytes)")]
    BodyTooLarge(usize),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

impl HttpServerError {
    /// The JSON-RPC error object a request-scoped failure reports as.
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            HttpServerError::SessionNotFound(id) => ErrorObject::session_not_found(id),
            HttpServerError::Codec(e) => e.to_error_object(),
            HttpServerError::BodyTooLarge(_) => ErrorObject::invalid_request(self.to_string()),
            other => ErrorObject::internal_error(other.to_string()),
        }
    }
}
