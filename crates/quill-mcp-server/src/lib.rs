//! # MCP Server Engine
//!
//! The session layer of the Model Context Protocol server: a method
//! registry ([`McpServer`]), the initialize handshake state machine
//! ([`ServerSession`]), a newline-delimited stdio transport, and a
//! [`ServerRunner`] that wires them together on Tokio.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use quill_mcp_server::{McpServer, ServerRunner};
//!
//! #[tokio::main]
//! async fn main() -> quill_mcp_server::Result<()> {
//!     let server = McpServer::builder()
//!         .name("example-server")
//!         .version("0.1.0")
//!         .build();
//!
//!     ServerRunner::new(server).run_stdio().await
//! }
//! ```

pub mod handlers;
pub mod prompt;
pub mod queue;
pub mod resource;
pub mod runner;
pub mod server;
pub mod session;
pub mod stdio;
pub mod tool;
pub mod transport;

pub use prompt::McpPrompt;
pub use queue::MessageQueue;
pub use resource::McpResource;
pub use runner::{RunnerConfig, ServerRunner};
pub use server::{
    McpHandler, McpNotificationHandler, McpServer, McpServerBuilder, NotificationOptions,
};
pub use session::{InitializationOptions, InitializationState, ServerSession};
pub use stdio::StdioServerTransport;
pub use tool::McpTool;
pub use transport::Transport;

// Re-export the layers below for downstream convenience
pub use quill_mcp_json_rpc as json_rpc;
pub use quill_mcp_protocol as protocol;
pub use quill_mcp_protocol::{McpError, McpResult};

use quill_mcp_json_rpc::CodecError;

/// Result type used throughout the server engine
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors surfaced by the server engine itself, as opposed to MCP domain
/// errors which become JSON-RPC error responses.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Protocol error: {0}")]
    Mcp(#[from] McpError),
}
