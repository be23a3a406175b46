//! # JSON-RPC 2.0 Message Codec
//!
//! A pure, transport-agnostic JSON-RPC 2.0 codec for MCP servers. This crate
//! provides the four-variant message union (request, notification, response,
//! error) and the decode/encode logic, without any transport-specific code.
//!
//! JSON-RPC carries no discriminator field, so decoding classifies a payload
//! by which fields are present. The classification is strict: a payload that
//! fits none of the four shapes (or more than one, such as `method` together
//! with `result`) is rejected rather than guessed at.
//!
//! ## Features
//! - Full JSON-RPC 2.0 envelope compliance
//! - Lossless round-tripping of unknown fields under `params`/`result`
//! - Reserved `_meta` handling (never emitted when absent)
//! - Structured decode errors carrying JSON-RPC error codes

pub mod error;
pub mod message;
pub mod notification;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use error::{CodecError, ErrorObject, JsonRpcError};
pub use message::JsonRpcMessage;
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcResponse, ResultPayload};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes, plus the MCP server-specific range
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    /// MCP-specific: session not found or expired (SSE transport)
    pub const SESSION_NOT_FOUND: i64 = -32001;
}
