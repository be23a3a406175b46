//! A minimal MCP server exposing a single `echo` tool.
//!
//! Runs over stdio by default; pass `--http [ADDR]` to serve over HTTP
//! with SSE instead.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use clap::Parser;
use serde_json::{json, Value};
use tracing::info;

use quill_http_mcp_server::{HttpMcpServer, HttpServerConfig};
use quill_mcp_protocol::{CallToolResult, McpError, McpResult, Tool, ToolSchema};
use quill_mcp_server::{McpServer, McpTool, ServerRunner};

struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn descriptor(&self) -> Tool {
        let mut properties = HashMap::new();
        properties.insert(
            "text".to_string(),
            json!({"type": "string", "description": "Text to echo back"}),
        );
        Tool::new(
            "echo",
            ToolSchema::object()
                .with_properties(properties)
                .with_required(vec!["text".to_string()]),
        )
        .with_description("Echoes the given text back to the caller")
    }

    async fn call(&self, arguments: Option<Value>) -> McpResult<CallToolResult> {
        let text = arguments
            .as_ref()
            .and_then(|args| args.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::missing_param("text"))?;
        Ok(CallToolResult::from_text(text))
    }
}

#[derive(Parser)]
#[command(name = "echo-server", about = "MCP echo server over stdio or HTTP/SSE")]
struct Args {
    /// Serve over HTTP with SSE on the given address instead of stdio
    #[arg(
        long,
        value_name = "ADDR",
        num_args = 0..=1,
        default_missing_value = "127.0.0.1:8080"
    )]
    http: Option<SocketAddr>,
}

fn build_server() -> McpServer {
    McpServer::builder()
        .name("echo-server")
        .version(env!("CARGO_PKG_VERSION"))
        .instructions("Call the echo tool with a text argument.")
        .tool(EchoTool)
        .with_logging()
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr; stdout belongs to the protocol in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.http {
        Some(address) => {
            let config = HttpServerConfig {
                bind_address: address,
                ..Default::default()
            };
            info!(address = %config.bind_address, "serving over HTTP/SSE");
            HttpMcpServer::new(build_server())
                .with_config(config)
                .run()
                .await?;
        }
        None => {
            info!("serving over stdio");
            ServerRunner::new(build_server()).run_stdio().await?;
        }
    }
    Ok(())
}
