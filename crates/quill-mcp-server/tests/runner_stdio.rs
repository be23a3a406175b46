//! End-to-end test: a client talking newline-delimited JSON-RPC to the
//! runner over an in-memory pipe.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use quill_mcp_server::protocol::{CallToolResult, McpResult, Tool, ToolSchema};
use quill_mcp_server::{McpServer, McpTool, RunnerConfig, ServerRunner, StdioServerTransport};

struct ShoutTool;

#[async_trait]
impl McpTool for ShoutTool {
    fn descriptor(&self) -> Tool {
        Tool::new("shout", ToolSchema::object())
    }

    async fn call(&self, arguments: Option<Value>) -> McpResult<CallToolResult> {
        let text = arguments
            .as_ref()
            .and_then(|args| args.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("");
        Ok(CallToolResult::from_text(text.to_uppercase()))
    }
}

struct Client {
    reader: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    writer: tokio::io::WriteHalf<tokio::io::DuplexStream>,
}

impl Client {
    async fn send(&mut self, message: Value) {
        self.writer
            .write_all(format!("{message}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }
}

fn start_server() -> (Client, tokio_util::sync::CancellationToken, tokio::task::JoinHandle<quill_mcp_server::Result<()>>) {
    let server = McpServer::builder()
        .name("runner-test")
        .version("0.0.1")
        .tool(ShoutTool)
        .build();
    let runner = ServerRunner::with_config(
        server,
        RunnerConfig {
            pop_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    let token = runner.shutdown_token();

    let (client_io, server_io) = tokio::io::duplex(8192);
    let (read_half, write_half) = tokio::io::split(server_io);
    let transport = StdioServerTransport::with_streams(read_half, write_half);
    let handle = tokio::spawn(runner.run(transport));

    let (client_read, client_write) = tokio::io::split(client_io);
    let client = Client {
        reader: BufReader::new(client_read),
        writer: client_write,
    };
    (client, token, handle)
}

#[tokio::test]
async fn full_conversation_over_stdio() {
    let (mut client, token, handle) = start_server();

    client
        .send(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "pipe-client", "version": "1.0.0"}
            }
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["id"], json!(1));
    assert_eq!(reply["result"]["serverInfo"]["name"], json!("runner-test"));

    client
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;

    client
        .send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": 2, "result": {}}));

    client
        .send(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["result"]["tools"][0]["name"], json!("shout"));

    client
        .send(json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "shout", "arguments": {"text": "quiet"}}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["result"]["content"][0]["text"], json!("QUIET"));

    token.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runner did not stop")
        .expect("runner panicked")
        .expect("runner failed");
}

#[tokio::test]
async fn malformed_line_gets_parse_error_and_connection_survives() {
    let (mut client, token, handle) = start_server();

    client
        .writer
        .write_all(b"this is not json\n")
        .await
        .unwrap();
    let reply = client.recv().await;
    assert_eq!(reply["error"]["code"], json!(-32700));
    assert_eq!(reply["id"], json!(null));

    // Still able to initialize afterwards
    client
        .send(json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"capabilities": {}}
        }))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["result"]["protocolVersion"], json!("2024-11-05"));

    token.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runner did not stop")
        .expect("runner panicked")
        .expect("runner failed");
}

#[tokio::test]
async fn client_disconnect_shuts_the_runner_down() {
    let (client, _token, handle) = start_server();
    drop(client);

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runner did not notice EOF")
        .expect("runner panicked");
    assert!(result.is_ok());
}
