//! The tool trait servers implement to expose callable tools.

use async_trait::async_trait;
use serde_json::Value;

use quill_mcp_protocol::{CallToolResult, McpResult, Tool};

/// A callable tool.
///
/// `descriptor` feeds `tools/list`; `call` backs `tools/call`. A failing
/// call may either return `Err` (reported in-band as an `isError` result)
/// or build the error result itself.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn descriptor(&self) -> Tool;

    async fn call(&self, arguments: Option<Value>) -> McpResult<CallToolResult>;

    fn name(&self) -> String {
        self.descriptor().name
    }
}
