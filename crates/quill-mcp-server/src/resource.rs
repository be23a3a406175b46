//! The resource trait servers implement to expose readable resources.

use async_trait::async_trait;

use quill_mcp_protocol::{McpResult, ReadResourceResult, Resource};

/// A readable resource addressed by URI.
///
/// `descriptor` feeds `resources/list`; `read` backs `resources/read`.
#[async_trait]
pub trait McpResource: Send + Sync {
    fn descriptor(&self) -> Resource;

    async fn read(&self) -> McpResult<ReadResourceResult>;

    fn uri(&self) -> String {
        self.descriptor().uri
    }
}
