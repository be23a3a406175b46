//! The prompt trait servers implement to expose prompt templates.

use async_trait::async_trait;
use std::collections::HashMap;

use quill_mcp_protocol::{GetPromptResult, McpResult, Prompt};

/// A named prompt template.
///
/// `descriptor` feeds `prompts/list`; `render` backs `prompts/get`.
#[async_trait]
pub trait McpPrompt: Send + Sync {
    fn descriptor(&self) -> Prompt;

    async fn render(&self, arguments: Option<HashMap<String, String>>)
        -> McpResult<GetPromptResult>;

    fn name(&self) -> String {
        self.descriptor().name
    }
}
