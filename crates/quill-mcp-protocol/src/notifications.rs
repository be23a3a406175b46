//! Server-to-client notification payloads and their method names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logging::LoggingLevel;

/// Method names for notifications the server emits.
pub mod methods {
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const MESSAGE: &str = "notifications/message";
    pub const PROGRESS: &str = "notifications/progress";
    pub const RESOURCE_UPDATED: &str = "notifications/resources/updated";
    pub const RESOURCE_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const TOOL_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const PROMPT_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const CANCELLED: &str = "notifications/cancelled";
}

/// Parameters of a `notifications/message` log notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

/// Parameters of a `notifications/progress` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: Value,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Parameters of a `notifications/resources/updated` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_logging_message_params() {
        let params = LoggingMessageParams {
            level: LoggingLevel::Error,
            logger: None,
            data: json!("disk full"),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value, json!({"level": "error", "data": "disk full"}));
    }

    #[test]
    fn test_progress_params_camel_case() {
        let params = ProgressParams {
            progress_token: json!(7),
            progress: 0.5,
            total: Some(1.0),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["progressToken"], json!(7));
        assert_eq!(value["total"], json!(1.0));
    }
}
