use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a request without an `id`. Must never receive a
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Build a notification with object params.
    pub fn with_object_params(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::new(method).with_params(RequestParams::from_map(params))
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    pub fn params_value(&self) -> Option<Value> {
        self.params.as_ref().map(|p| p.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let notification = JsonRpcNotification::new("notifications/initialized");
        let json_str = serde_json::to_string(&notification).unwrap();

        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
        assert!(json_str.contains("\"method\":\"notifications/initialized\""));
    }

    #[test]
    fn test_notification_with_params() {
        let mut params = Map::new();
        params.insert("level".to_string(), json!("info"));
        params.insert("data".to_string(), json!("hello"));

        let notification =
            JsonRpcNotification::with_object_params("notifications/message", params);

        assert_eq!(notification.get_param("level"), Some(&json!("info")));
        assert_eq!(notification.get_param("data"), Some(&json!("hello")));
    }
}
