use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request or notification.
///
/// MCP params are always objects. A reserved `_meta` sub-map may be present
/// alongside arbitrary method-specific key/value pairs; both must round-trip
/// losslessly through decode and re-encode. `_meta` is never emitted when
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build params from an arbitrary JSON object, splitting out `_meta`.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let meta = match map.remove("_meta") {
            Some(Value::Object(m)) if !m.is_empty() => Some(m),
            _ => None,
        };
        Self { meta, other: map }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.other.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.other.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_none() && self.other.is_empty()
    }

    /// Convert to a plain JSON value (re-attaching `_meta` if present).
    pub fn to_value(&self) -> Value {
        let mut map = self.other.clone();
        if let Some(meta) = &self.meta {
            map.insert("_meta".to_string(), Value::Object(meta.clone()));
        }
        Value::Object(map)
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// A JSON-RPC request: carries an `id` and therefore demands exactly one
/// response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Get a named parameter, if params are present.
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    /// The params as a plain JSON value, for handlers that deserialize their
    /// own typed parameter struct.
    pub fn params_value(&self) -> Option<Value> {
        self.params.as_ref().map(|p| p.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new(1, "test_method");

        let json = serde_json::to_string(&request).unwrap();
        let parsed: JsonRpcRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.method, "test_method");
        assert!(parsed.params.is_none());
    }

    #[test]
    fn test_request_params_preserve_unknown_fields() {
        let raw = json!({
            "jsonrpc": "2.0",
            "id": "req1",
            "method": "tools/call",
            "params": {"name": "echo", "vendorExtension": {"x": 1}}
        });

        let parsed: JsonRpcRequest = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.get_param("name"), Some(&json!("echo")));
        assert_eq!(parsed.get_param("vendorExtension"), Some(&json!({"x": 1})));

        let re_encoded = serde_json::to_value(&parsed).unwrap();
        assert_eq!(re_encoded, raw);
    }

    #[test]
    fn test_meta_split_and_reattach() {
        let mut map = Map::new();
        map.insert("_meta".to_string(), json!({"progressToken": "t1"}));
        map.insert("name".to_string(), json!("echo"));

        let params = RequestParams::from_map(map);
        assert_eq!(params.meta.as_ref().unwrap()["progressToken"], json!("t1"));
        assert_eq!(params.get("name"), Some(&json!("echo")));
        assert_eq!(
            params.to_value(),
            json!({"name": "echo", "_meta": {"progressToken": "t1"}})
        );
    }

    #[test]
    fn test_empty_meta_not_emitted() {
        let params = RequestParams::from_map(Map::new());
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("_meta"));
    }
}
