use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// The `result` object of a JSON-RPC response.
///
/// Method-specific result fields live in `other`; the reserved `_meta`
/// sub-map is split out and re-attached on encode. Unknown fields round-trip
/// verbatim, and `_meta` is never emitted when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResultPayload {
    /// The empty result, as returned by `ping`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let meta = match map.remove("_meta") {
            Some(Value::Object(m)) if !m.is_empty() => Some(m),
            _ => None,
        };
        Self { meta, other: map }
    }

    /// Build from an arbitrary JSON value. Objects keep their fields;
    /// anything else is wrapped under a `value` key so the payload stays an
    /// object as MCP results require.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Self::empty(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self { meta: None, other: map }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.other.get(key)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.other.clone();
        if let Some(meta) = &self.meta {
            map.insert("_meta".to_string(), Value::Object(meta.clone()));
        }
        Value::Object(map)
    }
}

impl From<Map<String, Value>> for ResultPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

/// A successful JSON-RPC response, echoing the request `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: ResultPayload,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: ResultPayload) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }

    /// A response whose result is the empty object.
    pub fn empty(id: RequestId) -> Self {
        Self::new(id, ResultPayload::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result_serializes_as_empty_object() {
        let response = JsonRpcResponse::empty(RequestId::Number(2));
        let json_str = serde_json::to_string(&response).unwrap();
        assert!(json_str.contains("\"result\":{}"));
        assert!(!json_str.contains("_meta"));
    }

    #[test]
    fn test_result_preserves_unknown_fields() {
        let raw = json!({
            "jsonrpc": "2.0",
            "id": 5,
            "result": {"tools": [], "vendorField": 3, "_meta": {"k": "v"}}
        });
        let parsed: JsonRpcResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.result.get("vendorField"), Some(&json!(3)));
        assert_eq!(parsed.result.meta.as_ref().unwrap()["k"], json!("v"));

        let re_encoded = serde_json::to_value(&parsed).unwrap();
        assert_eq!(re_encoded, raw);
    }

    #[test]
    fn test_from_value_wraps_scalars() {
        let payload = ResultPayload::from_value(json!(42));
        assert_eq!(payload.get("value"), Some(&json!(42)));

        let payload = ResultPayload::from_value(json!({"a": 1}));
        assert_eq!(payload.get("a"), Some(&json!(1)));
    }
}
