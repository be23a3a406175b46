use serde::Serialize;
use serde_json::Value;

use crate::error::{CodecError, JsonRpcError};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcResponse;
use crate::JSONRPC_VERSION;

/// The four-variant JSON-RPC message union.
///
/// JSON-RPC has no discriminator field, so decoding classifies by field
/// presence, in this priority order:
///
/// 1. `error` present → [`JsonRpcError`]
/// 2. `method` and `id` present, `result` absent → [`JsonRpcRequest`]
/// 3. `method` present, `id` and `result` absent → [`JsonRpcNotification`]
/// 4. `id` and `result` present, `method` absent → [`JsonRpcResponse`]
///
/// Anything else is rejected. There is no fallback: an ambiguous payload
/// (e.g. `method` together with `result`) is an invalid request, never a
/// guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    /// Decode one JSON-RPC message from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::Parse(format!("invalid UTF-8: {}", e)))?;
        Self::decode_str(text)
    }

    /// Decode one JSON-RPC message from a string slice.
    pub fn decode_str(text: &str) -> Result<Self, CodecError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CodecError::Parse(e.to_string()))?;
        Self::from_json_value(value)
    }

    /// Classify and decode an already-parsed JSON value.
    pub fn from_json_value(value: Value) -> Result<Self, CodecError> {
        let obj = value.as_object().ok_or_else(|| {
            CodecError::InvalidRequest("message must be a JSON object".to_string())
        })?;

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            _ => {
                return Err(CodecError::InvalidRequest(
                    "jsonrpc version must be \"2.0\"".to_string(),
                ));
            }
        }

        let has_method = obj.contains_key("method");
        let has_id = obj.contains_key("id");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_error {
            let error = obj
                .get("error")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    CodecError::InvalidRequest("error must be an object".to_string())
                })?;
            if !error.contains_key("code") || !error.contains_key("message") {
                return Err(CodecError::InvalidRequest(
                    "error object must contain code and message".to_string(),
                ));
            }
            let parsed: JsonRpcError = serde_json::from_value(value)
                .map_err(|e| CodecError::InvalidRequest(e.to_string()))?;
            Ok(JsonRpcMessage::Error(parsed))
        } else if has_method && has_id && !has_result {
            let parsed: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| CodecError::InvalidRequest(e.to_string()))?;
            Ok(JsonRpcMessage::Request(parsed))
        } else if has_method && !has_id && !has_result {
            let parsed: JsonRpcNotification = serde_json::from_value(value)
                .map_err(|e| CodecError::InvalidRequest(e.to_string()))?;
            Ok(JsonRpcMessage::Notification(parsed))
        } else if has_id && has_result && !has_method {
            let parsed: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| CodecError::InvalidRequest(e.to_string()))?;
            Ok(JsonRpcMessage::Response(parsed))
        } else {
            Err(CodecError::InvalidRequest(
                "could not determine message type".to_string(),
            ))
        }
    }

    /// Encode back to the canonical JSON-RPC wire shape. Slashes are not
    /// escaped (serde_json leaves them alone).
    pub fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Parse(e.to_string()))
    }

    /// The method name, for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.method),
            JsonRpcMessage::Notification(n) => Some(&n.method),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        JsonRpcMessage::Request(request)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        JsonRpcMessage::Notification(notification)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        JsonRpcMessage::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        JsonRpcMessage::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    #[test]
    fn test_classify_request() {
        let msg = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        )
        .unwrap();
        match msg {
            JsonRpcMessage::Request(req) => {
                assert_eq!(req.id, RequestId::Number(1));
                assert_eq!(req.method, "ping");
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_notification() {
        let msg = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn test_classify_response() {
        let msg = JsonRpcMessage::decode_str(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn test_classify_error() {
        let msg = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"nope"}}"#,
        )
        .unwrap();
        match msg {
            JsonRpcMessage::Error(err) => assert_eq!(err.error.code, -32601),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_method_and_result_rejected() {
        let err = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping","result":{}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_missing_version_rejected() {
        let err = JsonRpcMessage::decode_str(r#"{"id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.code(), crate::error_codes::INVALID_REQUEST);

        let err =
            JsonRpcMessage::decode_str(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.code(), crate::error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = JsonRpcMessage::decode_str("{not json").unwrap_err();
        assert_eq!(err.code(), crate::error_codes::PARSE_ERROR);
    }

    #[test]
    fn test_error_without_code_rejected() {
        let err = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"message":"no code"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_slashes_unescaped_on_encode() {
        let msg = JsonRpcMessage::decode_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"resources/read","params":{"uri":"file:///tmp/x"}}"#,
        )
        .unwrap();
        let encoded = msg.encode().unwrap();
        assert!(encoded.contains("resources/read"));
        assert!(encoded.contains("file:///tmp/x"));
        assert!(!encoded.contains("\\/"));
    }

    #[test]
    fn test_round_trip_stability() {
        let payloads = [
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{}}}),
            json!({"jsonrpc":"2.0","method":"notifications/progress","params":{"progressToken":"t","progress":0.5,"_meta":{"x":1}}}),
            json!({"jsonrpc":"2.0","id":"a","result":{"tools":[],"extra":true}}),
            json!({"jsonrpc":"2.0","id":2,"error":{"code":-32700,"message":"Parse error","data":[1,2]}}),
        ];

        for payload in payloads {
            let decoded = JsonRpcMessage::from_json_value(payload).unwrap();
            let re_decoded =
                JsonRpcMessage::decode_str(&decoded.encode().unwrap()).unwrap();
            assert_eq!(decoded, re_decoded);
        }
    }
}
