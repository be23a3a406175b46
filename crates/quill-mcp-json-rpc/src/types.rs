use serde::{Deserialize, Serialize};
use std::fmt;

/// The `jsonrpc` version marker. Serializes as the literal string `"2.0"`;
/// any other value fails deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonRpcVersion {
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("2.0")
    }
}

/// A JSON-RPC request id: a string or an integer, unique per in-flight call
/// on a given connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_round_trip() {
        let json = serde_json::to_string(&JsonRpcVersion::V2_0).unwrap();
        assert_eq!(json, "\"2.0\"");
        let parsed: JsonRpcVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JsonRpcVersion::V2_0);
    }

    #[test]
    fn test_version_rejects_other_values() {
        assert!(serde_json::from_str::<JsonRpcVersion>("\"1.0\"").is_err());
        assert!(serde_json::from_str::<JsonRpcVersion>("\"2.1\"").is_err());
    }

    #[test]
    fn test_request_id_untagged() {
        let num: RequestId = serde_json::from_str("7").unwrap();
        assert_eq!(num, RequestId::Number(7));

        let s: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(s, RequestId::String("abc".to_string()));

        assert_eq!(serde_json::to_string(&num).unwrap(), "7");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"abc\"");
    }
}
