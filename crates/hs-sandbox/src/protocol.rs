//! Control channel wire format.
//!
//! Every frame is a JSON text message:
//!
//! ```text
//! {"kind": "request", "id": 1, "method": "parseHyperScript", "payload": "on click log 1"}
//! {"kind": "response", "id": 1, "payload": {"outputJSON": "..."}}
//! ```
//!
//! Responses are matched to requests by `id` only, never by arrival order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The one method a worker serves.
pub const PARSE_METHOD: &str = "parseHyperScript";

/// A request id. Numeric ids must be non-negative integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(id) => write!(f, "{id}"),
            MessageId::Text(id) => write!(f, "{id:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn request(id: MessageId, method: &str, payload: Value) -> Self {
        Self {
            kind: MessageKind::Request,
            id,
            method: Some(method.to_string()),
            payload,
        }
    }

    pub fn response(id: MessageId, payload: Value) -> Self {
        Self {
            kind: MessageKind::Response,
            id,
            method: None,
            payload,
        }
    }
}

/// The payload of a `parseHyperScript` response. Each variant holds a JSON
/// document serialized as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseResponse {
    #[serde(rename = "outputJSON")]
    Output(String),
    #[serde(rename = "errorJSON")]
    Error(String),
    #[serde(rename = "criticalError")]
    Critical(String),
}

impl ParseResponse {
    /// The inner document of an `outputJSON` or `errorJSON` payload.
    pub fn document(&self) -> Option<Result<Value, serde_json::Error>> {
        match self {
            ParseResponse::Output(json) | ParseResponse::Error(json) => {
                Some(serde_json::from_str(json))
            }
            ParseResponse::Critical(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // =========================================================================
    // Messages
    // =========================================================================

    #[test]
    fn test_request_shape() {
        let request = Message::request(MessageId::Number(7), PARSE_METHOD, json!("init"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"kind": "request", "id": 7, "method": "parseHyperScript", "payload": "init"})
        );
    }

    #[test]
    fn test_response_omits_method() {
        let response = Message::response(MessageId::Text("a".into()), json!({"criticalError": "x"}));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"kind": "response", "id": "a", "payload": {"criticalError": "x"}})
        );
    }

    #[test]
    fn test_decode_ids() {
        let message: Message =
            serde_json::from_str(r#"{"kind": "request", "id": 3, "method": "m"}"#).unwrap();
        assert_eq!(message.id, MessageId::Number(3));
        assert_eq!(message.payload, Value::Null);

        let message: Message =
            serde_json::from_str(r#"{"kind": "response", "id": "x-1", "payload": 1}"#).unwrap();
        assert_eq!(message.id, MessageId::Text("x-1".into()));

        assert!(serde_json::from_str::<Message>(r#"{"kind": "request", "id": 1.5}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"kind": "notify", "id": 1}"#).is_err());
    }

    // =========================================================================
    // Parse responses
    // =========================================================================

    #[test]
    fn test_parse_response_shapes() {
        assert_eq!(
            serde_json::to_value(ParseResponse::Output("{}".into())).unwrap(),
            json!({"outputJSON": "{}"})
        );
        assert_eq!(
            serde_json::to_value(ParseResponse::Error("{}".into())).unwrap(),
            json!({"errorJSON": "{}"})
        );
        let critical: ParseResponse =
            serde_json::from_value(json!({"criticalError": "boom"})).unwrap();
        assert_eq!(critical, ParseResponse::Critical("boom".into()));
        assert!(critical.document().is_none());
    }

    #[test]
    fn test_document() {
        let response = ParseResponse::Output(r#"{"tokens": []}"#.into());
        let document = response.document().unwrap().unwrap();
        assert_eq!(document, json!({"tokens": []}));
    }
}
