use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Verb carried by every outbound command envelope.
pub const SEND_COMMAND_VERB: &str = "sendCommand";

/// Separator between domain and member in a method name (`Page.navigate`).
pub const METHOD_SEPARATOR: char = '.';

/// Marker substituted for an absent nested `result.result`.
pub const UNDEFINED_TYPE: &str = "undefined";

/// Outbound envelope: one command on its way to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandEnvelope {
    pub verb: String,
    pub method: String,
    pub params: Map<String, Value>,
    pub id: u64,
}

impl CommandEnvelope {
    /// Build a `sendCommand` envelope.
    pub fn new(id: u64, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            verb: SEND_COMMAND_VERB.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Inbound envelope as it arrives from the endpoint.
///
/// Every field is optional; [`InboundMessage::classify`] decides what the
/// message is. A `null` field counts as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// What an inbound message means, in routing priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// Protocol/transport-wide error; not tied to a pending command.
    Error { id: Option<u64>, error: Value },
    /// Response to a previously sent command.
    Response { id: Option<u64>, result: Value },
    /// Unsolicited event for `(domain, event)`.
    Event {
        domain: String,
        event: String,
        params: Value,
    },
    /// Neither error, result, nor a splittable method.
    Unrecognized,
}

impl InboundMessage {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self::deserialize(value)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Response message for `id`.
    pub fn response(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::default()
        }
    }

    /// Event message for `method` (e.g. `Page.loadEventFired`).
    pub fn event(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::default()
        }
    }

    /// Error message, optionally tagged with an id.
    pub fn error(id: Option<u64>, error: Value) -> Self {
        Self {
            id,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Classify: error first, then response, then event.
    pub fn classify(&self) -> MessageKind {
        if let Some(error) = &self.error {
            return MessageKind::Error {
                id: self.id,
                error: error.clone(),
            };
        }
        if let Some(result) = &self.result {
            return MessageKind::Response {
                id: self.id,
                result: normalize_result(result.clone()),
            };
        }
        match self.method.as_deref().and_then(split_method) {
            Some((domain, event)) => MessageKind::Event {
                domain: domain.to_string(),
                event: event.to_string(),
                params: self.params.clone().unwrap_or(Value::Null),
            },
            None => MessageKind::Unrecognized,
        }
    }
}

/// Split `Domain.member` on the first separator.
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    method.split_once(METHOD_SEPARATOR)
}

/// Join a domain and member into a method name.
pub fn join_method(domain: &str, member: &str) -> String {
    format!("{domain}{METHOD_SEPARATOR}{member}")
}

/// The `{ "type": "undefined" }` marker.
pub fn undefined_marker() -> Value {
    let mut marker = Map::new();
    marker.insert("type".to_string(), Value::String(UNDEFINED_TYPE.to_string()));
    Value::Object(marker)
}

/// Fill in an absent nested `result` on an object-shaped result payload.
pub fn normalize_result(result: Value) -> Value {
    match result {
        Value::Object(mut map) => {
            if !map.contains_key("result") {
                map.insert("result".to_string(), undefined_marker());
            }
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn command_envelope_serializes_expected_shape() {
        let mut params = Map::new();
        params.insert("url".to_string(), json!("http://example.com"));
        let envelope = CommandEnvelope::new(1, "Page.navigate", params);

        let value: Value = serde_json::from_slice(&envelope.to_vec().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "verb": "sendCommand",
                "method": "Page.navigate",
                "params": { "url": "http://example.com" },
                "id": 1
            })
        );
    }

    #[test]
    fn error_takes_priority_over_result() {
        let message =
            InboundMessage::from_slice(br#"{"id":3,"error":{"code":-1},"result":{}}"#).unwrap();
        assert_eq!(
            message.classify(),
            MessageKind::Error {
                id: Some(3),
                error: json!({"code": -1})
            }
        );
    }

    #[test]
    fn response_without_nested_result_is_normalized() {
        let message = InboundMessage::from_slice(br#"{"id":1,"result":{}}"#).unwrap();
        assert_eq!(
            message.classify(),
            MessageKind::Response {
                id: Some(1),
                result: json!({"result": {"type": "undefined"}})
            }
        );
    }

    #[test]
    fn response_with_nested_result_is_untouched() {
        let message =
            InboundMessage::from_slice(br#"{"id":2,"result":{"result":{"type":"number","value":4}}}"#)
                .unwrap();
        assert_eq!(
            message.classify(),
            MessageKind::Response {
                id: Some(2),
                result: json!({"result": {"type": "number", "value": 4}})
            }
        );
    }

    #[test]
    fn event_splits_on_first_separator() {
        let message = InboundMessage::event("Debugger.script.parsed", json!({"a": 1}));
        assert_eq!(
            message.classify(),
            MessageKind::Event {
                domain: "Debugger".to_string(),
                event: "script.parsed".to_string(),
                params: json!({"a": 1})
            }
        );
    }

    #[test]
    fn null_fields_count_as_absent() {
        let message = InboundMessage::from_slice(
            br#"{"error":null,"result":null,"method":"Page.frameNavigated"}"#,
        )
        .unwrap();
        assert!(matches!(
            message.classify(),
            MessageKind::Event { ref domain, ref params, .. } if domain == "Page" && params.is_null()
        ));
    }

    #[test]
    fn method_without_separator_is_unrecognized() {
        let message = InboundMessage::event("bogus", Value::Null);
        assert_eq!(message.classify(), MessageKind::Unrecognized);
        assert_eq!(InboundMessage::default().classify(), MessageKind::Unrecognized);
    }

    #[test]
    fn non_json_payload_is_rejected() {
        assert!(InboundMessage::from_slice(b"not-json").is_err());
    }

    #[test]
    fn from_value_rejects_non_integer_id() {
        assert!(InboundMessage::from_value(&json!({"id": "7", "result": {}})).is_err());
        let message = InboundMessage::from_value(&json!({"id": 7, "result": {}})).unwrap();
        assert_eq!(message.id, Some(7));
    }
}
