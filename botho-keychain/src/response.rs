//! Responses posted back to the page.
//!
//! The core only interprets `request_id`; everything else is opaque data for
//! the page callback.

use crate::request::CorrelationId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Response to a single keychain request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeychainResponse {
    pub request_id: CorrelationId,

    /// Anything other than `true` reads as a failure
    #[serde(default, deserialize_with = "lenient_bool")]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Non-string messages are kept in their JSON text form
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_message"
    )]
    pub message: Option<String>,

    /// Echo of the original request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Fields the core does not know about are passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeychainResponse {
    /// A successful response carrying `result`.
    pub fn success(request_id: CorrelationId, result: Value, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: true,
            error: None,
            result: Some(result),
            message: Some(message.into()),
            data: None,
            extra: Map::new(),
        }
    }

    /// A failed response carrying `error`.
    pub fn failure(request_id: CorrelationId, error: Value, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            error: Some(error),
            result: None,
            message: Some(message.into()),
            data: None,
            extra: Map::new(),
        }
    }

    /// Read a response payload whose id is already known.
    ///
    /// Never fails: a payload that is not an object yields an empty failed
    /// response for `request_id`.
    pub fn from_payload(request_id: CorrelationId, payload: Value) -> Self {
        match serde_json::from_value::<Self>(payload) {
            Ok(response) => response,
            Err(_) => Self {
                request_id,
                success: false,
                error: None,
                result: None,
                message: None,
                data: None,
                extra: Map::new(),
            },
        }
    }

    /// Attach the original request payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

fn lenient_message<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(message) => Some(message),
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_are_kept() {
        let response: KeychainResponse = serde_json::from_value(json!({
            "request_id": 3,
            "success": true,
            "result": { "id": "abc" },
            "publicKey": "BTH5xyz",
        }))
        .unwrap();

        assert_eq!(response.request_id, CorrelationId(3));
        assert!(response.success);
        assert_eq!(response.extra["publicKey"], "BTH5xyz");

        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(back["publicKey"], "BTH5xyz");
    }

    #[test]
    fn test_odd_field_shapes_still_parse() {
        let response = KeychainResponse::from_payload(
            CorrelationId(1),
            json!({ "request_id": 1, "success": null, "message": { "code": 5 } }),
        );
        assert_eq!(response.request_id, CorrelationId(1));
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some(r#"{"code":5}"#));

        let response = KeychainResponse::from_payload(
            CorrelationId(1),
            json!({ "request_id": 1, "success": true, "message": 42 }),
        );
        assert!(response.success);
        assert_eq!(response.message.as_deref(), Some("42"));
    }

    #[test]
    fn test_failure_shape() {
        let response = KeychainResponse::failure(CorrelationId(1), json!("locked"), "Keychain is locked");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "locked");
        assert!(value.get("result").is_none());
    }
}
