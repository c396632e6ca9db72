//! Client → server request frame.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Incoming request from a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSocketRequest {
    /// Client-assigned sequence number; must increase strictly per connection.
    #[serde(alias = "sequence", default)]
    pub seq: i64,
    /// Action name (e.g. `user_typing`).
    #[serde(default)]
    pub action: String,
    /// Action parameters.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Map::is_empty"
    )]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl WebSocketRequest {
    /// Build a request.
    pub fn new(seq: i64, action: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            seq,
            action: action.into(),
            data,
        }
    }

    /// Parse a text frame leniently.
    ///
    /// Frames that are not JSON objects, or whose fields have the wrong type,
    /// still yield a request: a missing or non-string `action` becomes the
    /// empty action, a missing `seq` becomes 0 and a non-object `data` becomes
    /// empty. The router then rejects it with the proper error kind instead of
    /// the connection being dropped.
    pub fn from_json(text: &str) -> Self {
        serde_json::from_str::<Value>(text)
            .map(|value| Self::from_value(&value))
            .unwrap_or_default()
    }

    /// Extract a request from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        let seq = value
            .get("seq")
            .or_else(|| value.get("sequence"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let data = value
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self { seq, action, data }
    }
}
