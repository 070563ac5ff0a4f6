//! Wire-level events, as delivered by the service.
//!
//! Wire events are untrusted and unstable: the backend may add tags or fields
//! at any time. This type keeps the payload loose (a tag plus a raw field
//! map); interpretation happens at the mapper boundary, where unknown shapes
//! are dropped rather than rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event received while a run streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEvent {
    /// String discriminator, e.g. `run_started`, `tool_call`, `complete`.
    #[serde(rename = "type")]
    pub tag: String,
    /// Everything else on the event, untyped.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WireEvent {
    /// Build an event from a tag and a JSON object body.
    ///
    /// Non-object bodies yield an event with no fields.
    pub fn new(tag: impl Into<String>, body: Value) -> Self {
        let fields = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            tag: tag.into(),
            fields,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn value_field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A field rendered as text: strings verbatim, other values as JSON.
    pub fn text_field(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
