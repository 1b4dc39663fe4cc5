//! Message envelope carried by every stream frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};

/// Reserved subscription key that matches every message kind.
pub const WILDCARD: &str = "*";

static NULL: Value = Value::Null;

/// Decoded inbound message: a `type` discriminator plus an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message discriminator (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional payload; JSON `null` decodes as `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl InboundMessage {
    /// Build a message from its parts.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Decode a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] for non-JSON input and
    /// [`DecodeError::Envelope`] when the JSON lacks a string `type`.
    pub fn decode(frame: &str) -> DecodeResult<Self> {
        serde_json::from_str(frame).map_err(DecodeError::from_frame)
    }

    /// Payload reference, or JSON `null` when the message carried none.
    #[must_use]
    pub fn data_or_null(&self) -> &Value {
        self.data.as_ref().unwrap_or(&NULL)
    }

    /// Full envelope as a JSON value, as delivered to wildcard subscribers.
    #[must_use]
    pub fn to_envelope_value(&self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        if let Some(data) = &self.data {
            map.insert("data".to_string(), data.clone());
        }
        Value::Object(map)
    }

    /// Deserialize the payload into `T`. Missing payloads decode from `null`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Payload`] when `data` does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> DecodeResult<T> {
        T::deserialize(self.data_or_null()).map_err(|source| DecodeError::Payload {
            kind: self.kind.clone(),
            source,
        })
    }
}
