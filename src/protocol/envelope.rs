//! Envelope codec.
//!
//! Every message on the channel is an envelope `{ id, content }`. The id
//! correlates a request with its response; the content is either an
//! application request (`{ type, message }` at the facade layer) or a
//! response wrapper (`{ isError, payload }`).
//!
//! ```text
//! Request:  { "id": "k3j9x0aa", "content": { "type": "ping", "message": null } }
//! Response: { "id": "k3j9x0aa", "content": { "isError": false, "payload": "pong" } }
//! ```
//!
//! Content shape is not validated here. Messages without an id are not
//! envelopes and are reported as `None` so the dispatcher can ignore them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque token pairing a request with its response.
pub type CorrelationId = String;

/// Wire wrapper correlating requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id, reused verbatim by the responder.
    pub id: CorrelationId,
    /// Request or response content.
    #[serde(default)]
    pub content: Value,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(id: impl Into<CorrelationId>, content: Value) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    /// Decode a raw channel message.
    ///
    /// Returns `None` when the message carries no usable id (missing,
    /// empty, or not a string). A missing `content` decodes as `null`.
    pub fn from_value(message: Value) -> Option<Self> {
        let Value::Object(mut fields) = message else {
            return None;
        };
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => return None,
        };
        let content = fields.remove("content").unwrap_or(Value::Null);
        Some(Self { id, content })
    }

    /// Correlation id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Envelope content.
    #[inline]
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Split into id and content.
    pub fn into_parts(self) -> (CorrelationId, Value) {
        (self.id, self.content)
    }

    /// Encode as a raw channel message.
    pub fn into_value(self) -> Value {
        let mut fields = Map::with_capacity(2);
        fields.insert("id".to_string(), Value::String(self.id));
        fields.insert("content".to_string(), self.content);
        Value::Object(fields)
    }
}

/// Application request content used by the facade: `{ type, message }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Discriminator matched by `on(type, ..)` handlers.
    #[serde(rename = "type")]
    pub kind: String,
    /// Application message.
    #[serde(default)]
    pub message: Value,
}

impl Request {
    /// Create request content.
    pub fn new(kind: impl Into<String>, message: Value) -> Self {
        Self {
            kind: kind.into(),
            message,
        }
    }

    /// Read the `type` field of request content without decoding it.
    pub fn kind_of(content: &Value) -> Option<&str> {
        content.get("type").and_then(Value::as_str)
    }

    /// Take the `message` field out of request content (`null` if absent).
    pub fn take_message(mut content: Value) -> Value {
        content
            .get_mut("message")
            .map(Value::take)
            .unwrap_or(Value::Null)
    }

    /// Encode as envelope content.
    pub fn into_value(self) -> Value {
        let mut fields = Map::with_capacity(2);
        fields.insert("type".to_string(), Value::String(self.kind));
        fields.insert("message".to_string(), self.message);
        Value::Object(fields)
    }
}

/// Response content: `{ isError, payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Whether `payload` is a failure value.
    #[serde(default)]
    pub is_error: bool,
    /// Success value or failure value.
    #[serde(default)]
    pub payload: Value,
}

impl Response {
    /// Successful response.
    pub fn ok(payload: Value) -> Self {
        Self {
            is_error: false,
            payload,
        }
    }

    /// Error-flagged response.
    pub fn err(payload: Value) -> Self {
        Self {
            is_error: true,
            payload,
        }
    }

    /// Decode response content leniently.
    ///
    /// A missing or non-boolean `isError` counts as success and a missing
    /// `payload` as `null`; non-object content is a successful `null`.
    pub fn from_content(content: Value) -> Self {
        let Value::Object(mut fields) = content else {
            return Self::ok(Value::Null);
        };
        let is_error = fields
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let payload = fields.remove("payload").unwrap_or(Value::Null);
        Self { is_error, payload }
    }

    /// Whether `content` has exactly the response shape: a boolean
    /// `isError` and a `payload`, with no other fields.
    pub fn is_response(content: &Value) -> bool {
        let Value::Object(fields) = content else {
            return false;
        };
        fields.len() == 2
            && fields.get("isError").is_some_and(Value::is_boolean)
            && fields.contains_key("payload")
    }

    /// Convert into `Ok(payload)` or `Err(payload)`.
    pub fn into_result(self) -> std::result::Result<Value, Value> {
        if self.is_error {
            Err(self.payload)
        } else {
            Ok(self.payload)
        }
    }

    /// Encode as envelope content.
    pub fn into_value(self) -> Value {
        let mut fields = Map::with_capacity(2);
        fields.insert("isError".to_string(), Value::Bool(self.is_error));
        fields.insert("payload".to_string(), self.payload);
        Value::Object(fields)
    }
}

impl From<std::result::Result<Value, Value>> for Response {
    fn from(outcome: std::result::Result<Value, Value>) -> Self {
        match outcome {
            Ok(payload) => Response::ok(payload),
            Err(payload) => Response::err(payload),
        }
    }
}
