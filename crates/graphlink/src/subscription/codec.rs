//! Wire codec for the graphql-ws subscription protocol.
//!
//! Outbound control messages and inbound envelopes are compact JSON text.
//! Encoding and decoding are pure transforms with no socket knowledge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// A decoded protocol message.
///
/// Every inbound frame carries a `type` tag; `id` and `payload` are
/// optional. A frame without a `type` field is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The message type tag (`connection_ack`, `data`, `ka`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Correlates the message with a started subscription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Opaque JSON payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Classify this envelope by its type tag.
    pub fn message_kind(&self) -> MessageKind {
        MessageKind::from_tag(&self.kind)
    }
}

/// The closed set of inbound message types the receive loop understands.
///
/// Type tags outside the known set map to [`MessageKind::Unknown`] rather
/// than failing decode; the receive loop decides what to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Handshake acknowledged by the server.
    ConnectionAck,
    /// A subscription result.
    Data,
    /// Keep-alive, no action required.
    KeepAlive,
    /// Operation-level error.
    Error,
    /// Connection-level error.
    ConnectionError,
    /// The server rejected the subscription.
    SubscriptionFail,
    /// A type tag outside the known protocol set.
    Unknown,
}

impl MessageKind {
    /// Map a `type` tag to a variant. Unrecognized tags become `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "connection_ack" => Self::ConnectionAck,
            "data" => Self::Data,
            "ka" => Self::KeepAlive,
            "error" => Self::Error,
            "connection_error" => Self::ConnectionError,
            "subscription_fail" => Self::SubscriptionFail,
            _ => Self::Unknown,
        }
    }
}

/// Encode the fixed `connection_init` message.
pub fn encode_init() -> String {
    r#"{"type":"connection_init"}"#.to_string()
}

/// Encode a `start` message carrying the operation text.
pub fn encode_start(id: &str, query: &str) -> String {
    let envelope = Envelope {
        kind: "start".into(),
        id: Some(id.to_string()),
        payload: Some(serde_json::json!({ "query": query })),
    };
    // Serialization of a Value-bearing struct cannot fail.
    serde_json::to_string(&envelope).unwrap_or_default()
}

/// Encode a `stop` message for the given subscription id.
pub fn encode_stop(id: &str) -> String {
    let envelope = Envelope {
        kind: "stop".into(),
        id: Some(id.to_string()),
        payload: None,
    };
    serde_json::to_string(&envelope).unwrap_or_default()
}

/// Decode one logical text message into an [`Envelope`].
///
/// Fails with [`ClientError::MalformedMessage`] if the text is not valid
/// JSON or lacks a `type` field.
pub fn decode(text: &str) -> Result<Envelope> {
    serde_json::from_str(text).map_err(|e| ClientError::MalformedMessage(e.to_string()))
}
