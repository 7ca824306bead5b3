//! Decoder adapter.
//!
//! The capture decoder/encoder is an external collaborator reached through the
//! narrow [`CaptureCodec`] capability trait. The core only consumes
//! [`NativeMessage`] streams and hands message subsequences back for
//! re-encoding; it never looks inside a frame itself.

pub mod framed;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::filter::spec::FilterSpec;

pub use framed::{FramedCodec, FramedWriter};

/// Attribute key under which the decoder embeds the secondary field tree.
pub const SUBTREE_KEY: &str = "Msg";

/// Lazy, finite stream of decoded messages. The first `Err` ends the stream.
pub type MessageStream<'a> = Box<dyn Iterator<Item = Result<NativeMessage, DecodeError>> + 'a>;

/// One decoded protocol event, prior to normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMessage {
    pub type_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Option<Payload>,
    /// Encoded frame as it appeared in the source capture. Empty when the
    /// message was built in memory; the encoder then re-serializes it.
    pub frame: Bytes,
}

/// Opaque field payload of a native message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// Top-level header attributes (`log_msg_len`, `Subpackets`, ...).
    pub attributes: Map<String, Value>,
    /// Embedded protocol field tree, when the message type carries one.
    pub subtree: Option<FieldNode>,
}

impl Payload {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            subtree: None,
        }
    }

    pub fn with_subtree(mut self, subtree: FieldNode) -> Self {
        self.subtree = Some(subtree);
        self
    }

    /// Split a decoder JSON object into attributes and the embedded tree.
    pub fn from_json(mut attributes: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let subtree = match attributes.remove(SUBTREE_KEY) {
            Some(Value::Null) | None => None,
            Some(tree) => Some(serde_json::from_value(tree)?),
        };
        Ok(Self {
            attributes,
            subtree,
        })
    }

    /// Inverse of [`Payload::from_json`].
    pub fn to_json(&self) -> Value {
        let mut obj = self.attributes.clone();
        if let Some(tree) = &self.subtree {
            obj.insert(SUBTREE_KEY.to_string(), tree.to_value());
        }
        Value::Object(obj)
    }
}

/// Node of the embedded field tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldNode {
    pub showname: Option<String>,
    pub value: Option<String>,
    pub children: Vec<FieldNode>,
}

impl FieldNode {
    /// Leaf carrying a label and a value.
    pub fn field(showname: &str, value: &str) -> Self {
        Self {
            showname: Some(showname.to_string()),
            value: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    /// Unlabelled container node.
    pub fn group(children: Vec<FieldNode>) -> Self {
        Self {
            showname: None,
            value: None,
            children,
        }
    }

    pub fn with_children(mut self, children: Vec<FieldNode>) -> Self {
        self.children = children;
        self
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(showname) = &self.showname {
            obj.insert("showname".to_string(), Value::String(showname.clone()));
        }
        if let Some(value) = &self.value {
            obj.insert("value".to_string(), Value::String(value.clone()));
        }
        if !self.children.is_empty() {
            obj.insert(
                "children".to_string(),
                Value::Array(self.children.iter().map(FieldNode::to_value).collect()),
            );
        }
        Value::Object(obj)
    }
}

/// Capability interface of the external capture decoder/encoder.
///
/// Implementations must be restartable: decoding the same bytes twice yields
/// the same stream.
pub trait CaptureCodec: Send + Sync {
    /// Decode every message of a capture.
    fn decode(&self, raw: &Bytes) -> Result<MessageStream<'_>, DecodeError>;

    /// Decode only messages matching `spec`. Both filter paths rely on this
    /// predicate being `FilterSpec::matches`.
    fn decode_with_filter(
        &self,
        raw: &Bytes,
        spec: &FilterSpec,
    ) -> Result<MessageStream<'_>, DecodeError> {
        let spec = spec.clone();
        let stream = self.decode(raw)?;
        Ok(Box::new(stream.filter(move |item| match item {
            Ok(msg) => spec.matches(&msg.type_id, msg.timestamp),
            Err(_) => true,
        })))
    }

    /// Write a capture containing exactly `messages`, header included.
    fn encode(&self, messages: MessageStream<'_>) -> Result<Bytes, DecodeError>;
}
