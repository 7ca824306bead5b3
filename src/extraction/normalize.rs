//! Field normalization.
//!
//! Turns one native message into a flat `(fields, message)` pair: header
//! attributes are copied as-is, the embedded field tree is flattened into
//! `derived_key -> value` pairs. Tree position and depth are discarded.

use serde_json::{Map, Value};

use crate::decoder::{FieldNode, NativeMessage, SUBTREE_KEY};
use crate::error::NormalizeError;

/// Attribute names lifted into typed record columns.
pub const RESERVED_KEYS: [&str; 3] = ["type_id", "timestamp", "order"];

/// Normalized view of one native message.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub fields: Map<String, Value>,
    pub message: Option<Map<String, Value>>,
}

/// Strip leading non-alphabetic noise (field index prefixes and the like)
/// from a decoder label.
///
/// ```
/// use mi2log_core::extraction::derive_key;
/// assert_eq!(derive_key("3 Message Type").unwrap(), "Message Type");
/// assert!(derive_key("123").is_err());
/// ```
pub fn derive_key(showname: &str) -> Result<&str, NormalizeError> {
    showname
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(idx, _)| &showname[idx..])
        .ok_or_else(|| NormalizeError::NoAlphabeticLabel {
            showname: showname.to_string(),
        })
}

/// Flatten a field tree depth-first in document order.
///
/// Only nodes carrying both a label and a value contribute. Later nodes
/// overwrite earlier ones that derive the same key.
pub fn flatten_tree(root: &FieldNode) -> Result<Map<String, Value>, NormalizeError> {
    let mut out = Map::new();
    collect_fields(root, &mut out)?;
    Ok(out)
}

fn collect_fields(node: &FieldNode, out: &mut Map<String, Value>) -> Result<(), NormalizeError> {
    if let (Some(showname), Some(value)) = (&node.showname, &node.value) {
        let key = derive_key(showname)?;
        out.insert(key.to_string(), Value::String(value.clone()));
    }
    for child in &node.children {
        collect_fields(child, out)?;
    }
    Ok(())
}

/// Normalize one native message.
///
/// A message without payload or without a sub-tree yields `message: None`;
/// that is a regular outcome, not an error.
pub fn normalize_message(msg: &NativeMessage) -> Result<NormalizedMessage, NormalizeError> {
    let Some(payload) = &msg.payload else {
        return Ok(NormalizedMessage {
            fields: Map::new(),
            message: None,
        });
    };

    let fields: Map<String, Value> = payload
        .attributes
        .iter()
        .filter(|(k, _)| k.as_str() != SUBTREE_KEY && !RESERVED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let message = match &payload.subtree {
        Some(tree) => Some(flatten_tree(tree)?),
        None => None,
    };

    Ok(NormalizedMessage { fields, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Payload;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn native(payload: Option<Payload>) -> NativeMessage {
        NativeMessage {
            type_id: "5G_NR_RRC_OTA_Packet".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            payload,
            frame: Bytes::new(),
        }
    }

    #[test]
    fn test_derive_key_strips_prefix() {
        assert_eq!(derive_key("3 Message Type").unwrap(), "Message Type");
        assert_eq!(derive_key("12.4: c1").unwrap(), "c1");
        assert_eq!(derive_key("Plain").unwrap(), "Plain");
        assert_eq!(derive_key("  éNB id").unwrap(), "éNB id");
    }

    #[test]
    fn test_derive_key_rejects_numeric_label() {
        assert_eq!(
            derive_key("123"),
            Err(NormalizeError::NoAlphabeticLabel {
                showname: "123".to_string()
            })
        );
        assert!(derive_key("").is_err());
    }

    #[test]
    fn test_flatten_depth_first_last_write_wins() {
        let tree = FieldNode::group(vec![
            FieldNode::field("1 rrc-TransactionIdentifier", "0")
                .with_children(vec![FieldNode::field("2 criticalExtensions", "a")]),
            FieldNode::field("3 criticalExtensions", "b"),
            FieldNode {
                showname: Some("4 label only".to_string()),
                value: None,
                children: vec![],
            },
        ]);
        let flat = flatten_tree(&tree).unwrap();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["rrc-TransactionIdentifier", "criticalExtensions"]);
        assert_eq!(flat["criticalExtensions"], json!("b"));
    }

    #[test]
    fn test_bad_label_fails_whole_tree() {
        let tree = FieldNode::group(vec![
            FieldNode::field("1 ok", "x"),
            FieldNode::field("42", "y"),
        ]);
        assert!(flatten_tree(&tree).is_err());
    }

    #[test]
    fn test_message_without_subtree() {
        let mut attrs = Map::new();
        attrs.insert("log_msg_len".to_string(), json!(40));
        attrs.insert("type_id".to_string(), json!("5G_NR_RRC_OTA_Packet"));
        let normalized = normalize_message(&native(Some(Payload::new(attrs)))).unwrap();

        assert!(normalized.message.is_none());
        assert_eq!(normalized.fields.len(), 1);
        assert_eq!(normalized.fields["log_msg_len"], json!(40));
    }

    #[test]
    fn test_message_without_payload() {
        let normalized = normalize_message(&native(None)).unwrap();
        assert!(normalized.fields.is_empty());
        assert!(normalized.message.is_none());
    }

    #[test]
    fn test_fields_keep_types() {
        let mut attrs = Map::new();
        attrs.insert("Version".to_string(), json!(7));
        attrs.insert("Physical Cell ID".to_string(), json!("301"));
        attrs.insert("Subpackets".to_string(), json!([{"id": 1}]));
        let payload = Payload::new(attrs).with_subtree(FieldNode::field("0 c1", "rrcRelease"));
        let normalized = normalize_message(&native(Some(payload))).unwrap();

        assert_eq!(normalized.fields["Version"], json!(7));
        assert_eq!(normalized.fields["Physical Cell ID"], json!("301"));
        assert_eq!(normalized.message.unwrap()["c1"], json!("rrcRelease"));
    }
}
