//! Document-store query builders.
//!
//! Builds the index, projection and filter documents an external document
//! database needs to serve the same lookups as [`RecordStore`]. Execution is
//! left to the orchestrating layer.
//!
//! [`RecordStore`]: crate::storage::RecordStore

use serde_json::{json, Value};

use crate::filter::spec::FilterSpec;
use crate::storage::models::RecordKey;

/// Collection holding one metadata document per uploaded capture.
pub const FILES_COLLECTION: &str = "mi2log";

/// Compound index on `(type_id, timestamp, order)`, all ascending.
pub fn record_index_keys() -> Vec<(&'static str, i32)> {
    vec![("type_id", 1), ("timestamp", 1), ("order", 1)]
}

/// Projection returning only the key columns.
pub fn key_projection() -> Value {
    json!({"type_id": 1, "timestamp": 1, "order": 1, "_id": 0})
}

/// Projection returning full records without the store's internal id.
pub fn record_projection() -> Value {
    json!({"_id": 0})
}

/// Sort document for the decode order.
pub fn order_sort() -> Value {
    json!({"order": 1})
}

/// Filter document for a [`FilterSpec`]. The type clause is omitted when
/// the filter selects every type.
///
/// Bounds are RFC 3339 strings; the orchestrator converts them to the
/// store's native date type before running the query.
pub fn build_filter_document(spec: &FilterSpec) -> Value {
    let mut doc = serde_json::Map::new();
    if !spec.selects_all_types() {
        doc.insert(
            "type_id".to_string(),
            json!({ "$in": spec.type_ids().iter().collect::<Vec<_>>() }),
        );
    }
    doc.insert(
        "timestamp".to_string(),
        json!({
            "$gte": spec.start().to_rfc3339(),
            "$lt": spec.end().to_rfc3339(),
        }),
    );
    Value::Object(doc)
}

/// Filter document matching exactly one record.
pub fn build_key_document(key: &RecordKey) -> Value {
    json!({
        "type_id": key.type_id,
        "timestamp": key.timestamp.to_rfc3339(),
        "order": key.order,
    })
}

/// Filter document selecting a capture's metadata entry.
pub fn build_file_document(file_name: &str) -> Value {
    json!({ "filename": file_name })
}
