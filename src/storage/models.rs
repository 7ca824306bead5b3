//! Persisted shapes: canonical records, per-file captures and blob metadata.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One normalized, order-stamped message as stored and queried.
///
/// Serializes as a flat document: `type_id`, `timestamp`, `order`, then the
/// header attributes, then the flattened sub-tree under `Msg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub type_id: String,
    pub timestamp: DateTime<Utc>,
    pub order: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Flattened `derived_key -> value` pairs; every value is a JSON string.
    #[serde(rename = "Msg", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Map<String, Value>>,
}

impl CanonicalRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            type_id: self.type_id.clone(),
            timestamp: self.timestamp,
            order: self.order,
        }
    }
}

/// Compound lookup key `(type_id, timestamp, order)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub type_id: String,
    pub timestamp: DateTime<Utc>,
    pub order: u64,
}

/// A decoded capture: the original bytes plus its records in `order`.
#[derive(Debug, Clone)]
pub struct FileCapture {
    pub file_name: String,
    pub raw_bytes: Bytes,
    pub records: Vec<CanonicalRecord>,
    pub digest: String,
}

impl FileCapture {
    pub fn new(file_name: &str, raw_bytes: Bytes, records: Vec<CanonicalRecord>) -> Self {
        let digest = compute_digest(&raw_bytes);
        Self {
            file_name: file_name.to_string(),
            raw_bytes,
            records,
            digest,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> Vec<RecordKey> {
        self.records.iter().map(CanonicalRecord::key).collect()
    }
}

/// Metadata kept next to each stored raw capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub file_name: String,
    pub upload_time: DateTime<Utc>,
    pub digest: String,
    pub size: usize,
}

/// SHA-256 of the capture bytes, hex encoded.
pub fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
