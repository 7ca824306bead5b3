//! JSON rendering of filtered records.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::storage::models::CanonicalRecord;

/// Records as a pretty-printed JSON array. No records renders `[]`.
pub fn records_to_json(records: &[CanonicalRecord], indent: usize) -> Result<String, serde_json::Error> {
    to_pretty(records, indent)
}

/// A single selected record as a JSON object.
pub fn record_to_json(record: &CanonicalRecord, indent: usize) -> Result<String, serde_json::Error> {
    to_pretty(record, indent)
}

/// Download form of a filter result: a lone record renders as an object,
/// anything else as an array.
pub fn selection_to_json(records: &[CanonicalRecord], indent: usize) -> Result<String, serde_json::Error> {
    match records {
        [only] => record_to_json(only, indent),
        _ => records_to_json(records, indent),
    }
}

fn to_pretty<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String, serde_json::Error> {
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    fn record(order: u64) -> CanonicalRecord {
        let mut message = Map::new();
        message.insert("c1".to_string(), json!("rrcConnectionRelease"));
        CanonicalRecord {
            type_id: "LTE_RRC_OTA_Packet".to_string(),
            timestamp: Utc.with_ymd_and_hms(2020, 11, 15, 18, 16, 37).unwrap()
                + chrono::Duration::microseconds(125),
            order,
            fields: Map::new(),
            message: Some(message),
        }
    }

    #[test]
    fn test_empty_is_array() {
        assert_eq!(records_to_json(&[], 4).unwrap(), "[]");
        assert_eq!(selection_to_json(&[], 4).unwrap(), "[]");
    }

    #[test]
    fn test_array_with_indent() {
        let text = records_to_json(&[record(0), record(1)], 4).unwrap();
        assert!(text.starts_with("[\n    {\n        \"type_id\""));

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[1]["order"], json!(1));
        assert_eq!(parsed[0]["timestamp"], json!("2020-11-15T18:16:37.000125Z"));
        assert_eq!(parsed[0]["Msg"]["c1"], json!("rrcConnectionRelease"));
    }

    #[test]
    fn test_single_record_is_object() {
        let text = record_to_json(&record(7), 2).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert!(parsed.is_object());
        assert_eq!(parsed["order"], json!(7));
    }

    #[test]
    fn test_selection_shape_follows_count() {
        let one: Value = serde_json::from_str(&selection_to_json(&[record(3)], 4).unwrap()).unwrap();
        assert_eq!(one["order"], json!(3));

        let two: Value =
            serde_json::from_str(&selection_to_json(&[record(3), record(4)], 4).unwrap()).unwrap();
        assert_eq!(two.as_array().map(Vec::len), Some(2));
    }
}
