//! End-to-end behaviour of ingest, store and filter over the framed codec.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map};

use mi2log_core::config::PipelineConfig;
use mi2log_core::decoder::{CaptureCodec, FieldNode, FramedCodec, FramedWriter, Payload};
use mi2log_core::error::{FilterSpecError, IngestError};
use mi2log_core::filter::{filter, filter_stored, records_to_json, FilterSpec};
use mi2log_core::pipeline::{ingest, ingest_and_store, ingest_batch, list_files};
use mi2log_core::storage::{MemoryBlobStore, MemoryRecordStore, RecordKey, RecordStore};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 14, 15, 9, 26).unwrap()
}

fn rrc_payload(i: usize) -> Payload {
    let mut attributes = Map::new();
    attributes.insert("log_msg_len".to_string(), json!(100 + i));
    Payload::new(attributes).with_subtree(FieldNode::group(vec![
        FieldNode::field("1 Physical Cell ID", &format!("{}", 300 + i)),
        FieldNode::field("2 Freq", "1850"),
    ]))
}

/// `n` messages cycling through three types, 400ms apart.
fn capture(n: usize) -> Bytes {
    let types = ["LTE_RRC_OTA_Packet", "LTE_MAC_UL_Tx_Statistics", "LTE_NAS_EMM_State"];
    let mut writer = FramedWriter::new();
    for i in 0..n {
        let payload = rrc_payload(i);
        writer
            .push(
                types[i % types.len()],
                base() + Duration::milliseconds(i as i64 * 400),
                Some(&payload),
            )
            .unwrap();
    }
    writer.finish()
}

fn decoded_keys(codec: &FramedCodec, raw: &Bytes) -> Vec<(String, DateTime<Utc>)> {
    codec
        .decode(raw)
        .unwrap()
        .map(|m| {
            let m = m.unwrap();
            (m.type_id, m.timestamp)
        })
        .collect()
}

#[test]
fn test_orders_are_zero_to_n() {
    let outcome = ingest(&FramedCodec::new(), "drive.mi2log", capture(37)).unwrap();
    let orders: Vec<u64> = outcome.capture.records.iter().map(|r| r.order).collect();
    assert_eq!(orders, (0..37).collect::<Vec<u64>>());
}

#[test]
fn test_fields_are_flattened() {
    let outcome = ingest(&FramedCodec::new(), "drive.mi2log", capture(1)).unwrap();
    let record = &outcome.capture.records[0];
    assert_eq!(record.fields.get("log_msg_len"), Some(&json!(100)));
    assert!(!record.fields.contains_key("Msg"));
    let message = record.message.as_ref().unwrap();
    assert_eq!(message.get("Physical Cell ID"), Some(&json!("300")));
    assert_eq!(message.get("Freq"), Some(&json!("1850")));
}

#[test]
fn test_reupload_replaces_records() {
    let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
    let codec = FramedCodec::new();
    let config = PipelineConfig::default();

    ingest_and_store(&codec, &records, &blobs, "drive.mi2log", capture(10), &config).unwrap();
    ingest_and_store(&codec, &records, &blobs, "drive.mi2log", capture(3), &config).unwrap();

    let keys = records.keys("drive.mi2log").unwrap();
    let orders: Vec<u64> = keys.iter().map(|k| k.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    assert_eq!(list_files(&blobs).len(), 1);
}

#[test]
fn test_full_window_reproduces_capture() {
    let raw = capture(25);
    let codec = FramedCodec::new();
    let outcome = ingest(&codec, "drive.mi2log", raw.clone()).unwrap();
    let spec = FilterSpec::covering(&outcome.capture.keys()).unwrap();

    let output = filter(&codec, &outcome.capture, &spec).unwrap();
    assert_eq!(output.records.len(), 25);
    assert_eq!(output.binary, raw);
}

#[test]
fn test_empty_window_is_valid_capture() {
    let codec = FramedCodec::new();
    let outcome = ingest(&codec, "drive.mi2log", capture(5)).unwrap();
    let spec = FilterSpec::all_types(base(), base()).unwrap();

    let output = filter(&codec, &outcome.capture, &spec).unwrap();
    assert!(output.records.is_empty());
    assert_eq!(records_to_json(&output.records, 4).unwrap(), "[]");
    assert!(decoded_keys(&codec, &output.binary).is_empty());
}

#[test]
fn test_inverted_range_rejected() {
    let err = FilterSpec::all_types(base() + Duration::seconds(1), base()).unwrap_err();
    assert!(matches!(err, FilterSpecError::InvertedRange { .. }));
}

#[test]
fn test_stored_paths_agree() {
    let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
    let codec = FramedCodec::new();
    ingest_and_store(
        &codec,
        &records,
        &blobs,
        "drive.mi2log",
        capture(30),
        &PipelineConfig {
            insert_chunk_size: 7,
            ..PipelineConfig::default()
        },
    )
    .unwrap();

    let spec = FilterSpec::new(
        ["LTE_RRC_OTA_Packet", "LTE_NAS_EMM_State"],
        base() + Duration::seconds(2),
        base() + Duration::seconds(9),
    )
    .unwrap();
    let output = filter_stored(&codec, &records, &blobs, "drive.mi2log", &spec).unwrap();

    let from_json: Vec<(String, DateTime<Utc>)> = output
        .records
        .iter()
        .map(|r| (r.type_id.clone(), r.timestamp))
        .collect();
    assert!(!from_json.is_empty());
    assert_eq!(decoded_keys(&codec, &output.binary), from_json);
    assert!(output.records.windows(2).all(|w| w[0].order < w[1].order));
}

/// Six messages one second apart; the ones at positions 1 and 4 carry a
/// label with no alphabetic character.
fn capture_with_bad_labels() -> Bytes {
    let mut writer = FramedWriter::new();
    for i in 0..6usize {
        let label = if i == 1 || i == 4 { "0.0" } else { "1 Serving Cell" };
        let payload = Payload::default()
            .with_subtree(FieldNode::group(vec![FieldNode::field(label, &i.to_string())]));
        writer
            .push("LTE_RRC_OTA_Packet", base() + Duration::seconds(i as i64), Some(&payload))
            .unwrap();
    }
    writer.finish()
}

#[test]
fn test_skipped_messages_absent_from_both_paths() {
    let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
    let codec = FramedCodec::new();
    let (outcome, _) = ingest_and_store(
        &codec,
        &records,
        &blobs,
        "drive.mi2log",
        capture_with_bad_labels(),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(outcome.skipped_count(), 2);

    let spec = FilterSpec::all_types(base(), base() + Duration::seconds(5)).unwrap();
    let in_memory = filter(&codec, &outcome.capture, &spec).unwrap();
    let stored = filter_stored(&codec, &records, &blobs, "drive.mi2log", &spec).unwrap();

    for output in [&in_memory, &stored] {
        let orders: Vec<u64> = output.records.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 2, 3]);

        let from_json: Vec<(String, DateTime<Utc>)> = output
            .records
            .iter()
            .map(|r| (r.type_id.clone(), r.timestamp))
            .collect();
        assert_eq!(decoded_keys(&codec, &output.binary), from_json);
    }
    assert_eq!(in_memory.binary, stored.binary);
}

#[test]
fn test_concurrent_files_stay_apart() {
    let codec = Arc::new(FramedCodec::new());
    let handles: Vec<_> = (0..4usize)
        .map(|i| {
            let codec = Arc::clone(&codec);
            thread::spawn(move || {
                let name = format!("file-{}.mi2log", i);
                let outcome = ingest(codec.as_ref(), &name, capture(10 + i)).unwrap();
                (name, outcome.capture)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (name, capture) = handle.join().unwrap();
        assert_eq!(capture.file_name, name);
        assert_eq!(capture.len(), 10 + i);
        let keys: Vec<RecordKey> = capture.keys();
        assert!(keys.iter().enumerate().all(|(j, k)| k.order == j as u64));
    }
}

#[test]
fn test_batch_reports_each_file() {
    let files = vec![
        ("a.mi2log".to_string(), capture(4)),
        ("broken.mi2log".to_string(), Bytes::from_static(b"XXXXXXXXXXXX")),
        ("b.mi2log".to_string(), capture(2)),
    ];
    let results = ingest_batch(Arc::new(FramedCodec::new()), files, &PipelineConfig::default());

    let names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.mi2log", "broken.mi2log", "b.mi2log"]);
    assert_eq!(results[0].result.as_ref().unwrap().capture.len(), 4);
    assert!(matches!(results[1].result, Err(IngestError::Decode(_))));
    assert_eq!(results[2].result.as_ref().unwrap().capture.len(), 2);
}
