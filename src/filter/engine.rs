//! Filter engine.
//!
//! The same [`FilterSpec`] is evaluated on two independent paths:
//! - JSON path: select stored canonical records
//! - Binary path: re-decode the source bytes with the filter and re-encode
//!   the surviving messages into a new capture
//!
//! The binary path never reads canonical records; the container bytes it
//! needs are gone from them. It applies the same admission rule as ingest,
//! so a message whose field tree cannot be normalized is absent from both
//! outputs. The two paths agree on which messages match, not on
//! intermediate representations.

use bytes::Bytes;

use crate::decoder::CaptureCodec;
use crate::error::{DecodeError, FilterError};
use crate::extraction::normalize::normalize_message;
use crate::log_info;
use crate::pipeline::context::OpContext;
use crate::storage::blobs::BlobStore;
use crate::storage::models::{CanonicalRecord, FileCapture};
use crate::storage::records::RecordStore;

use super::spec::FilterSpec;

/// Both views of one filter query.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub records: Vec<CanonicalRecord>,
    pub binary: Bytes,
}

/// JSON path over an in-memory capture. Records come back in `order`.
pub fn select_records<'a>(capture: &'a FileCapture, spec: &FilterSpec) -> Vec<&'a CanonicalRecord> {
    capture
        .records
        .iter()
        .filter(|r| spec.matches(&r.type_id, r.timestamp))
        .collect()
}

/// Binary path: filtered capture rebuilt from the original bytes.
///
/// Zero matches still produce a structurally valid, empty capture. Messages
/// that ingest would skip are left out.
pub fn extract_binary(
    codec: &dyn CaptureCodec,
    raw: &Bytes,
    spec: &FilterSpec,
) -> Result<Bytes, DecodeError> {
    let stream = codec
        .decode_with_filter(raw, spec)?
        .filter(|item| match item {
            Ok(msg) => normalize_message(msg).is_ok(),
            Err(_) => true,
        });
    codec.encode(Box::new(stream))
}

/// Run both paths against a decoded capture.
pub fn filter(
    codec: &dyn CaptureCodec,
    capture: &FileCapture,
    spec: &FilterSpec,
) -> Result<FilterOutput, FilterError> {
    let op = OpContext::query(&capture.file_name);
    let ctx = op.log_context();

    let records: Vec<CanonicalRecord> = select_records(capture, spec).into_iter().cloned().collect();
    let binary = extract_binary(codec, &capture.raw_bytes, spec)?;

    log_info!(
        ctx,
        "FILTER_COMPLETE",
        types = spec.type_ids(),
        start = spec.start(),
        end = spec.end(),
        records = records.len(),
        bytes = binary.len(),
        elapsed_ms = op.elapsed_ms(),
    );

    Ok(FilterOutput { records, binary })
}

/// Run both paths against stored state: records from the record store, raw
/// bytes from the blob store.
pub fn filter_stored(
    codec: &dyn CaptureCodec,
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    file_name: &str,
    spec: &FilterSpec,
) -> Result<FilterOutput, FilterError> {
    let op = OpContext::query(file_name);
    let ctx = op.log_context();

    let selected = records.find_range(file_name, spec)?;
    let raw = blobs.get(file_name)?;
    let binary = extract_binary(codec, &raw, spec)?;

    log_info!(
        ctx,
        "FILTER_STORED_COMPLETE",
        types = spec.type_ids(),
        records = selected.len(),
        bytes = binary.len(),
        elapsed_ms = op.elapsed_ms(),
    );

    Ok(FilterOutput {
        records: selected,
        binary,
    })
}
