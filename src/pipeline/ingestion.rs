//! Capture ingestion.
//!
//! Coordinates one decode pass over a capture:
//! 1. Decode the container into native messages
//! 2. Normalize each message (skip and count the ones that fail)
//! 3. Stamp `order` and build canonical records
//! 4. Wrap records and raw bytes into a `FileCapture`
//!
//! A decode error aborts the whole file; nothing partial is returned.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::decoder::CaptureCodec;
use crate::error::{IngestError, NormalizeError};
use crate::extraction::normalize::normalize_message;
use crate::storage::models::FileCapture;
use crate::{log_error, log_info, log_warn};

use super::context::{CancelToken, OpContext};
use super::sequencer::Sequencer;

/// A message dropped because its field tree could not be flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMessage {
    /// Position in the decode stream; no record carries this `order`.
    pub position: u64,
    pub type_id: String,
    pub timestamp: DateTime<Utc>,
    pub error: NormalizeError,
}

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub capture: FileCapture,
    pub skipped: Vec<SkippedMessage>,
}

impl IngestOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Decode and normalize a whole capture.
pub fn ingest(
    codec: &dyn CaptureCodec,
    file_name: &str,
    raw: Bytes,
) -> Result<IngestOutcome, IngestError> {
    ingest_with_cancel(codec, file_name, raw, &CancelToken::new())
}

/// [`ingest`], stopping early once `cancel` is tripped.
pub fn ingest_with_cancel(
    codec: &dyn CaptureCodec,
    file_name: &str,
    raw: Bytes,
    cancel: &CancelToken,
) -> Result<IngestOutcome, IngestError> {
    let op = OpContext::ingest(file_name);
    let ctx = op.log_context();

    log_info!(ctx, "INGEST_START", bytes = raw.len());

    let stream = codec.decode(&raw).map_err(|e| {
        log_error!(ctx, "DECODE_FAILED", stage = "header", error = e.to_string());
        e
    })?;

    let mut sequencer = Sequencer::new();
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (position, item) in stream.enumerate() {
        if cancel.is_cancelled() {
            log_warn!(ctx, "INGEST_CANCELLED", position = position);
            return Err(IngestError::Cancelled);
        }

        let msg = item.map_err(|e| {
            log_error!(ctx, "DECODE_FAILED", position = position, error = e.to_string());
            e
        })?;

        match normalize_message(&msg) {
            Ok(normalized) => records.push(sequencer.sequence(msg, normalized)),
            Err(error) => {
                let position = sequencer.skip();
                log_warn!(
                    ctx,
                    "MESSAGE_SKIPPED",
                    position = position,
                    type_id = msg.type_id,
                    error = error.to_string(),
                );
                skipped.push(SkippedMessage {
                    position,
                    type_id: msg.type_id,
                    timestamp: msg.timestamp,
                    error,
                });
            }
        }
    }

    let capture = FileCapture::new(file_name, raw, records);

    log_info!(
        ctx,
        "INGEST_COMPLETE",
        records = capture.len(),
        skipped = skipped.len(),
        elapsed_ms = op.elapsed_ms(),
    );

    Ok(IngestOutcome { capture, skipped })
}
