//! Error types for the capture pipeline.
//!
//! Each stage owns its error enum so callers can tell a fatal decode failure
//! apart from a recoverable per-message or per-chunk problem.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Capture container could not be read. Fatal for the whole file.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized capture header")]
    BadHeader,
    #[error("unsupported capture version {0}")]
    UnsupportedVersion(u16),
    #[error("capture truncated at byte {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("invalid frame at byte {offset}: {reason}")]
    InvalidFrame { offset: usize, reason: String },
    #[error("frame payload at byte {offset} is not valid JSON: {source}")]
    Payload {
        offset: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
}

/// A single message could not be flattened. Recovered by skipping the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("showname {showname:?} has no alphabetic character")]
    NoAlphabeticLabel { showname: String },
}

/// Invalid filter predicate. Raised before any store or decoder access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterSpecError {
    #[error("start {start} is later than end {end}")]
    InvertedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Failure reported by a record or blob store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no stored file named {0:?}")]
    UnknownFile(String),
    #[error("a file named {0:?} already exists")]
    NameTaken(String),
    #[error("record {order} is not storable: {reason}")]
    Unstorable { order: u64, reason: String },
    #[error("chunk {chunk} failed: {reason}")]
    ChunkFailed { chunk: usize, reason: String },
}

/// Failure of a whole ingest operation for one file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("ingest cancelled")]
    Cancelled,
    #[error("decode did not finish within {0:?}")]
    Timeout(std::time::Duration),
    #[error("decode worker panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a filter query. Queries never return partial results.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Spec(#[from] FilterSpecError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
