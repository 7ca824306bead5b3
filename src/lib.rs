//! mi2log Core - Capture decode, normalize, filter and reconstruct pipeline
//!
//! This crate turns binary mi2log diagnostic captures into flat, ordered
//! records and answers `(type-set, time-range)` queries over them, both as
//! JSON records and as a byte-exact binary sub-capture. The implementation
//! prioritizes:
//!
//! 1. **Fidelity** - Filtered binary output is made of the original frames
//! 2. **Logging** - Every decision point logged with file and op context
//! 3. **Isolation** - Files never share state; batches decode in parallel
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `decoder` - Capture codec trait and the framed container codec
//! - `extraction` - Field tree flattening and value shaping
//! - `pipeline` - Ingest orchestration, ordering and file lifecycle
//! - `filter` - Filter predicate, query paths, export and summaries
//! - `storage` - Record and blob stores, models and query documents
//! - `config` - Pipeline configuration
//! - `logging` - Structured logging with file context
//!
//! With the `python` feature the crate also builds a PyO3 extension module
//! exposing stateless entry points to a Python orchestrator.

pub mod config;
pub mod decoder;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod storage;

#[cfg(feature = "python")]
mod python;

pub use config::PipelineConfig;
pub use decoder::{CaptureCodec, FieldNode, FramedCodec, FramedWriter, NativeMessage, Payload};
pub use error::{DecodeError, FilterError, FilterSpecError, IngestError, NormalizeError, StoreError};
pub use filter::{filter, filter_stored, FilterOutput, FilterSpec};
pub use pipeline::{ingest, ingest_and_store, ingest_batch, IngestOutcome};
pub use storage::{
    BlobStore, CanonicalRecord, FileCapture, MemoryBlobStore, MemoryRecordStore, RecordKey,
    RecordStore,
};

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
