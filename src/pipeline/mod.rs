//! Pipeline orchestration module.
//!
//! Capture ingestion that coordinates:
//! - Container decoding
//! - Field normalization
//! - Order assignment
//! - Commits to the record and blob stores
//! - Concurrent multi-file ingest with per-file timeouts

pub mod batch;
pub mod context;
pub mod files;
pub mod ingestion;
pub mod sequencer;

pub use batch::*;
pub use context::*;
pub use files::*;
pub use ingestion::*;
pub use sequencer::*;
