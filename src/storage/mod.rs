//! Storage module.
//!
//! Persisted record shapes, the record and blob store collaborators with
//! in-process implementations, and query builders for an external document
//! database.

pub mod blobs;
pub mod models;
pub mod queries;
pub mod records;

pub use blobs::*;
pub use models::*;
pub use queries::*;
pub use records::*;
