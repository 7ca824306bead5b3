//! Structured logging with capture context.
//!
//! Provides logging macros and utilities that include the file name and the
//! ingest/query id in every log message for easy correlation.

pub mod structured;

pub use structured::*;
