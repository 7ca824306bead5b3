//! Operation context management.
//!
//! Every ingest or query gets a short id so its log lines can be correlated,
//! plus a cancellation token the caller may trip at any point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::logging::structured::{new_op_id, LogContext};

/// Context for one ingest or query against a single file.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub op_id: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
}

impl OpContext {
    pub fn ingest(file_name: &str) -> Self {
        Self::new("ingest", file_name)
    }

    pub fn query(file_name: &str) -> Self {
        Self::new("query", file_name)
    }

    fn new(kind: &str, file_name: &str) -> Self {
        Self {
            op_id: new_op_id(kind),
            file_name: file_name.to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.file_name).with_op(&self.op_id)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

/// Cooperative cancellation flag, checked between messages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
