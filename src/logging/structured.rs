//! Structured logging utilities.
//!
//! Every line starts with the capture file and, when known, the id of the
//! ingest or query operation that emitted it.

use std::fmt;

use uuid::Uuid;

/// Logging context for one capture file.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub file: String,
    pub op_id: Option<String>,
}

impl LogContext {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            op_id: None,
        }
    }

    pub fn with_op(&self, op_id: &str) -> Self {
        Self {
            file: self.file.clone(),
            op_id: Some(op_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op_id {
            Some(op) => write!(f, "[file={}] [op={}]", self.file, op),
            None => write!(f, "[file={}]", self.file),
        }
    }
}

/// Short operation id, e.g. `ingest-1a2b3c4d`.
pub fn new_op_id(kind: &str) -> String {
    format!("{}-{}", kind, &Uuid::new_v4().simple().to_string()[..8])
}

/// Emit `<ctx> EVENT key=value ...` at the given `log` level.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::$level!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::log_event!(info, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::log_event!(warn, $($arg)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::log_event!(error, $($arg)+) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::log_event!(debug, $($arg)+) };
}
