//! Pipeline configuration.
//!
//! Defaults match the upload path of the web front end: records are inserted
//! in chunks of 1024 and each file gets a bounded decode window.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_DECODE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_JSON_INDENT: usize = 4;

const ENV_INSERT_CHUNK_SIZE: &str = "MI2LOG_INSERT_CHUNK_SIZE";
const ENV_DECODE_TIMEOUT_SECS: &str = "MI2LOG_DECODE_TIMEOUT_SECS";
const ENV_MAX_WORKERS: &str = "MI2LOG_MAX_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records per bulk insert call.
    pub insert_chunk_size: usize,
    /// Upper bound on one file's decode, in seconds.
    pub decode_timeout_secs: u64,
    /// Files decoded in parallel by `ingest_batch`.
    pub max_workers: usize,
    /// Indent width of exported JSON.
    pub json_indent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
            decode_timeout_secs: DEFAULT_DECODE_TIMEOUT_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            json_indent: DEFAULT_JSON_INDENT,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config document. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Defaults overridden by `MI2LOG_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `MI2LOG_*` environment overrides. Unparseable values are logged
    /// and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = read_env_number(ENV_INSERT_CHUNK_SIZE) {
            self.insert_chunk_size = v as usize;
        }
        if let Some(v) = read_env_number(ENV_DECODE_TIMEOUT_SECS) {
            self.decode_timeout_secs = v;
        }
        if let Some(v) = read_env_number(ENV_MAX_WORKERS) {
            self.max_workers = v as usize;
        }
        self.sanitized()
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }

    /// Zero chunk sizes or worker counts would stall the pipeline.
    fn sanitized(mut self) -> Self {
        if self.insert_chunk_size == 0 {
            self.insert_chunk_size = DEFAULT_INSERT_CHUNK_SIZE;
        }
        if self.max_workers == 0 {
            self.max_workers = 1;
        }
        self
    }
}

fn read_env_number(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("CONFIG_ENV_IGNORED key={} value={:?} error={}", key, raw, e);
            None
        }
    }
}
