//! Concurrent multi-file ingest.
//!
//! Each file is decoded on its own worker thread, at most `max_workers` at a
//! time, each bounded by the configured decode timeout. A worker that misses
//! its deadline is abandoned: its cancel token is tripped and its result is
//! discarded. Commits happen on the calling thread, so an abandoned worker
//! never writes to a store.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bytes::Bytes;

use crate::config::PipelineConfig;
use crate::decoder::CaptureCodec;
use crate::error::IngestError;
use crate::logging::structured::{new_op_id, LogContext};
use crate::storage::blobs::BlobStore;
use crate::storage::records::RecordStore;
use crate::{log_error, log_info};

use super::context::CancelToken;
use super::files::{store_capture, CommitReport};
use super::ingestion::{ingest_with_cancel, IngestOutcome};

/// Per-file result of a batch, in input order.
#[derive(Debug)]
pub struct BatchItem<T> {
    pub file_name: String,
    pub result: Result<T, IngestError>,
}

/// Decode several captures concurrently.
pub fn ingest_batch(
    codec: Arc<dyn CaptureCodec>,
    files: Vec<(String, Bytes)>,
    config: &PipelineConfig,
) -> Vec<BatchItem<IngestOutcome>> {
    let timeout = config.decode_timeout();
    let mut results = Vec::with_capacity(files.len());
    let mut pending = files.into_iter().peekable();
    let batch_ctx = LogContext::new("*").with_op(&new_op_id("batch"));

    log_info!(
        batch_ctx,
        "BATCH_INGEST_START",
        files = pending.len(),
        workers = config.max_workers,
        timeout_secs = timeout.as_secs(),
    );

    while pending.peek().is_some() {
        let wave_start = Instant::now();
        let workers: Vec<_> = pending
            .by_ref()
            .take(config.max_workers.max(1))
            .map(|(file_name, raw)| spawn_worker(Arc::clone(&codec), file_name, raw))
            .collect();

        for (file_name, token, rx) in workers {
            let remaining = timeout.saturating_sub(wave_start.elapsed());
            let result = match rx.recv_timeout(remaining) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => {
                    token.cancel();
                    log_error!(
                        LogContext::new(&file_name),
                        "DECODE_TIMEOUT",
                        timeout_secs = timeout.as_secs(),
                    );
                    Err(IngestError::Timeout(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log_error!(LogContext::new(&file_name), "DECODE_WORKER_LOST");
                    Err(IngestError::WorkerPanicked)
                }
            };
            results.push(BatchItem { file_name, result });
        }
    }

    let failed = results.iter().filter(|item| item.result.is_err()).count();
    log_info!(
        batch_ctx,
        "BATCH_INGEST_COMPLETE",
        files = results.len(),
        failed = failed,
    );
    results
}

type WorkerHandle = (
    String,
    CancelToken,
    mpsc::Receiver<Result<IngestOutcome, IngestError>>,
);

fn spawn_worker(codec: Arc<dyn CaptureCodec>, file_name: String, raw: Bytes) -> WorkerHandle {
    let (tx, rx) = mpsc::channel();
    let token = CancelToken::new();
    let worker_token = token.clone();
    let worker_name = file_name.clone();

    thread::spawn(move || {
        let result = ingest_with_cancel(codec.as_ref(), &worker_name, raw, &worker_token);
        // Receiver is gone once the worker has been abandoned.
        let _ = tx.send(result);
    });

    (file_name, token, rx)
}

/// Decode concurrently, then commit each successful decode in input order.
/// A failed file does not stop the others.
pub fn ingest_and_store_batch(
    codec: Arc<dyn CaptureCodec>,
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    files: Vec<(String, Bytes)>,
    config: &PipelineConfig,
) -> Vec<BatchItem<CommitReport>> {
    ingest_batch(codec, files, config)
        .into_iter()
        .map(|item| {
            let result = item.result.and_then(|outcome| {
                store_capture(records, blobs, &outcome.capture, config).map_err(IngestError::from)
            });
            BatchItem {
                file_name: item.file_name,
                result,
            }
        })
        .collect()
}
