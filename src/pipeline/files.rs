//! File lifecycle against the record and blob stores.
//!
//! Commit order is records first, blob metadata last: a file only shows up in
//! [`list_files`] once its records have been written.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::config::PipelineConfig;
use crate::decoder::CaptureCodec;
use crate::error::{IngestError, StoreError};
use crate::logging::structured::LogContext;
use crate::storage::blobs::BlobStore;
use crate::storage::models::{BlobMeta, FileCapture};
use crate::storage::records::{InsertReport, RecordStore};
use crate::{log_error, log_info, log_warn};

use super::ingestion::{ingest, IngestOutcome};

/// What a commit wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub file_name: String,
    pub blob: BlobMeta,
    pub records: InsertReport,
}

impl CommitReport {
    /// False when some chunks failed; re-ingesting the file repairs it.
    pub fn is_complete(&self) -> bool {
        self.records.is_complete()
    }
}

/// Persist a decoded capture, replacing whatever was stored under its name.
pub fn store_capture(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    capture: &FileCapture,
    config: &PipelineConfig,
) -> Result<CommitReport, StoreError> {
    let ctx = LogContext::new(&capture.file_name);

    let report = records.replace_all(
        &capture.file_name,
        &capture.records,
        config.insert_chunk_size,
    )?;
    let blob = blobs.put(&capture.file_name, capture.raw_bytes.clone())?;

    if report.is_complete() {
        log_info!(
            ctx,
            "COMMIT_COMPLETE",
            records = report.inserted,
            digest = blob.digest,
        );
    } else {
        log_warn!(
            ctx,
            "COMMIT_PARTIAL",
            inserted = report.inserted,
            attempted = report.attempted,
            failed_chunks = report.failures.len(),
        );
    }

    Ok(CommitReport {
        file_name: capture.file_name.clone(),
        blob,
        records: report,
    })
}

/// Decode, then commit. Nothing is written when the decode fails.
pub fn ingest_and_store(
    codec: &dyn CaptureCodec,
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    file_name: &str,
    raw: Bytes,
    config: &PipelineConfig,
) -> Result<(IngestOutcome, CommitReport), IngestError> {
    let outcome = ingest(codec, file_name, raw)?;
    let commit = store_capture(records, blobs, &outcome.capture, config)?;
    Ok((outcome, commit))
}

/// Remove a file's blob and records.
///
/// Either half may be missing, e.g. after a commit whose blob write failed;
/// the other half is still removed. Fails only when neither exists.
pub fn delete_file(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    file_name: &str,
) -> Result<(), StoreError> {
    let ctx = LogContext::new(file_name);
    let had_records = records.contains(file_name);
    let had_blob = match blobs.delete(file_name) {
        Ok(()) => true,
        Err(StoreError::UnknownFile(_)) => false,
        Err(e) => return Err(e),
    };
    if !had_blob && !had_records {
        return Err(StoreError::UnknownFile(file_name.to_string()));
    }
    records.drop_file(file_name)?;
    log_info!(ctx, "FILE_DELETED", records = had_records, blob = had_blob);
    Ok(())
}

/// Remove every stored file, including files present in only one store.
pub fn delete_all_files(records: &dyn RecordStore, blobs: &dyn BlobStore) -> Result<usize, StoreError> {
    let names: BTreeSet<String> = records
        .file_names()
        .into_iter()
        .chain(blobs.list().into_iter().map(|meta| meta.file_name))
        .collect();
    for name in &names {
        delete_file(records, blobs, name)?;
    }
    Ok(names.len())
}

/// Rename a file in both stores. The blob rename is undone if the records
/// cannot follow.
pub fn rename_file(
    records: &dyn RecordStore,
    blobs: &dyn BlobStore,
    old: &str,
    new: &str,
) -> Result<(), StoreError> {
    let ctx = LogContext::new(old);
    if records.contains(new) {
        return Err(StoreError::NameTaken(new.to_string()));
    }
    blobs.rename(old, new)?;
    if let Err(e) = records.rename(old, new) {
        log_error!(ctx, "RENAME_ROLLBACK", new = new, error = e.to_string());
        blobs.rename(new, old)?;
        return Err(e);
    }
    log_info!(ctx, "FILE_RENAMED", new = new);
    Ok(())
}

/// Stored files, oldest upload first.
pub fn list_files(blobs: &dyn BlobStore) -> Vec<BlobMeta> {
    blobs.list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FramedCodec, FramedWriter};
    use crate::storage::blobs::MemoryBlobStore;
    use crate::storage::records::MemoryRecordStore;
    use chrono::{Duration, TimeZone, Utc};

    fn capture(n: i64) -> Bytes {
        let base = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();
        let mut writer = FramedWriter::new();
        for i in 0..n {
            writer.push("LTE_MAC_UL_Tx_Statistics", base + Duration::seconds(i), None).unwrap();
        }
        writer.finish()
    }

    #[test]
    fn test_ingest_and_store_then_delete() {
        let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
        let config = PipelineConfig::default();
        let codec = FramedCodec::new();

        let (outcome, commit) =
            ingest_and_store(&codec, &records, &blobs, "a.mi2log", capture(4), &config).unwrap();
        assert!(commit.is_complete());
        assert_eq!(commit.blob.digest, outcome.capture.digest);
        assert_eq!(records.count("a.mi2log").unwrap(), 4);
        assert_eq!(list_files(&blobs).len(), 1);

        delete_file(&records, &blobs, "a.mi2log").unwrap();
        assert!(!records.contains("a.mi2log"));
        assert!(list_files(&blobs).is_empty());
    }

    #[test]
    fn test_failed_decode_writes_nothing() {
        let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
        let err = ingest_and_store(
            &FramedCodec::new(),
            &records,
            &blobs,
            "bad.mi2log",
            Bytes::from_static(b"garbage!"),
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
        assert!(!records.contains("bad.mi2log"));
        assert!(blobs.list().is_empty());
    }

    #[test]
    fn test_rename_both_stores() {
        let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
        let config = PipelineConfig::default();
        let codec = FramedCodec::new();
        ingest_and_store(&codec, &records, &blobs, "a.mi2log", capture(2), &config).unwrap();
        ingest_and_store(&codec, &records, &blobs, "b.mi2log", capture(1), &config).unwrap();

        assert_eq!(
            rename_file(&records, &blobs, "a.mi2log", "b.mi2log"),
            Err(StoreError::NameTaken("b.mi2log".to_string()))
        );
        rename_file(&records, &blobs, "a.mi2log", "drive.mi2log").unwrap();
        assert_eq!(records.count("drive.mi2log").unwrap(), 2);
        assert!(blobs.get("drive.mi2log").is_ok());
        assert!(blobs.get("a.mi2log").is_err());

        assert_eq!(delete_all_files(&records, &blobs).unwrap(), 2);
        assert!(records.file_names().is_empty());
    }

    #[test]
    fn test_delete_records_without_blob() {
        let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
        let outcome = ingest(&FramedCodec::new(), "half.mi2log", capture(3)).unwrap();
        records
            .replace_all("half.mi2log", &outcome.capture.records, 1024)
            .unwrap();

        delete_file(&records, &blobs, "half.mi2log").unwrap();
        assert!(!records.contains("half.mi2log"));
        assert_eq!(
            delete_file(&records, &blobs, "half.mi2log"),
            Err(StoreError::UnknownFile("half.mi2log".to_string()))
        );
    }

    #[test]
    fn test_delete_all_sweeps_either_store() {
        let (records, blobs) = (MemoryRecordStore::new(), MemoryBlobStore::new());
        let config = PipelineConfig::default();
        let codec = FramedCodec::new();
        ingest_and_store(&codec, &records, &blobs, "full.mi2log", capture(2), &config).unwrap();
        let outcome = ingest(&codec, "records_only.mi2log", capture(2)).unwrap();
        records
            .replace_all("records_only.mi2log", &outcome.capture.records, 1024)
            .unwrap();
        blobs.put("blob_only.mi2log", capture(1)).unwrap();

        assert_eq!(delete_all_files(&records, &blobs).unwrap(), 3);
        assert!(records.file_names().is_empty());
        assert!(list_files(&blobs).is_empty());
    }
}
