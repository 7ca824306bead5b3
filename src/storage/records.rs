//! Record store collaborator.
//!
//! Records are kept per file name. Bulk replacement deletes everything first
//! and then inserts chunk by chunk; a failing chunk is reported and the
//! remaining chunks are still attempted.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;
use crate::extraction::values::first_unstorable;
use crate::filter::spec::FilterSpec;
use crate::logging::structured::LogContext;
use crate::storage::models::{CanonicalRecord, RecordKey};
use crate::{log_error, log_info};

/// One chunk that the store refused.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    pub chunk: usize,
    /// `order` of every record in the refused chunk. Orders may have gaps
    /// where ingest skipped messages.
    pub orders: Vec<u64>,
    pub error: StoreError,
}

/// Outcome of a bulk replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertReport {
    pub attempted: usize,
    pub inserted: usize,
    pub failures: Vec<ChunkFailure>,
}

impl InsertReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.inserted == self.attempted
    }

    /// `order` values of the records that were not committed.
    pub fn missing_orders(&self) -> Vec<u64> {
        self.failures
            .iter()
            .flat_map(|f| f.orders.iter().copied())
            .collect()
    }
}

/// Per-file ordered record storage.
pub trait RecordStore: Send + Sync {
    /// Create the file's collection if it does not exist yet.
    fn ensure_file(&self, file: &str) -> Result<(), StoreError>;

    /// Insert one chunk. Returns the number of records written.
    fn insert_many(&self, file: &str, records: &[CanonicalRecord]) -> Result<usize, StoreError>;

    /// Remove every record of `file`. Unknown files delete nothing.
    fn delete_all(&self, file: &str) -> Result<usize, StoreError>;

    /// Drop the file's collection entirely.
    fn drop_file(&self, file: &str) -> Result<(), StoreError>;

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError>;

    fn contains(&self, file: &str) -> bool;

    /// Every file holding a record collection, sorted by name.
    fn file_names(&self) -> Vec<String>;

    fn count(&self, file: &str) -> Result<usize, StoreError>;

    /// Point lookup by `(type_id, timestamp)`; several records may share it.
    fn find(
        &self,
        file: &str,
        type_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>, StoreError>;

    /// Exact lookup by the compound key.
    fn find_by_key(
        &self,
        file: &str,
        key: &RecordKey,
    ) -> Result<Option<CanonicalRecord>, StoreError>;

    /// Records matching `spec`, in `order`.
    fn find_range(&self, file: &str, spec: &FilterSpec)
        -> Result<Vec<CanonicalRecord>, StoreError>;

    /// `(type_id, timestamp, order)` of every record, in `order`.
    fn keys(&self, file: &str) -> Result<Vec<RecordKey>, StoreError>;

    /// Replace the file's records: delete all, then insert in chunks.
    fn replace_all(
        &self,
        file: &str,
        records: &[CanonicalRecord],
        chunk_size: usize,
    ) -> Result<InsertReport, StoreError> {
        let ctx = LogContext::new(file);
        let removed = self.delete_all(file)?;
        self.ensure_file(file)?;

        let mut report = InsertReport {
            attempted: records.len(),
            ..InsertReport::default()
        };

        for (chunk, batch) in records.chunks(chunk_size.max(1)).enumerate() {
            match self.insert_many(file, batch) {
                Ok(n) => report.inserted += n,
                Err(error) => {
                    log_error!(
                        ctx,
                        "BATCH_INSERT_FAILED",
                        chunk = chunk,
                        records = batch.len(),
                        error = error.to_string(),
                    );
                    report.failures.push(ChunkFailure {
                        chunk,
                        orders: batch.iter().map(|r| r.order).collect(),
                        error,
                    });
                }
            }
        }

        log_info!(
            ctx,
            "RECORDS_REPLACED",
            removed = removed,
            inserted = report.inserted,
            failed_chunks = report.failures.len(),
        );
        Ok(report)
    }
}

/// In-process record store.
///
/// Mirrors the document store's limits: a chunk containing an integer wider
/// than 64 signed bits is rejected as a whole.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    files: RwLock<HashMap<String, BTreeMap<u64, CanonicalRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, file: &str, pred: F) -> Result<Vec<CanonicalRecord>, StoreError>
    where
        F: Fn(&CanonicalRecord) -> bool,
    {
        let files = self.files.read();
        let records = files
            .get(file)
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))?;
        Ok(records.values().filter(|r| pred(r)).cloned().collect())
    }
}

fn check_storable(record: &CanonicalRecord) -> Result<(), StoreError> {
    let unstorable = record
        .fields
        .iter()
        .find_map(|(k, v)| first_unstorable(v, k))
        .or_else(|| {
            record
                .message
                .as_ref()
                .and_then(|m| first_unstorable(&Value::Object(m.clone()), "Msg"))
        });
    match unstorable {
        Some(path) => Err(StoreError::Unstorable {
            order: record.order,
            reason: format!("integer at {} exceeds 64-bit range", path),
        }),
        None => Ok(()),
    }
}

impl RecordStore for MemoryRecordStore {
    fn ensure_file(&self, file: &str) -> Result<(), StoreError> {
        self.files.write().entry(file.to_string()).or_default();
        Ok(())
    }

    fn insert_many(&self, file: &str, records: &[CanonicalRecord]) -> Result<usize, StoreError> {
        for record in records {
            check_storable(record)?;
        }
        let mut files = self.files.write();
        let entry = files.entry(file.to_string()).or_default();
        for record in records {
            entry.insert(record.order, record.clone());
        }
        Ok(records.len())
    }

    fn delete_all(&self, file: &str) -> Result<usize, StoreError> {
        let mut files = self.files.write();
        Ok(files
            .get_mut(file)
            .map(|records| {
                let n = records.len();
                records.clear();
                n
            })
            .unwrap_or(0))
    }

    fn drop_file(&self, file: &str) -> Result<(), StoreError> {
        self.files.write().remove(file);
        Ok(())
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let mut files = self.files.write();
        if files.contains_key(new) {
            return Err(StoreError::NameTaken(new.to_string()));
        }
        let records = files
            .remove(old)
            .ok_or_else(|| StoreError::UnknownFile(old.to_string()))?;
        files.insert(new.to_string(), records);
        Ok(())
    }

    fn contains(&self, file: &str) -> bool {
        self.files.read().contains_key(file)
    }

    fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn count(&self, file: &str) -> Result<usize, StoreError> {
        self.files
            .read()
            .get(file)
            .map(BTreeMap::len)
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))
    }

    fn find(
        &self,
        file: &str,
        type_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>, StoreError> {
        self.select(file, |r| r.type_id == type_id && r.timestamp == timestamp)
    }

    fn find_by_key(
        &self,
        file: &str,
        key: &RecordKey,
    ) -> Result<Option<CanonicalRecord>, StoreError> {
        let files = self.files.read();
        let records = files
            .get(file)
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))?;
        Ok(records
            .get(&key.order)
            .filter(|r| r.type_id == key.type_id && r.timestamp == key.timestamp)
            .cloned())
    }

    fn find_range(
        &self,
        file: &str,
        spec: &FilterSpec,
    ) -> Result<Vec<CanonicalRecord>, StoreError> {
        self.select(file, |r| spec.matches(&r.type_id, r.timestamp))
    }

    fn keys(&self, file: &str) -> Result<Vec<RecordKey>, StoreError> {
        let files = self.files.read();
        let records = files
            .get(file)
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))?;
        Ok(records.values().map(CanonicalRecord::key).collect())
    }
}
