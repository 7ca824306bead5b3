//! Blob store collaborator for original capture bytes.
//!
//! Lifecycle is independent of the record store; the orchestrating layer
//! keeps the two consistent.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::log_debug;
use crate::logging::structured::LogContext;
use crate::storage::models::{compute_digest, BlobMeta};

pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `file`, replacing any previous blob of that name.
    fn put(&self, file: &str, bytes: Bytes) -> Result<BlobMeta, StoreError>;

    fn get(&self, file: &str) -> Result<Bytes, StoreError>;

    fn meta(&self, file: &str) -> Result<BlobMeta, StoreError>;

    fn delete(&self, file: &str) -> Result<(), StoreError>;

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError>;

    /// Every stored blob, oldest upload first.
    fn list(&self) -> Vec<BlobMeta>;
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (BlobMeta, Bytes)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, file: &str, bytes: Bytes) -> Result<BlobMeta, StoreError> {
        let meta = BlobMeta {
            file_name: file.to_string(),
            upload_time: Utc::now(),
            digest: compute_digest(&bytes),
            size: bytes.len(),
        };
        let replaced = self
            .blobs
            .write()
            .insert(file.to_string(), (meta.clone(), bytes))
            .is_some();
        log_debug!(
            LogContext::new(file),
            "BLOB_STORED",
            size = meta.size,
            replaced = replaced,
        );
        Ok(meta)
    }

    fn get(&self, file: &str) -> Result<Bytes, StoreError> {
        self.blobs
            .read()
            .get(file)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))
    }

    fn meta(&self, file: &str) -> Result<BlobMeta, StoreError> {
        self.blobs
            .read()
            .get(file)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))
    }

    fn delete(&self, file: &str) -> Result<(), StoreError> {
        self.blobs
            .write()
            .remove(file)
            .map(|_| ())
            .ok_or_else(|| StoreError::UnknownFile(file.to_string()))
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write();
        if blobs.contains_key(new) {
            return Err(StoreError::NameTaken(new.to_string()));
        }
        let (mut meta, bytes) = blobs
            .remove(old)
            .ok_or_else(|| StoreError::UnknownFile(old.to_string()))?;
        meta.file_name = new.to_string();
        blobs.insert(new.to_string(), (meta, bytes));
        Ok(())
    }

    fn list(&self) -> Vec<BlobMeta> {
        let mut metas: Vec<BlobMeta> = self.blobs.read().values().map(|(m, _)| m.clone()).collect();
        metas.sort_by(|a, b| {
            a.upload_time
                .cmp(&b.upload_time)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        metas
    }
}
