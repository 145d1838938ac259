// src/storage/file_store.rs
//! JSON-file-backed record storage.
//!
//! The whole table is rewritten on every mutation, so this suits registries
//! of thousands of credentials, not millions. A mutation only becomes visible
//! once the file write has succeeded.

use crate::models::credential::{AnchorStatus, CredentialFingerprint, CredentialRecord, RecordFilter};
use crate::storage::memory_store::RecordTable;
use crate::storage::record_store::{RecordStore, StoreError};
use crate::utils::serialization::{read_json, write_json_atomic};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable [`RecordStore`] persisted as a single JSON document.
pub struct FileRecordStore {
    path: PathBuf,
    table: Mutex<RecordTable>,
}

impl FileRecordStore {
    /// Opens the store at `path`, loading existing records if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<CredentialRecord> = read_json(&path).await?.unwrap_or_default();
        let table = RecordTable::from_records(records)?;
        info!("Loaded {} credential records from {}", table.len(), path.display());
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Applies `change` to a copy of the table, persists it, then publishes it.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut RecordTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let out = change(&mut next)?;
        write_json_atomic(&self.path, &next.snapshot()).await?;
        *table = next;
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &CredentialFingerprint,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.table.lock().await.get(fingerprint).cloned())
    }

    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.table.lock().await.get_by_student(student_id).cloned())
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        self.mutate(|t| t.insert(record)).await
    }

    async fn update_anchor_status(
        &self,
        fingerprint: &CredentialFingerprint,
        status: AnchorStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|t| t.set_anchor(fingerprint, status)).await
    }

    async fn delete(&self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, StoreError> {
        self.mutate(|t| t.remove(fingerprint)).await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<CredentialRecord>, StoreError> {
        Ok(self.table.lock().await.list(filter))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.lock().await.len())
    }
}
