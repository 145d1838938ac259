// src/storage/memory_store.rs
//! In-memory record storage.
//!
//! [`RecordTable`] holds the indexes and enforces uniqueness; it is shared
//! with the file-backed store. [`MemoryRecordStore`] puts a table behind a
//! mutex for single-process deployments and tests.

use crate::models::credential::{AnchorStatus, CredentialFingerprint, CredentialRecord, RecordFilter};
use crate::storage::record_store::{RecordStore, StoreError, UniqueField};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Records indexed by fingerprint and student identifier.
///
/// Every record carries an insertion sequence number so listings can be
/// returned newest-first.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordTable {
    records: HashMap<CredentialFingerprint, (u64, CredentialRecord)>,
    by_student: HashMap<String, CredentialFingerprint>,
    next_seq: u64,
}

impl RecordTable {
    /// Rebuilds a table from a snapshot in insertion order.
    pub(crate) fn from_records(records: Vec<CredentialRecord>) -> Result<Self, StoreError> {
        let mut table = Self::default();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    pub(crate) fn get(&self, fingerprint: &CredentialFingerprint) -> Option<&CredentialRecord> {
        self.records.get(fingerprint).map(|(_, r)| r)
    }

    pub(crate) fn get_by_student(&self, student_id: &str) -> Option<&CredentialRecord> {
        self.by_student.get(student_id).and_then(|fp| self.get(fp))
    }

    pub(crate) fn insert(&mut self, record: CredentialRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.fingerprint) {
            return Err(StoreError::UniquenessViolation(UniqueField::Fingerprint));
        }
        if self.by_student.contains_key(record.student_id()) {
            return Err(StoreError::UniquenessViolation(UniqueField::StudentId));
        }
        self.by_student
            .insert(record.student_id().to_string(), record.fingerprint.clone());
        self.records
            .insert(record.fingerprint.clone(), (self.next_seq, record));
        self.next_seq += 1;
        Ok(())
    }

    pub(crate) fn set_anchor(
        &mut self,
        fingerprint: &CredentialFingerprint,
        status: AnchorStatus,
    ) -> Result<(), StoreError> {
        let (_, record) = self
            .records
            .get_mut(fingerprint)
            .ok_or_else(|| StoreError::NotFound(fingerprint.clone()))?;
        record.anchor = status;
        Ok(())
    }

    pub(crate) fn remove(&mut self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, StoreError> {
        let (_, record) = self
            .records
            .remove(fingerprint)
            .ok_or_else(|| StoreError::NotFound(fingerprint.clone()))?;
        self.by_student.remove(record.student_id());
        Ok(record)
    }

    /// Matching records, newest first.
    pub(crate) fn list(&self, filter: &RecordFilter) -> Vec<CredentialRecord> {
        let mut rows: Vec<&(u64, CredentialRecord)> = self
            .records
            .values()
            .filter(|(_, r)| filter.matches(r))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// All records, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<CredentialRecord> {
        let mut all = self.list(&RecordFilter::default());
        all.reverse();
        all
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Thread-safe in-memory [`RecordStore`].
///
/// Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    table: Mutex<RecordTable>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, RecordTable>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Io("record table lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &CredentialFingerprint,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.table()?.get(fingerprint).cloned())
    }

    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.table()?.get_by_student(student_id).cloned())
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        self.table()?.insert(record)
    }

    async fn update_anchor_status(
        &self,
        fingerprint: &CredentialFingerprint,
        status: AnchorStatus,
    ) -> Result<(), StoreError> {
        self.table()?.set_anchor(fingerprint, status)
    }

    async fn delete(&self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, StoreError> {
        self.table()?.remove(fingerprint)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<CredentialRecord>, StoreError> {
        Ok(self.table()?.list(filter))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table()?.len())
    }
}
