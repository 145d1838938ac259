// src/storage/record_store.rs
//! Record store contract.
//!
//! The store is the source of truth for uniqueness: both the fingerprint and
//! the student identifier are unique, and `insert` must reject a violation
//! atomically even when two inserts race.

use crate::models::credential::{AnchorStatus, CredentialFingerprint, CredentialRecord, RecordFilter};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Column protected by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Fingerprint,
    StudentId,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Fingerprint => f.write_str("fingerprint"),
            UniqueField::StudentId => f.write_str("student_id"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("uniqueness violation on {0}")]
    UniquenessViolation(UniqueField),

    #[error("no record with fingerprint {0}")]
    NotFound(CredentialFingerprint),

    #[error("store I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Durable keyed storage of credential records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &CredentialFingerprint,
    ) -> Result<Option<CredentialRecord>, StoreError>;

    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Inserts a new record, enforcing both uniqueness constraints.
    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError>;

    /// Replaces the anchor status of an existing record.
    async fn update_anchor_status(
        &self,
        fingerprint: &CredentialFingerprint,
        status: AnchorStatus,
    ) -> Result<(), StoreError>;

    /// Removes a record, returning it.
    async fn delete(&self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, StoreError>;

    /// Records matching `filter`, newest first.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<CredentialRecord>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list(&RecordFilter::default()).await?.len())
    }

    async fn count_anchored(&self) -> Result<usize, StoreError> {
        let all = self.list(&RecordFilter::default()).await?;
        Ok(all.iter().filter(|r| r.anchor.anchored).count())
    }
}
