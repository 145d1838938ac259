// src/error.rs
//! Error taxonomy for issuance and verification.
//!
//! Every failure the core can surface maps to exactly one [`ErrorKind`],
//! which is what callers match on. The concrete error types carry the
//! detail for logs and responses.

use crate::blockchain::ledger_client::AnchorReceipt;
use crate::models::credential::{CredentialFingerprint, CredentialRecord};
use serde::Serialize;
use thiserror::Error;

/// Stable discriminant for every failure or warning the core reports.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DuplicateCredential,
    StorageFailure,
    LedgerDisconnected,
    LedgerInsufficientResource,
    /// Recoverable: the record stands without an anchor
    LedgerSubmissionFailure,
    /// The ledger holds an anchor the record store does not reflect
    PartialAnchorPersistence,
    MalformedVerificationQuery,
}

/// Errors that abort an issuance before anything is left in the store.
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("credential with fingerprint {fingerprint} already exists")]
    DuplicateCredential { fingerprint: CredentialFingerprint },

    #[error("a credential for student {student_id} already exists")]
    DuplicateStudent { student_id: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl IssuanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssuanceError::DuplicateCredential { .. } | IssuanceError::DuplicateStudent { .. } => {
                ErrorKind::DuplicateCredential
            }
            IssuanceError::Storage(_) => ErrorKind::StorageFailure,
        }
    }
}

/// Errors from the verification query surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed verification query: expected a 64-character hex fingerprint, got {candidate:?}")]
    Malformed { candidate: String },
}

/// Longest prefix of a rejected candidate echoed back in errors and logs.
pub const MAX_ECHOED_CANDIDATE: usize = 80;

impl VerificationError {
    /// Builds a `Malformed` error, keeping at most [`MAX_ECHOED_CANDIDATE`]
    /// characters of the submitted value.
    pub fn malformed(candidate: &str) -> Self {
        let candidate = match candidate.char_indices().nth(MAX_ECHOED_CANDIDATE) {
            Some((cut, _)) => format!("{}...", &candidate[..cut]),
            None => candidate.to_string(),
        };
        VerificationError::Malformed { candidate }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::Malformed { .. } => ErrorKind::MalformedVerificationQuery,
        }
    }
}

/// Errors from operator-facing record management.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("no credential with fingerprint {0}")]
    NotFound(CredentialFingerprint),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Raised when a confirmed anchor could not be written back to the store.
///
/// Carries everything needed to repair the record later without paying for
/// a second ledger transaction.
#[derive(Error, Debug, Clone)]
#[error("anchor {} for {} confirmed on ledger but not recorded in store: {reason}", receipt.tx_hash, record.fingerprint)]
pub struct AnchorDivergence {
    pub record: CredentialRecord,
    pub receipt: AnchorReceipt,
    pub reason: String,
}

impl AnchorDivergence {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PartialAnchorPersistence
    }
}
