// src/models/verification.rs
//! Verification result model.
//!
//! A [`VerificationReport`] places what the record store knows beside what
//! the ledger knows. It never decides between them: a record present in
//! one source and absent in the other is reported as such.

use crate::models::credential::{CredentialFingerprint, CredentialRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the record store returned for a fingerprint.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreFinding {
    Found { record: Box<CredentialRecord> },
    NotFound,
    /// The store could not be queried; distinct from `NotFound`
    Unavailable { reason: String },
}

/// What the ledger returned for a fingerprint.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerFinding {
    /// No ledger is configured for this deployment
    Disabled,
    Found {
        student_id: String,
        anchored_at: Option<DateTime<Utc>>,
    },
    NotFound,
    /// The ledger could not be reached; distinct from `NotFound`
    Unavailable { reason: String },
}

/// Side-by-side findings of both sources for one fingerprint.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub fingerprint: CredentialFingerprint,
    pub store: StoreFinding,
    pub ledger: LedgerFinding,
}

impl VerificationReport {
    pub fn store_hit(&self) -> bool {
        matches!(self.store, StoreFinding::Found { .. })
    }

    /// `Some(true|false)` when the ledger answered, `None` when it was
    /// disabled or unreachable.
    pub fn ledger_hit(&self) -> Option<bool> {
        match self.ledger {
            LedgerFinding::Found { .. } => Some(true),
            LedgerFinding::NotFound => Some(false),
            LedgerFinding::Disabled | LedgerFinding::Unavailable { .. } => None,
        }
    }

    /// True when both sources answered and disagree about existence.
    pub fn sources_disagree(&self) -> bool {
        let store_answered = !matches!(self.store, StoreFinding::Unavailable { .. });
        match self.ledger_hit() {
            Some(on_ledger) => store_answered && on_ledger != self.store_hit(),
            None => false,
        }
    }

    pub fn record(&self) -> Option<&CredentialRecord> {
        match &self.store {
            StoreFinding::Found { record } => Some(record),
            _ => None,
        }
    }
}
