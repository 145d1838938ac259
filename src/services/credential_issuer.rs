// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Runs one issuance strictly in order:
//!
//! ```text
//! hash -> dedupe -> render -> persist -> anchor -> record anchor
//! ```
//!
//! Nothing is spent on the ledger until the record is durably stored, and a
//! confirmed anchor that cannot be written back is reported as a divergence
//! rather than swallowed.

use crate::blockchain::ledger_client::{AnchorFailure, AnchorOutcome, AnchorReceipt, LedgerClient};
use crate::error::{AnchorDivergence, ErrorKind, IssuanceError};
use crate::models::credential::{AnchorStatus, CredentialFields, CredentialRecord};
use crate::storage::artifact::{ArtifactStore, StagedArtifact};
use crate::storage::record_store::{RecordStore, StoreError, UniqueField};
use crate::utils::crypto::fingerprint;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Log target for anchors the store failed to record.
pub const DIVERGENCE_LOG_TARGET: &str = "anchor_divergence";

/// Terminal anchoring state of a successful issuance.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnchorState {
    /// Confirmed on the ledger and recorded in the store
    Anchored { receipt: AnchorReceipt },
    /// The ledger attempt failed; the record stands unanchored
    Failed { failure: AnchorFailure },
    /// No ledger is configured
    Skipped,
    /// Confirmed on the ledger but the store does not reflect it
    Diverged { receipt: AnchorReceipt, reason: String },
}

/// Outcome of an issuance that created a record.
#[derive(Serialize, Debug, Clone)]
pub struct IssuanceReport {
    pub record: CredentialRecord,
    pub anchoring: AnchorState,
}

impl IssuanceReport {
    /// True when the ledger holds an anchor for this credential.
    pub fn anchored_on_ledger(&self) -> bool {
        matches!(
            self.anchoring,
            AnchorState::Anchored { .. } | AnchorState::Diverged { .. }
        )
    }

    /// The non-fatal problem the caller should be told about, if any.
    pub fn warning(&self) -> Option<ErrorKind> {
        match &self.anchoring {
            AnchorState::Anchored { .. } | AnchorState::Skipped => None,
            AnchorState::Failed { failure } => Some(failure.error_kind()),
            AnchorState::Diverged { .. } => Some(ErrorKind::PartialAnchorPersistence),
        }
    }

    /// The divergence to escalate, when the anchor could not be recorded.
    pub fn divergence(&self) -> Option<AnchorDivergence> {
        match &self.anchoring {
            AnchorState::Diverged { receipt, reason } => Some(AnchorDivergence {
                record: self.record.clone(),
                receipt: receipt.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    /// One-line summary that never claims more than happened.
    pub fn summary(&self) -> String {
        match &self.anchoring {
            AnchorState::Anchored { receipt } => format!(
                "Certificate saved and stored on ledger (tx {})",
                receipt.tx_hash
            ),
            AnchorState::Failed { failure } => format!(
                "Certificate saved in database only; ledger storage failed: {}",
                failure.reason
            ),
            AnchorState::Skipped => "Certificate saved in database only (ledger not configured)".to_string(),
            AnchorState::Diverged { receipt, .. } => format!(
                "Certificate saved and stored on ledger (tx {}), but the database could not record the anchor",
                receipt.tx_hash
            ),
        }
    }
}

/// Service that issues credentials and anchors them.
#[derive(Clone)]
pub struct CredentialIssuer {
    store: Arc<dyn RecordStore>,
    ledger: Option<Arc<dyn LedgerClient>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
}

impl CredentialIssuer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Option<Arc<dyn LedgerClient>>,
        artifacts: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        Self {
            store,
            ledger,
            artifacts,
        }
    }

    /// Issues a credential from its canonical fields.
    ///
    /// # Returns
    /// A report whenever a record was created, including when anchoring
    /// failed or diverged.
    ///
    /// # Errors
    /// - `DuplicateCredential` / `DuplicateStudent` when the store already
    ///   holds the fingerprint or student, whether found by the pre-check or
    ///   by the store's uniqueness constraint
    /// - `Storage` when the record could not be rendered or persisted
    ///
    /// No record exists after an error.
    pub async fn issue(&self, fields: CredentialFields) -> Result<IssuanceReport, IssuanceError> {
        let fp = fingerprint(&fields);

        // The store's uniqueness constraint is authoritative; these lookups
        // only give an early, cheaper answer.
        if self
            .store
            .find_by_fingerprint(&fp)
            .await
            .map_err(|e| IssuanceError::Storage(e.to_string()))?
            .is_some()
        {
            return Err(IssuanceError::DuplicateCredential { fingerprint: fp });
        }
        if self
            .store
            .find_by_student_id(&fields.student_id)
            .await
            .map_err(|e| IssuanceError::Storage(e.to_string()))?
            .is_some()
        {
            return Err(IssuanceError::DuplicateStudent {
                student_id: fields.student_id,
            });
        }

        let mut record = CredentialRecord::new(fields, fp);
        let staged = match &self.artifacts {
            Some(artifacts) => {
                let staged = artifacts
                    .stage(&record)
                    .await
                    .map_err(|e| IssuanceError::Storage(e.to_string()))?;
                record.artifact_location = Some(staged.location.clone());
                Some(staged)
            }
            None => None,
        };

        if let Err(e) = self.store.insert(record.clone()).await {
            if let Some(staged) = &staged {
                self.discard_artifact(staged).await;
            }
            return Err(match e {
                StoreError::UniquenessViolation(UniqueField::Fingerprint) => {
                    IssuanceError::DuplicateCredential {
                        fingerprint: record.fingerprint,
                    }
                }
                StoreError::UniquenessViolation(UniqueField::StudentId) => {
                    IssuanceError::DuplicateStudent {
                        student_id: record.fields.student_id,
                    }
                }
                other => IssuanceError::Storage(other.to_string()),
            });
        }
        if let Some(staged) = &staged {
            self.commit_artifact(staged).await;
        }
        info!(
            "Issued credential {} for {}",
            record.fingerprint.short(),
            record.student_id()
        );

        let Some(ledger) = &self.ledger else {
            return Ok(IssuanceReport {
                record,
                anchoring: AnchorState::Skipped,
            });
        };

        let anchoring = match ledger.anchor(&record.fingerprint, record.student_id()).await {
            AnchorOutcome::Confirmed(receipt) => {
                let status = AnchorStatus {
                    anchored: true,
                    tx_hash: Some(receipt.tx_hash.clone()),
                    block_number: Some(receipt.block_number),
                };
                match self
                    .store
                    .update_anchor_status(&record.fingerprint, status.clone())
                    .await
                {
                    Ok(()) => {
                        record.anchor = status;
                        AnchorState::Anchored { receipt }
                    }
                    Err(e) => AnchorState::Diverged {
                        receipt,
                        reason: e.to_string(),
                    },
                }
            }
            AnchorOutcome::Failed(failure) => {
                warn!(
                    "Credential {} saved without ledger anchor: {}",
                    record.fingerprint.short(),
                    failure.reason
                );
                AnchorState::Failed { failure }
            }
        };

        let report = IssuanceReport { record, anchoring };
        if let Some(divergence) = report.divergence() {
            error!(
                target: DIVERGENCE_LOG_TARGET,
                "{} (student {})",
                divergence,
                divergence.record.student_id()
            );
        }
        Ok(report)
    }

    /// Publishes the artifact of a persisted record. The record stands even
    /// if this fails; its location then points at a missing file.
    async fn commit_artifact(&self, staged: &StagedArtifact) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.commit(staged).await {
                warn!("Could not publish artifact {}: {}", staged.location, e);
            }
        }
    }

    async fn discard_artifact(&self, staged: &StagedArtifact) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.discard(staged).await {
                warn!("Could not discard staged artifact {}: {}", staged.staging, e);
            }
        }
    }
}
