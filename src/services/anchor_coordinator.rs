// src/services/anchor_coordinator.rs
//! Entry point for every credential operation.
//!
//! The coordinator owns the record store, the optional ledger and the
//! optional artifact store, and hands out the issuer and verifier built on
//! them. Record management and statistics live here too.

use crate::blockchain::ledger_client::{AnchorReceipt, LedgerClient};
use crate::error::{AdminError, IssuanceError, VerificationError};
use crate::models::credential::{AnchorStatus, CredentialFields, CredentialFingerprint, CredentialRecord, RecordFilter};
use crate::models::verification::VerificationReport;
use crate::services::credential_issuer::{CredentialIssuer, IssuanceReport};
use crate::services::verifier::Verifier;
use crate::storage::artifact::ArtifactStore;
use crate::storage::record_store::{RecordStore, StoreError};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Registry-wide counters.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_records: usize,
    pub anchored_records: usize,
    /// Anchors held by the ledger, when it answered
    pub ledger_total: Option<u64>,
    pub ledger_enabled: bool,
}

/// Snapshot of the ledger connection for operators.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    pub connected: bool,
    pub account: String,
    pub contract: String,
    pub balance_eth: Option<String>,
    pub total_anchored: Option<u64>,
}

pub struct AnchorCoordinator {
    store: Arc<dyn RecordStore>,
    ledger: Option<Arc<dyn LedgerClient>>,
    issuer: CredentialIssuer,
    verifier: Verifier,
}

impl AnchorCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, ledger: Option<Arc<dyn LedgerClient>>) -> Self {
        Self::build(store, ledger, None)
    }

    /// Like [`AnchorCoordinator::new`], also rendering an artifact per issuance.
    pub fn with_artifacts(
        store: Arc<dyn RecordStore>,
        ledger: Option<Arc<dyn LedgerClient>>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self::build(store, ledger, Some(artifacts))
    }

    fn build(
        store: Arc<dyn RecordStore>,
        ledger: Option<Arc<dyn LedgerClient>>,
        artifacts: Option<Arc<dyn ArtifactStore>>,
    ) -> Self {
        Self {
            issuer: CredentialIssuer::new(store.clone(), ledger.clone(), artifacts),
            verifier: Verifier::new(store.clone(), ledger.clone()),
            store,
            ledger,
        }
    }

    pub fn ledger_enabled(&self) -> bool {
        self.ledger.is_some()
    }

    pub async fn issue(&self, fields: CredentialFields) -> Result<IssuanceReport, IssuanceError> {
        self.issuer.issue(fields).await
    }

    pub async fn verify(&self, submitted: &str) -> Result<VerificationReport, VerificationError> {
        self.verifier.verify(submitted).await
    }

    pub async fn find(&self, fingerprint: &CredentialFingerprint) -> Result<Option<CredentialRecord>, AdminError> {
        self.store.find_by_fingerprint(fingerprint).await.map_err(admin_error)
    }

    pub async fn find_by_student(&self, student_id: &str) -> Result<Option<CredentialRecord>, AdminError> {
        self.store.find_by_student_id(student_id).await.map_err(admin_error)
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<CredentialRecord>, AdminError> {
        self.store.list(filter).await.map_err(admin_error)
    }

    /// Programmes with at least one record, ascending.
    pub async fn distinct_programs(&self) -> Result<Vec<String>, AdminError> {
        let all = self.list(&RecordFilter::default()).await?;
        let programs: BTreeSet<String> = all.into_iter().map(|r| r.fields.program).collect();
        Ok(programs.into_iter().collect())
    }

    /// Graduation years with at least one record, most recent first.
    pub async fn distinct_years(&self) -> Result<Vec<String>, AdminError> {
        let all = self.list(&RecordFilter::default()).await?;
        let years: BTreeSet<String> = all.into_iter().map(|r| r.fields.graduation_year).collect();
        Ok(years.into_iter().rev().collect())
    }

    /// Removes a record from the store. Ledger anchors are permanent and
    /// stay where they are.
    pub async fn delete(&self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, AdminError> {
        let removed = self.store.delete(fingerprint).await.map_err(admin_error)?;
        info!("Deleted credential {} for {}", fingerprint.short(), removed.student_id());
        Ok(removed)
    }

    /// Writes a known anchor receipt onto its record.
    ///
    /// This is how a diverged issuance is repaired: the ledger already holds
    /// the anchor, so nothing is resubmitted.
    pub async fn record_anchor(
        &self,
        fingerprint: &CredentialFingerprint,
        receipt: &AnchorReceipt,
    ) -> Result<CredentialRecord, AdminError> {
        let status = AnchorStatus {
            anchored: true,
            tx_hash: Some(receipt.tx_hash.clone()),
            block_number: Some(receipt.block_number),
        };
        self.store
            .update_anchor_status(fingerprint, status)
            .await
            .map_err(admin_error)?;
        info!("Recorded anchor {} for {}", receipt.tx_hash, fingerprint);
        self.find(fingerprint)
            .await?
            .ok_or_else(|| AdminError::NotFound(fingerprint.clone()))
    }

    pub async fn stats(&self) -> Result<RegistryStats, AdminError> {
        let total_records = self.store.count().await.map_err(admin_error)?;
        let anchored_records = self.store.count_anchored().await.map_err(admin_error)?;
        let ledger_total = match &self.ledger {
            Some(ledger) => match ledger.total_anchored().await {
                Ok(total) => Some(total),
                Err(e) => {
                    warn!("Could not read ledger total: {}", e);
                    None
                }
            },
            None => None,
        };
        Ok(RegistryStats {
            total_records,
            anchored_records,
            ledger_total,
            ledger_enabled: self.ledger_enabled(),
        })
    }

    /// Ledger connection details, or `None` when no ledger is configured.
    pub async fn ledger_status(&self) -> Option<LedgerStatus> {
        let ledger = self.ledger.as_ref()?;
        let connected = ledger.is_connected().await;
        let (balance_eth, total_anchored) = if connected {
            (ledger.balance().await.ok(), ledger.total_anchored().await.ok())
        } else {
            (None, None)
        };
        Some(LedgerStatus {
            connected,
            account: ledger.account(),
            contract: ledger.contract(),
            balance_eth,
            total_anchored,
        })
    }
}

fn admin_error(e: StoreError) -> AdminError {
    match e {
        StoreError::NotFound(fp) => AdminError::NotFound(fp),
        other => AdminError::Storage(other.to_string()),
    }
}
