// src/services/verifier.rs
//! Credential verification service.
//!
//! Looks a fingerprint up in the record store and on the ledger and reports
//! both findings side by side. Input that is not fingerprint-shaped is
//! rejected before either source is queried.

use crate::blockchain::ledger_client::{LedgerClient, LedgerVerification};
use crate::error::VerificationError;
use crate::models::credential::CredentialFingerprint;
use crate::models::verification::{LedgerFinding, StoreFinding, VerificationReport};
use crate::storage::record_store::RecordStore;
use log::{debug, warn};
use std::sync::Arc;
use url::Url;

/// Query parameter carrying the fingerprint in certificate verification URLs.
const HASH_PARAM: &str = "hash";

/// Pulls a fingerprint out of a bare value or a verification URL.
///
/// Accepts `baf3...` as well as `https://host/verify?hash=baf3...&x=1`.
/// For URLs only the `hash` query parameter is read. Upper-case hex is
/// accepted and normalised.
pub fn extract_fingerprint(submitted: &str) -> Result<CredentialFingerprint, VerificationError> {
    let submitted = submitted.trim();
    let candidate = match Url::parse(submitted) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == HASH_PARAM)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default(),
        Err(_) => submitted.to_string(),
    };
    CredentialFingerprint::parse(&candidate).ok_or_else(|| VerificationError::malformed(&candidate))
}

pub struct Verifier {
    store: Arc<dyn RecordStore>,
    ledger: Option<Arc<dyn LedgerClient>>,
}

impl Verifier {
    pub fn new(store: Arc<dyn RecordStore>, ledger: Option<Arc<dyn LedgerClient>>) -> Self {
        Self { store, ledger }
    }

    /// Verifies a submitted fingerprint candidate.
    ///
    /// # Errors
    /// `Malformed` when the candidate is not a fingerprint. Source failures
    /// are not errors; they appear as `Unavailable` findings in the report.
    pub async fn verify(&self, submitted: &str) -> Result<VerificationReport, VerificationError> {
        let fingerprint = extract_fingerprint(submitted)?;
        Ok(self.verify_fingerprint(fingerprint).await)
    }

    /// Queries both sources concurrently for an already-validated fingerprint.
    pub async fn verify_fingerprint(&self, fingerprint: CredentialFingerprint) -> VerificationReport {
        let (store, ledger) = tokio::join!(self.lookup_store(&fingerprint), self.lookup_ledger(&fingerprint));

        let report = VerificationReport {
            fingerprint,
            store,
            ledger,
        };
        if report.sources_disagree() {
            warn!(
                "Sources disagree on {}: store hit = {}, ledger hit = {:?}",
                report.fingerprint,
                report.store_hit(),
                report.ledger_hit()
            );
        } else {
            debug!("Verified {}", report.fingerprint.short());
        }
        report
    }

    async fn lookup_store(&self, fingerprint: &CredentialFingerprint) -> StoreFinding {
        match self.store.find_by_fingerprint(fingerprint).await {
            Ok(Some(record)) => StoreFinding::Found {
                record: Box::new(record),
            },
            Ok(None) => StoreFinding::NotFound,
            Err(e) => {
                warn!("Record store lookup failed for {}: {}", fingerprint.short(), e);
                StoreFinding::Unavailable { reason: e.to_string() }
            }
        }
    }

    async fn lookup_ledger(&self, fingerprint: &CredentialFingerprint) -> LedgerFinding {
        let Some(ledger) = &self.ledger else {
            return LedgerFinding::Disabled;
        };
        match ledger.verify(fingerprint).await {
            LedgerVerification::Found {
                student_id,
                anchored_at,
            } => LedgerFinding::Found {
                student_id,
                anchored_at,
            },
            LedgerVerification::NotFound => LedgerFinding::NotFound,
            LedgerVerification::Unreachable { reason } => LedgerFinding::Unavailable { reason },
        }
    }
}
