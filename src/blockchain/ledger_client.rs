// src/blockchain/ledger_client.rs
//! Ledger capability used by the anchoring services.
//!
//! Implementations never let a transport or contract error escape
//! [`LedgerClient::anchor`] or [`LedgerClient::verify`]: both return a
//! discriminated outcome instead, so callers cannot accidentally treat an
//! unreachable ledger as a missing anchor.

use crate::error::ErrorKind;
use crate::models::credential::CredentialFingerprint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proof that an anchor transaction settled successfully.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnchorReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    /// Gas consumed by the transaction
    #[serde(default)]
    pub cost: u64,
}

/// Why an anchor attempt did not produce a receipt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnchorFailureKind {
    Disconnected,
    InsufficientFunds,
    /// Submitted and mined, but the contract call reverted
    Reverted,
    /// Estimation, signing, submission or confirmation failed
    Submission,
}

/// A failed anchor attempt.
///
/// `tx_hash` is set whenever the transaction reached the ledger, in which
/// case its fee was spent even though nothing was anchored.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AnchorFailure {
    pub kind: AnchorFailureKind,
    pub reason: String,
    pub tx_hash: Option<String>,
}

impl AnchorFailure {
    pub fn error_kind(&self) -> ErrorKind {
        match self.kind {
            AnchorFailureKind::Disconnected => ErrorKind::LedgerDisconnected,
            AnchorFailureKind::InsufficientFunds => ErrorKind::LedgerInsufficientResource,
            AnchorFailureKind::Reverted | AnchorFailureKind::Submission => {
                ErrorKind::LedgerSubmissionFailure
            }
        }
    }

    /// True when a transaction was submitted and its fee spent.
    pub fn spent_fee(&self) -> bool {
        self.tx_hash.is_some()
    }
}

/// Result of [`LedgerClient::anchor`].
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorOutcome {
    Confirmed(AnchorReceipt),
    Failed(AnchorFailure),
}

/// Result of [`LedgerClient::verify`].
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerVerification {
    Found {
        student_id: String,
        anchored_at: Option<DateTime<Utc>>,
    },
    NotFound,
    Unreachable { reason: String },
}

/// Errors raised inside a ledger client.
///
/// These stay within implementations; the trait surface converts them.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("not connected to ledger network")]
    Disconnected,

    #[error("insufficient balance: {balance} ETH, need at least {required} ETH")]
    InsufficientFunds { balance: String, required: String },

    #[error("transaction {tx_hash} reverted on ledger")]
    Reverted { tx_hash: String },

    #[error("transaction {tx_hash} not confirmed within {secs}s")]
    ConfirmationTimeout { tx_hash: String, secs: u64 },

    #[error("transaction {tx_hash} dropped before confirmation")]
    Dropped { tx_hash: String },

    #[error("contract error: {0}")]
    Contract(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid ledger configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// Converts an anchoring error into the failure reported to callers.
    pub fn into_failure(self) -> AnchorFailure {
        let (kind, tx_hash) = match &self {
            LedgerError::Disconnected => (AnchorFailureKind::Disconnected, None),
            LedgerError::InsufficientFunds { .. } => (AnchorFailureKind::InsufficientFunds, None),
            LedgerError::Reverted { tx_hash } => (AnchorFailureKind::Reverted, Some(tx_hash.clone())),
            LedgerError::ConfirmationTimeout { tx_hash, .. } | LedgerError::Dropped { tx_hash } => {
                (AnchorFailureKind::Submission, Some(tx_hash.clone()))
            }
            LedgerError::Contract(_) | LedgerError::Provider(_) | LedgerError::Config(_) => {
                (AnchorFailureKind::Submission, None)
            }
        };
        AnchorFailure {
            kind,
            reason: self.to_string(),
            tx_hash,
        }
    }
}

/// The narrow contract the services use to reach the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Account balance in ether, formatted as a decimal string.
    async fn balance(&self) -> Result<String, LedgerError>;

    /// Anchors `fingerprint` for `student_id`. Never fails; see [`AnchorOutcome`].
    async fn anchor(&self, fingerprint: &CredentialFingerprint, student_id: &str) -> AnchorOutcome;

    /// Read-only lookup. Never fails; see [`LedgerVerification`].
    async fn verify(&self, fingerprint: &CredentialFingerprint) -> LedgerVerification;

    /// Number of anchors the registry contract holds.
    async fn total_anchored(&self) -> Result<u64, LedgerError>;

    /// Signing account, for status displays.
    fn account(&self) -> String;

    /// Registry contract address, for status displays.
    fn contract(&self) -> String;
}
