// src/services/test_support.rs
//! Test doubles for the ledger and record store.

use crate::blockchain::ledger_client::{
    AnchorFailure, AnchorFailureKind, AnchorOutcome, AnchorReceipt, LedgerClient, LedgerError,
    LedgerVerification,
};
use crate::models::credential::{
    AnchorStatus, CredentialFields, CredentialFingerprint, CredentialRecord, RecordFilter,
};
use crate::storage::memory_store::MemoryRecordStore;
use crate::storage::record_store::{RecordStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn jane_doe() -> CredentialFields {
    CredentialFields {
        full_name: "Jane Doe".into(),
        student_id: "CS/2020/001".into(),
        graduation_year: "2024".into(),
        award_date: "2024-07-01".into(),
        honors: "Second Class Upper".into(),
        program: "Computer Science".into(),
    }
}

pub fn student(n: u32) -> CredentialFields {
    CredentialFields {
        full_name: format!("Student {}", n),
        student_id: format!("PH/2021/{:03}", n),
        graduation_year: "2025".into(),
        award_date: "2025-06-30".into(),
        honors: "First Class".into(),
        program: "Physics".into(),
    }
}

/// How [`ScriptedLedger::anchor`] answers.
#[derive(Debug, Clone)]
pub enum AnchorScript {
    Confirm,
    Fail(AnchorFailureKind),
}

/// In-memory ledger with scripted anchor outcomes and call counters.
pub struct ScriptedLedger {
    script: Mutex<AnchorScript>,
    reachable: AtomicBool,
    anchors: Mutex<HashMap<CredentialFingerprint, String>>,
    pub anchor_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl ScriptedLedger {
    pub fn confirming() -> Self {
        Self::with_script(AnchorScript::Confirm)
    }

    pub fn failing(kind: AnchorFailureKind) -> Self {
        Self::with_script(AnchorScript::Fail(kind))
    }

    fn with_script(script: AnchorScript) -> Self {
        Self {
            script: Mutex::new(script),
            reachable: AtomicBool::new(true),
            anchors: Mutex::new(HashMap::new()),
            anchor_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Places an anchor directly, as if written by an earlier deployment.
    pub fn preload(&self, fingerprint: &CredentialFingerprint, student_id: &str) {
        self.anchors
            .lock()
            .unwrap()
            .insert(fingerprint.clone(), student_id.to_string());
    }

    pub fn holds(&self, fingerprint: &CredentialFingerprint) -> bool {
        self.anchors.lock().unwrap().contains_key(fingerprint)
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.anchor_calls.load(Ordering::SeqCst),
            self.verify_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn is_connected(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn balance(&self) -> Result<String, LedgerError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok("1.5".into())
        } else {
            Err(LedgerError::Disconnected)
        }
    }

    async fn anchor(&self, fingerprint: &CredentialFingerprint, student_id: &str) -> AnchorOutcome {
        self.anchor_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        match script {
            AnchorScript::Confirm => {
                self.preload(fingerprint, student_id);
                AnchorOutcome::Confirmed(AnchorReceipt {
                    tx_hash: format!("0x{}", fingerprint.as_str()),
                    block_number: 1_234,
                    cost: 48_000,
                })
            }
            AnchorScript::Fail(kind) => AnchorOutcome::Failed(AnchorFailure {
                kind,
                reason: format!("scripted {:?}", kind),
                tx_hash: matches!(kind, AnchorFailureKind::Reverted).then(|| "0xdead".to_string()),
            }),
        }
    }

    async fn verify(&self, fingerprint: &CredentialFingerprint) -> LedgerVerification {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return LedgerVerification::Unreachable {
                reason: "connection refused".into(),
            };
        }
        match self.anchors.lock().unwrap().get(fingerprint) {
            Some(student_id) => LedgerVerification::Found {
                student_id: student_id.clone(),
                anchored_at: Some(Utc::now()),
            },
            None => LedgerVerification::NotFound,
        }
    }

    async fn total_anchored(&self) -> Result<u64, LedgerError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(LedgerError::Disconnected);
        }
        Ok(self.anchors.lock().unwrap().len() as u64)
    }

    fn account(&self) -> String {
        "0x0000000000000000000000000000000000000001".into()
    }

    fn contract(&self) -> String {
        "0x0000000000000000000000000000000000000002".into()
    }
}

/// Memory store with switchable faults and lookup counters.
///
/// With `hide_existing` set, lookups always miss, which reproduces two
/// issuances that both passed the pre-check before either inserted.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
    pub fail_lookup: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
    pub hide_existing: AtomicBool,
    pub lookups: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &CredentialFingerprint,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk unavailable".into()));
        }
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_fingerprint(fingerprint).await
    }

    async fn find_by_student_id(&self, student_id: &str) -> Result<Option<CredentialRecord>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk unavailable".into()));
        }
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_student_id(student_id).await
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".into()));
        }
        self.inner.insert(record).await
    }

    async fn update_anchor_status(
        &self,
        fingerprint: &CredentialFingerprint,
        status: AnchorStatus,
    ) -> Result<(), StoreError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(StoreError::Io("connection reset".into()));
        }
        self.inner.update_anchor_status(fingerprint, status).await
    }

    async fn delete(&self, fingerprint: &CredentialFingerprint) -> Result<CredentialRecord, StoreError> {
        self.inner.delete(fingerprint).await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<CredentialRecord>, StoreError> {
        self.inner.list(filter).await
    }
}
