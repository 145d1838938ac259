// src/models/credential.rs
//! Academic credential data model.
//!
//! Defines the canonical credential fields that are fingerprinted, the
//! fingerprint itself, and the record persisted by a [`RecordStore`].
//!
//! [`RecordStore`]: crate::storage::record_store::RecordStore

use chrono::{DateTime, Utc};
use ethers::utils::hex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a hex-encoded SHA-256 fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// The canonical fields of an academic credential.
///
/// These are exactly the values folded into the fingerprint. Field order in
/// the digest is fixed by [`fingerprint`](crate::utils::crypto::fingerprint),
/// not by the order of declaration here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialFields {
    /// Full name of the graduate
    /// Example: "Jane Doe"
    pub full_name: String,

    /// Unique student identifier (matriculation number)
    /// Example: "CS/2020/001"
    pub student_id: String,

    /// Year of graduation
    /// Example: "2024"
    pub graduation_year: String,

    /// Date the award was conferred
    /// Example: "2024-07-01"
    pub award_date: String,

    /// Honours classification
    /// Example: "Second Class Upper"
    pub honors: String,

    /// Programme of study
    /// Example: "Computer Science"
    pub program: String,
}

impl CredentialFields {
    /// Returns the name of the first field that is blank after trimming.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("student_id", &self.student_id),
            ("graduation_year", &self.graduation_year),
            ("award_date", &self.award_date),
            ("honors", &self.honors),
            ("program", &self.program),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Returns a copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            student_id: self.student_id.trim().to_string(),
            graduation_year: self.graduation_year.trim().to_string(),
            award_date: self.award_date.trim().to_string(),
            honors: self.honors.trim().to_string(),
            program: self.program.trim().to_string(),
        }
    }
}

/// Hex-encoded SHA-256 digest identifying a credential's content.
///
/// Always lower-case and exactly [`FINGERPRINT_HEX_LEN`] characters. The
/// only ways to obtain one are hashing fields or parsing a candidate string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    pub(crate) fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parses a candidate string into a fingerprint.
    ///
    /// Surrounding whitespace is ignored and upper-case hex is accepted, but
    /// anything that is not exactly 64 hex digits is rejected.
    pub fn parse(candidate: &str) -> Option<Self> {
        let candidate = candidate.trim();
        if candidate.len() != FINGERPRINT_HEX_LEN
            || !candidate.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        Some(Self(candidate.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in artifact names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CredentialFingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a credential fingerprint: {:?}", value))
    }
}

impl From<CredentialFingerprint> for String {
    fn from(fp: CredentialFingerprint) -> Self {
        fp.0
    }
}

/// Ledger anchoring state of a stored credential.
///
/// The only part of a [`CredentialRecord`] that changes after creation,
/// and then at most once.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorStatus {
    pub anchored: bool,
    /// Hex transaction hash of the anchoring transaction
    pub tx_hash: Option<String>,
    /// Block the anchoring transaction was included in
    pub block_number: Option<u64>,
}

/// A credential as persisted in the record store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    #[serde(flatten)]
    pub fields: CredentialFields,
    pub fingerprint: CredentialFingerprint,
    /// Opaque location returned by the artifact store, if one rendered it
    pub artifact_location: Option<String>,
    pub anchor: AnchorStatus,
    pub issued_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Builds a freshly issued record with no anchor information.
    pub fn new(fields: CredentialFields, fingerprint: CredentialFingerprint) -> Self {
        Self {
            fields,
            fingerprint,
            artifact_location: None,
            anchor: AnchorStatus::default(),
            issued_at: Utc::now(),
        }
    }

    pub fn student_id(&self) -> &str {
        &self.fields.student_id
    }
}

/// Optional filter applied when listing records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub program: Option<String>,
    pub year: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &CredentialRecord) -> bool {
        let program_ok = self
            .program
            .as_deref()
            .map_or(true, |p| p.is_empty() || record.fields.program == p);
        let year_ok = self
            .year
            .as_deref()
            .map_or(true, |y| y.is_empty() || record.fields.graduation_year == y);
        program_ok && year_ok
    }
}
