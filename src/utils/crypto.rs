// src/utils/crypto.rs
//! Credential fingerprinting.
//!
//! The fingerprint is SHA-256 over the canonical fields joined with `|`, in
//! this exact order:
//!
//! ```text
//! full_name | student_id | graduation_year | award_date | honors | program
//! ```
//!
//! Fingerprints already anchored on the ledger were computed this way.
//! Reordering fields or changing the delimiter breaks every existing
//! fingerprint.

use crate::models::credential::{CredentialFields, CredentialFingerprint};
use sha2::{Digest, Sha256};

/// Separator placed between canonical fields.
pub const FIELD_DELIMITER: &str = "|";

/// Builds the canonical pre-image of a credential.
///
/// Fields are used verbatim; callers that want trimming must trim first.
pub fn canonical_string(fields: &CredentialFields) -> String {
    [
        fields.full_name.as_str(),
        fields.student_id.as_str(),
        fields.graduation_year.as_str(),
        fields.award_date.as_str(),
        fields.honors.as_str(),
        fields.program.as_str(),
    ]
    .join(FIELD_DELIMITER)
}

/// Computes a SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes the fingerprint of a credential. Pure and infallible.
pub fn fingerprint(fields: &CredentialFields) -> CredentialFingerprint {
    CredentialFingerprint::from_digest(&hash_data(canonical_string(fields).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> CredentialFields {
        CredentialFields {
            full_name: "Jane Doe".into(),
            student_id: "CS/2020/001".into(),
            graduation_year: "2024".into(),
            award_date: "2024-07-01".into(),
            honors: "Second Class Upper".into(),
            program: "Computer Science".into(),
        }
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            fingerprint(&jane()).as_str(),
            "baf3559c207c70c377a05b8166e6a3fde0b751b8861991396ccf34f49fd2dfd8"
        );
    }

    #[test]
    fn test_deterministic() {
        let fields = jane();
        let first = fingerprint(&fields);
        for _ in 0..10 {
            assert_eq!(fingerprint(&fields), first);
        }
    }

    #[test]
    fn test_empty_fields_still_fingerprint() {
        let empty = CredentialFields {
            full_name: String::new(),
            student_id: String::new(),
            graduation_year: String::new(),
            award_date: String::new(),
            honors: String::new(),
            program: String::new(),
        };
        assert_eq!(canonical_string(&empty), "|||||");
        assert_eq!(
            fingerprint(&empty).as_str(),
            "1867f76f89b18a0f04c72020a91ed03b5557354322022ed5b08d045d20b8689c"
        );
    }

    #[test]
    fn test_single_field_change_changes_fingerprint() {
        let base = fingerprint(&jane());
        let edits: [fn(&mut CredentialFields); 6] = [
            |f| f.full_name.push('e'),
            |f| f.student_id = "CS/2020/002".into(),
            |f| f.graduation_year = "2025".into(),
            |f| f.award_date = "2024-07-02".into(),
            |f| f.honors = "First Class".into(),
            |f| f.program = "Computer Engineering".into(),
        ];
        for edit in edits {
            let mut fields = jane();
            edit(&mut fields);
            assert_ne!(fingerprint(&fields), base);
        }
    }

    #[test]
    fn test_field_order_is_significant() {
        let mut swapped = jane();
        std::mem::swap(&mut swapped.honors, &mut swapped.program);
        assert_ne!(fingerprint(&swapped), fingerprint(&jane()));
    }
}
