// src/storage/artifact.rs
//! Rendered certificate storage.
//!
//! Artifacts are written in two steps. [`ArtifactStore::stage`] renders the
//! certificate to a private staging location and reports where it will
//! live; the issuer records that location, and only after the record is
//! persisted does [`ArtifactStore::commit`] publish the file there. A losing
//! issuer in a race discards its own staged file and never touches the
//! winner's artifact.

use crate::models::credential::CredentialRecord;
use crate::utils::serialization::{unique_sibling, write_json_atomic};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered artifact that is not yet visible at its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    /// Where the artifact lives once committed; stored on the record
    pub location: String,
    /// Private to the issuance that staged it
    pub staging: String,
}

/// Produces and stores the rendered form of a credential.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Renders `record` to a staging location unique to this call.
    async fn stage(&self, record: &CredentialRecord) -> Result<StagedArtifact, ArtifactError>;

    /// Publishes a staged artifact at its final location.
    async fn commit(&self, staged: &StagedArtifact) -> Result<(), ArtifactError>;

    /// Removes a staged artifact whose record was never persisted.
    async fn discard(&self, staged: &StagedArtifact) -> Result<(), ArtifactError>;
}

/// Certificate document as written to disk.
#[derive(Serialize, Debug)]
struct CertificateDocument<'a> {
    title: &'static str,
    full_name: &'a str,
    degree: &'static str,
    program: String,
    honors: String,
    student_id: &'a str,
    award_date: &'a str,
    graduation_year: &'a str,
    /// Short identifier printed in the certificate footer
    certificate_id: String,
    fingerprint: &'a str,
}

/// Degree title printed on the certificate, derived from the programme.
pub fn degree_title(program: &str) -> &'static str {
    let program = program.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| program.contains(w));
    if program.contains("engineering") {
        "BACHELOR OF ENGINEERING"
    } else if has_any(&["computer", "mathematics", "science", "physics", "chemistry"]) {
        "BACHELOR OF SCIENCE"
    } else if has_any(&["education", "teaching"]) {
        "BACHELOR OF EDUCATION"
    } else if has_any(&["arts", "history", "language"]) {
        "BACHELOR OF ARTS"
    } else {
        "BACHELOR OF SCIENCE"
    }
}

/// Writes certificates as JSON documents under a directory.
///
/// File names are `<student id with '/' as '_'>_<fingerprint prefix>.json`.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, record: &CredentialRecord) -> PathBuf {
        let stem = record.student_id().replace(['/', '\\'], "_");
        self.dir
            .join(format!("{}_{}.json", stem, record.fingerprint.short()))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn stage(&self, record: &CredentialRecord) -> Result<StagedArtifact, ArtifactError> {
        let fields = &record.fields;
        let document = CertificateDocument {
            title: "CERTIFICATE OF AWARD",
            full_name: &fields.full_name,
            degree: degree_title(&fields.program),
            program: fields.program.to_uppercase(),
            honors: format!("with {} Honours", fields.honors),
            student_id: &fields.student_id,
            award_date: &fields.award_date,
            graduation_year: &fields.graduation_year,
            certificate_id: record.fingerprint.as_str()[..20].to_uppercase(),
            fingerprint: record.fingerprint.as_str(),
        };
        let path = self.path_for(record);
        let staging = unique_sibling(&path, "staged");
        write_json_atomic(&staging, &document).await?;
        Ok(StagedArtifact {
            location: path.to_string_lossy().into_owned(),
            staging: staging.to_string_lossy().into_owned(),
        })
    }

    async fn commit(&self, staged: &StagedArtifact) -> Result<(), ArtifactError> {
        tokio::fs::rename(&staged.staging, &staged.location).await?;
        Ok(())
    }

    async fn discard(&self, staged: &StagedArtifact) -> Result<(), ArtifactError> {
        match tokio::fs::remove_file(&staged.staging).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
