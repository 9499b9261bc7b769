//! Repository trait describing the document/version persistence adapter.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{DocumentRecord, DocumentVersionRecord};
use crate::domain::types::ContentFormat;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("version conflict: document moved past version {expected}")]
    VersionConflict { expected: i32 },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Parameters for inserting a new document row at version 0.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub folder_slug: String,
    pub content_format: ContentFormat,
    pub page_numbers: bool,
}

/// Parameters for the atomic ledger-append + document-row mutation.
///
/// The write must only succeed when the document row still sits at
/// `version_number - 1`; this guard is what serialises concurrent updates
/// to one document.
#[derive(Debug, Clone)]
pub struct CommitVersionParams {
    pub document_id: Uuid,
    pub version_number: i32,
    pub source_key: String,
    pub pdf_key: String,
    pub source_format: ContentFormat,
    pub source_checksum: String,
    pub pdf_checksum: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub page_numbers: bool,
}

#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    async fn insert_document(&self, doc: NewDocument) -> Result<DocumentRecord, RepoError>;

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError>;

    /// Remove the document row. Versions are expected to be removed first;
    /// the schema cascade exists only as a backstop.
    async fn delete_document(&self, id: Uuid) -> Result<(), RepoError>;

    /// Append a ledger row and advance the document row in one atomic write.
    /// Returns the updated document record.
    async fn commit_version(
        &self,
        params: CommitVersionParams,
    ) -> Result<DocumentRecord, RepoError>;

    async fn find_version(
        &self,
        document_id: Uuid,
        version: i32,
    ) -> Result<Option<DocumentVersionRecord>, RepoError>;

    async fn latest_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersionRecord>, RepoError>;

    async fn list_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersionRecord>, RepoError>;

    async fn delete_versions(&self, document_id: Uuid) -> Result<u64, RepoError>;
}
