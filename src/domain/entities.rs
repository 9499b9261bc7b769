//! Persistent records owned by the document pipeline.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::ContentFormat;

/// The mutable document entity a caller edits.
///
/// `current_version` is a cache of the highest ledger version for this
/// document: 0 before any version exists, otherwise always equal to the
/// maximum `DocumentVersionRecord::version_number`. It is mutated only
/// through the version-commit protocol, never in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    /// Folder segment of every artifact key, frozen at creation time so a
    /// later title change never moves already-issued keys.
    pub folder_slug: String,
    pub current_content: String,
    pub content_format: ContentFormat,
    pub current_version: i32,
    pub page_numbers: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One immutable snapshot in a document's version ledger.
///
/// Identified by `(document_id, version_number)`; never updated once
/// written, only removed wholesale when the owning document is deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentVersionRecord {
    pub document_id: Uuid,
    pub version_number: i32,
    pub source_key: String,
    pub pdf_key: String,
    pub source_format: ContentFormat,
    pub source_checksum: String,
    pub pdf_checksum: String,
    pub created_at: OffsetDateTime,
}
