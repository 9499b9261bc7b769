//! Wire-level request and response shapes for the JSON API.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::documents::{ArtifactDownload, DocumentDetails};
use crate::domain::entities::{DocumentRecord, DocumentVersionRecord};
use crate::domain::types::ContentFormat;

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    pub content_format: ContentFormat,
    #[serde(default)]
    pub page_numbers: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub content: String,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub page_numbers: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MarkdownToHtmlRequest {
    pub markdown: String,
}

#[derive(Debug, Serialize)]
pub struct MarkdownToHtmlResponse {
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct HtmlToPdfRequest {
    pub html: String,
    #[serde(default)]
    pub page_numbers: bool,
}

#[derive(Debug, Deserialize)]
pub struct MarkdownToPdfRequest {
    pub markdown: String,
    #[serde(default)]
    pub page_numbers: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub folder_slug: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub current_version: i32,
    pub page_numbers: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub versions: Vec<VersionResponse>,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version_number: i32,
    pub source_key: String,
    pub pdf_key: String,
    pub source_format: ContentFormat,
    pub source_checksum: String,
    pub pdf_checksum: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<DocumentDetails> for DocumentResponse {
    fn from(details: DocumentDetails) -> Self {
        let DocumentDetails { document, versions } = details;
        let DocumentRecord {
            id,
            title,
            folder_slug,
            current_content,
            content_format,
            current_version,
            page_numbers,
            created_at,
            updated_at,
        } = document;
        Self {
            id,
            title,
            folder_slug,
            content: current_content,
            content_format,
            current_version,
            page_numbers,
            created_at,
            updated_at,
            versions: versions.into_iter().map(VersionResponse::from).collect(),
        }
    }
}

impl From<DocumentVersionRecord> for VersionResponse {
    fn from(record: DocumentVersionRecord) -> Self {
        Self {
            version_number: record.version_number,
            source_key: record.source_key,
            pdf_key: record.pdf_key,
            source_format: record.source_format,
            source_checksum: record.source_checksum,
            pdf_checksum: record.pdf_checksum,
            created_at: record.created_at,
        }
    }
}

/// Serve bytes as a file download with a sanitised filename.
pub fn attachment(filename: &str, content_type: &str, bytes: impl Into<Body>) -> Response {
    let safe: String = filename
        .chars()
        .map(|ch| if ch == '"' || ch.is_control() { '_' } else { ch })
        .collect();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{safe}\""),
            ),
        ],
        bytes.into(),
    )
        .into_response()
}

pub fn download_response(download: ArtifactDownload) -> Response {
    attachment(&download.filename, &download.content_type, download.bytes)
}
