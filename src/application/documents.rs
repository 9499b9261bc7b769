//! Document lifecycle service: create, update, fetch, download, delete.
//!
//! Publishing a version is a small saga: render first, store both artifacts,
//! then commit the ledger row and document mutation atomically. A failed
//! create rolls the document row back; stored blobs from a failed attempt
//! are removed best-effort and never referenced by the ledger.

use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::render::{PdfRenderer, RenderError, Transformer};
use crate::application::repos::{CommitVersionParams, DocumentsRepo, NewDocument};
use crate::application::store::ArtifactStore;
use crate::domain::entities::{DocumentRecord, DocumentVersionRecord};
use crate::domain::keys::{self, ArtifactKeys};
use crate::domain::types::{ContentFormat, format_for_upload, upload_title, validate_title};

#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub title: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub page_numbers: bool,
    /// Extension of the uploaded file this content came from, kept verbatim
    /// in the version's source key. `None` for raw-text creates.
    pub source_ext: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateDocument {
    pub content: String,
    pub content_format: Option<ContentFormat>,
    pub page_numbers: Option<bool>,
    pub source_ext: Option<String>,
}

/// A stored artifact prepared for download.
#[derive(Debug, Clone)]
pub struct ArtifactDownload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct DocumentDetails {
    pub document: DocumentRecord,
    pub versions: Vec<DocumentVersionRecord>,
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn DocumentsRepo>,
    store: Arc<dyn ArtifactStore>,
    transformer: Arc<Transformer>,
    renderer: Arc<PdfRenderer>,
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn DocumentsRepo>,
        store: Arc<dyn ArtifactStore>,
        transformer: Arc<Transformer>,
        renderer: Arc<PdfRenderer>,
    ) -> Self {
        Self {
            repo,
            store,
            transformer,
            renderer,
        }
    }

    pub async fn create(&self, request: CreateDocument) -> Result<DocumentDetails, AppError> {
        let title = validate_title(&request.title)?;

        let id = Uuid::new_v4();
        let folder_slug = keys::folder_slug(title);
        let document = self
            .repo
            .insert_document(NewDocument {
                id,
                title: title.to_string(),
                folder_slug,
                content_format: request.content_format,
                page_numbers: request.page_numbers,
            })
            .await?;

        match self
            .publish_version(
                &document,
                1,
                &request.content,
                request.content_format,
                request.page_numbers,
                request.source_ext.as_deref(),
            )
            .await
        {
            Ok(updated) => {
                info!(document_id = %id, "document created");
                let versions = self.repo.list_versions(id).await?;
                Ok(DocumentDetails {
                    document: updated,
                    versions,
                })
            }
            Err(err) => {
                // Compensate: the half-created document must not survive.
                if let Err(cleanup) = self.repo.delete_versions(id).await {
                    warn!(document_id = %id, error = %cleanup, "rollback: version cleanup failed");
                }
                if let Err(cleanup) = self.repo.delete_document(id).await {
                    warn!(document_id = %id, error = %cleanup, "rollback: document cleanup failed");
                }
                Err(err)
            }
        }
    }

    pub async fn create_from_upload(
        &self,
        filename: &str,
        bytes: &[u8],
        page_numbers: bool,
    ) -> Result<DocumentDetails, AppError> {
        let (content_format, content, extension) = decode_upload(filename, bytes)?;
        self.create(CreateDocument {
            title: upload_title(filename),
            content,
            content_format,
            page_numbers,
            source_ext: Some(extension),
        })
        .await
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateDocument,
    ) -> Result<DocumentDetails, AppError> {
        let document = self.find(id).await?;
        let content_format = request.content_format.unwrap_or(document.content_format);
        let page_numbers = request.page_numbers.unwrap_or(document.page_numbers);
        let next_version = document.current_version + 1;

        let updated = self
            .publish_version(
                &document,
                next_version,
                &request.content,
                content_format,
                page_numbers,
                request.source_ext.as_deref(),
            )
            .await?;
        info!(document_id = %id, version = next_version, "document updated");
        let versions = self.repo.list_versions(id).await?;
        Ok(DocumentDetails {
            document: updated,
            versions,
        })
    }

    pub async fn update_from_upload(
        &self,
        id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<DocumentDetails, AppError> {
        let (content_format, content, extension) = decode_upload(filename, bytes)?;
        self.update(
            id,
            UpdateDocument {
                content,
                content_format: Some(content_format),
                page_numbers: None,
                source_ext: Some(extension),
            },
        )
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentDetails, AppError> {
        let document = self.find(id).await?;
        let versions = self.repo.list_versions(id).await?;
        Ok(DocumentDetails { document, versions })
    }

    /// Download the stored source markup of a version (latest by default).
    pub async fn source(
        &self,
        id: Uuid,
        version: Option<i32>,
    ) -> Result<ArtifactDownload, AppError> {
        let (_, record) = self.resolve_version(id, version).await?;
        let bytes = self
            .store
            .get(&record.source_key)
            .await?
            .ok_or_else(|| AppError::integrity(&record.source_key))?;
        let filename = keys::source_filename(&record.source_key);
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        Ok(ArtifactDownload {
            filename,
            content_type,
            bytes,
        })
    }

    /// Download the rendered PDF of a version (latest by default).
    pub async fn rendered(
        &self,
        id: Uuid,
        version: Option<i32>,
    ) -> Result<ArtifactDownload, AppError> {
        let (document, record) = self.resolve_version(id, version).await?;
        let bytes = self
            .store
            .get(&record.pdf_key)
            .await?
            .ok_or_else(|| AppError::integrity(&record.pdf_key))?;
        Ok(ArtifactDownload {
            filename: format!(
                "{}_v{}.pdf",
                document.folder_slug, record.version_number
            ),
            content_type: "application/pdf".to_string(),
            bytes,
        })
    }

    /// Remove the document, its ledger and all stored artifacts. Blob
    /// deletion is best-effort: an unreachable store never blocks the
    /// database removal.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let document = self.find(id).await?;
        let versions = self.repo.list_versions(id).await?;
        for version in &versions {
            for key in [&version.source_key, &version.pdf_key] {
                if let Err(err) = self.store.delete(key).await {
                    warn!(document_id = %id, key, error = %err, "artifact deletion failed");
                }
            }
        }
        self.repo.delete_versions(id).await?;
        self.repo.delete_document(id).await?;
        info!(document_id = %id, title = %document.title, "document deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<DocumentRecord, AppError> {
        self.repo
            .find_document(id)
            .await?
            .ok_or(AppError::NotFound { what: "document" })
    }

    async fn resolve_version(
        &self,
        id: Uuid,
        version: Option<i32>,
    ) -> Result<(DocumentRecord, DocumentVersionRecord), AppError> {
        let document = self.find(id).await?;
        let record = match version {
            Some(number) => self.repo.find_version(id, number).await?,
            None => self.repo.latest_version(id).await?,
        }
        .ok_or(AppError::NotFound { what: "version" })?;
        Ok((document, record))
    }

    /// Render, store both artifacts, then commit the ledger append and
    /// document mutation in one write.
    async fn publish_version(
        &self,
        document: &DocumentRecord,
        version: i32,
        content: &str,
        content_format: ContentFormat,
        page_numbers: bool,
        source_ext: Option<&str>,
    ) -> Result<DocumentRecord, AppError> {
        let pdf = self
            .render(content.to_string(), content_format, page_numbers)
            .await?;

        // Uploads keep their own extension; raw text derives one.
        let extension = match source_ext {
            Some(ext) => ext,
            None => source_extension(content, content_format),
        };
        let keys = ArtifactKeys::derive(&document.folder_slug, document.id, version, extension);
        let source_bytes = Bytes::from(content.as_bytes().to_vec());
        let source_checksum = checksum(&source_bytes);
        let pdf_checksum = checksum(&pdf);

        self.store.put(&keys.source, source_bytes).await?;
        if let Err(err) = self.store.put(&keys.pdf, Bytes::from(pdf)).await {
            self.discard_blobs(&keys).await;
            return Err(err.into());
        }

        let committed = self
            .repo
            .commit_version(CommitVersionParams {
                document_id: document.id,
                version_number: version,
                source_key: keys.source.clone(),
                pdf_key: keys.pdf.clone(),
                source_format: content_format,
                source_checksum,
                pdf_checksum,
                content: content.to_string(),
                content_format,
                page_numbers,
            })
            .await;

        match committed {
            Ok(updated) => Ok(updated),
            Err(err) => {
                // The ledger never references these blobs; drop them.
                self.discard_blobs(&keys).await;
                Err(err.into())
            }
        }
    }

    async fn render(
        &self,
        content: String,
        content_format: ContentFormat,
        page_numbers: bool,
    ) -> Result<Vec<u8>, AppError> {
        let transformer = Arc::clone(&self.transformer);
        let renderer = Arc::clone(&self.renderer);
        let pdf = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RenderError> {
            let html = transformer.transform(&content, content_format)?;
            renderer.render(&html, page_numbers)
        })
        .await
        .map_err(|err| AppError::Task(err.to_string()))??;
        Ok(pdf)
    }

    async fn discard_blobs(&self, keys: &ArtifactKeys) {
        for key in [&keys.source, &keys.pdf] {
            if let Err(err) = self.store.delete(key).await {
                warn!(key, error = %err, "orphaned artifact cleanup failed");
            }
        }
    }
}

fn decode_upload(
    filename: &str,
    bytes: &[u8],
) -> Result<(ContentFormat, String, String), AppError> {
    let Some((content_format, extension)) = format_for_upload(filename) else {
        return Err(AppError::validation(format!(
            "unsupported file type `{filename}`; expected .md, .markdown, .txt, .html or .htm"
        )));
    };
    let content = std::str::from_utf8(bytes)
        .map_err(|_| AppError::validation("uploaded file is not valid utf-8"))?
        .to_string();
    Ok((content_format, content, extension))
}

/// Source extension for the stored blob. Content that happens to be a JSON
/// document is stored as `.json` so downloads open in the right tool.
fn source_extension(content: &str, content_format: ContentFormat) -> &'static str {
    if serde_json::from_str::<serde_json::Value>(content).is_ok() {
        ".json"
    } else {
        content_format.source_extension()
    }
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
