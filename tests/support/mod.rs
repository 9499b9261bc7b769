//! In-memory fakes and a wired service stack for integration tests.

// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use vellum::application::convert::ConvertService;
use vellum::application::documents::DocumentService;
use vellum::application::render::{PdfRenderer, SystemFontRasterizer, Transformer};
use vellum::application::repos::{
    CommitVersionParams, DocumentsRepo, NewDocument, RepoError,
};
use vellum::application::store::{ArtifactStore, StoreError};
use vellum::domain::entities::{DocumentRecord, DocumentVersionRecord};

#[derive(Default)]
struct RepoState {
    documents: HashMap<Uuid, DocumentRecord>,
    versions: HashMap<Uuid, Vec<DocumentVersionRecord>>,
}

/// Mirrors the Postgres adapter's semantics, including the current-version
/// guard on commit.
#[derive(Default)]
pub struct MemoryDocumentsRepo {
    state: Mutex<RepoState>,
}

impl MemoryDocumentsRepo {
    pub fn document_count(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }
}

#[async_trait]
impl DocumentsRepo for MemoryDocumentsRepo {
    async fn insert_document(&self, doc: NewDocument) -> Result<DocumentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord {
            id: doc.id,
            title: doc.title,
            folder_slug: doc.folder_slug,
            current_content: String::new(),
            content_format: doc.content_format,
            current_version: 0,
            page_numbers: doc.page_numbers,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.documents.insert(doc.id, record.clone());
        Ok(record)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        Ok(self.state.lock().unwrap().documents.get(&id).cloned())
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), RepoError> {
        self.state.lock().unwrap().documents.remove(&id);
        Ok(())
    }

    async fn commit_version(
        &self,
        params: CommitVersionParams,
    ) -> Result<DocumentRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let expected = params.version_number - 1;
        let Some(document) = state.documents.get_mut(&params.document_id) else {
            return Err(RepoError::NotFound);
        };
        if document.current_version != expected {
            return Err(RepoError::VersionConflict { expected });
        }

        document.current_content = params.content.clone();
        document.content_format = params.content_format;
        document.current_version = params.version_number;
        document.page_numbers = params.page_numbers;
        document.updated_at = OffsetDateTime::now_utc();
        let updated = document.clone();

        state
            .versions
            .entry(params.document_id)
            .or_default()
            .push(DocumentVersionRecord {
                document_id: params.document_id,
                version_number: params.version_number,
                source_key: params.source_key,
                pdf_key: params.pdf_key,
                source_format: params.source_format,
                source_checksum: params.source_checksum,
                pdf_checksum: params.pdf_checksum,
                created_at: OffsetDateTime::now_utc(),
            });
        Ok(updated)
    }

    async fn find_version(
        &self,
        document_id: Uuid,
        version: i32,
    ) -> Result<Option<DocumentVersionRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .versions
            .get(&document_id)
            .and_then(|versions| {
                versions
                    .iter()
                    .find(|record| record.version_number == version)
                    .cloned()
            }))
    }

    async fn latest_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersionRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .versions
            .get(&document_id)
            .and_then(|versions| {
                versions
                    .iter()
                    .max_by_key(|record| record.version_number)
                    .cloned()
            }))
    }

    async fn list_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersionRecord>, RepoError> {
        let mut versions = self
            .state
            .lock()
            .unwrap()
            .versions
            .get(&document_id)
            .cloned()
            .unwrap_or_default();
        versions.sort_by_key(|record| record.version_number);
        Ok(versions)
    }

    async fn delete_versions(&self, document_id: Uuid) -> Result<u64, RepoError> {
        let removed = self
            .state
            .lock()
            .unwrap()
            .versions
            .remove(&document_id)
            .map(|versions| versions.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }
}

/// Blob store backed by a map, with a switch to make writes fail.
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryArtifactStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn remove(&self, key: &str) {
        self.blobs.lock().unwrap().remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        self.blobs.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete rejected".to_string()));
        }
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct Harness {
    pub repo: Arc<MemoryDocumentsRepo>,
    pub store: Arc<MemoryArtifactStore>,
    pub documents: DocumentService,
    pub convert: ConvertService,
}

pub fn harness() -> Harness {
    let repo = Arc::new(MemoryDocumentsRepo::default());
    let store = Arc::new(MemoryArtifactStore::default());
    let math = Arc::new(SystemFontRasterizer::from_system_fonts());
    let transformer = Arc::new(Transformer::new(math));
    let renderer = Arc::new(PdfRenderer::new(Duration::from_secs(1)));

    let documents = DocumentService::new(
        Arc::clone(&repo) as Arc<dyn DocumentsRepo>,
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        Arc::clone(&transformer),
        Arc::clone(&renderer),
    );
    let convert = ConvertService::new(transformer, renderer);

    Harness {
        repo,
        store,
        documents,
        convert,
    }
}
