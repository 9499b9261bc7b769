//! Deterministic artifact-key derivation.
//!
//! Every blob belonging to a document version is addressed by a string key
//! reproducible from `(folder slug, document id, version number)` alone:
//!
//! - `sources/{slug}_{id}/v{version}_source{ext}`
//! - `documents/{slug}_{id}/v{version}.pdf`
//!
//! The folder slug is derived from the title exactly once, when the document
//! is created, and persisted on the document row. Later title changes must
//! not re-derive it, so all versions of one document share a single folder.

use slug::slugify;
use uuid::Uuid;

const FALLBACK_SLUG: &str = "untitled";

/// Slugified folder segment for a document title.
///
/// Falls back to a fixed label when the title carries no representable
/// characters; uniqueness of the full folder name is guaranteed by the
/// appended document id, not by the slug.
pub fn folder_slug(title: &str) -> String {
    let candidate = slugify(title);
    if candidate.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        candidate
    }
}

/// The pair of store keys addressing one version's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub source: String,
    pub pdf: String,
}

impl ArtifactKeys {
    pub fn derive(folder_slug: &str, document_id: Uuid, version: i32, source_ext: &str) -> Self {
        let folder = format!("{folder_slug}_{document_id}");
        Self {
            source: format!("sources/{folder}/v{version}_source{source_ext}"),
            pdf: format!("documents/{folder}/v{version}.pdf"),
        }
    }
}

/// Basename of a source key, used as the suggested download filename.
pub fn source_filename(source_key: &str) -> String {
    source_key
        .rsplit('/')
        .next()
        .unwrap_or(source_key)
        .to_string()
}
