//! End-to-end lifecycle tests against in-memory persistence: every render
//! goes through the real markup, layout and PDF stages.

mod support;

use lopdf::Document;
use vellum::application::documents::{CreateDocument, UpdateDocument};
use vellum::application::error::AppError;
use vellum::application::store::ArtifactStore;
use vellum::domain::types::ContentFormat;

fn markdown_document(title: &str, content: &str) -> CreateDocument {
    CreateDocument {
        title: title.to_string(),
        content: content.to_string(),
        content_format: ContentFormat::Markdown,
        page_numbers: false,
        source_ext: None,
    }
}

#[tokio::test]
async fn create_issues_version_one_with_stable_keys() {
    let h = support::harness();
    let details = h
        .documents
        .create(markdown_document(
            "Quarterly Report",
            "# Summary\n\nRevenue was *fine*.\n",
        ))
        .await
        .unwrap();

    let document = &details.document;
    assert_eq!(document.current_version, 1);
    assert_eq!(document.folder_slug, "quarterly-report");
    assert_eq!(details.versions.len(), 1);

    let version = &details.versions[0];
    let folder = format!("quarterly-report_{}", document.id);
    assert_eq!(version.source_key, format!("sources/{folder}/v1_source.md"));
    assert_eq!(version.pdf_key, format!("documents/{folder}/v1.pdf"));

    let pdf = h.store.get(&version.pdf_key).await.unwrap().unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    let source = h.store.get(&version.source_key).await.unwrap().unwrap();
    assert_eq!(&source[..], b"# Summary\n\nRevenue was *fine*.\n");
}

#[tokio::test]
async fn update_appends_to_the_ledger_and_keeps_old_artifacts() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Notes", "first\n"))
        .await
        .unwrap();

    let updated = h
        .documents
        .update(
            created.document.id,
            UpdateDocument {
                content: "second\n".to_string(),
                content_format: None,
                page_numbers: Some(true),
                source_ext: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.document.current_version, 2);
    assert_eq!(updated.document.current_content, "second\n");
    assert!(updated.document.page_numbers);
    let numbers: Vec<i32> = updated
        .versions
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    // Version 1 blobs survive the update untouched.
    let v1 = &updated.versions[0];
    assert!(h.store.get(&v1.source_key).await.unwrap().is_some());
    assert!(h.store.get(&v1.pdf_key).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_artifact_write_rolls_back_create() {
    let h = support::harness();
    h.store.fail_puts(true);

    let result = h
        .documents
        .create(markdown_document("Doomed", "content\n"))
        .await;

    assert!(matches!(result, Err(AppError::Storage(_))));
    assert_eq!(h.repo.document_count(), 0);
    assert!(h.store.keys().is_empty());
}

#[tokio::test]
async fn failed_update_leaves_document_at_previous_version() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Resilient", "v1\n"))
        .await
        .unwrap();
    let id = created.document.id;

    h.store.fail_puts(true);
    let failed = h
        .documents
        .update(
            id,
            UpdateDocument {
                content: "v2\n".to_string(),
                content_format: None,
                page_numbers: None,
                source_ext: None,
            },
        )
        .await;
    assert!(failed.is_err());

    h.store.fail_puts(false);
    let retried = h
        .documents
        .update(
            id,
            UpdateDocument {
                content: "v2\n".to_string(),
                content_format: None,
                page_numbers: None,
                source_ext: None,
            },
        )
        .await
        .unwrap();

    // The failed attempt consumed no version number.
    assert_eq!(retried.document.current_version, 2);
    assert_eq!(retried.versions.len(), 2);
}

#[tokio::test]
async fn concurrent_commit_is_rejected_by_the_version_guard() {
    use vellum::application::repos::{CommitVersionParams, DocumentsRepo, RepoError};

    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Contended", "v1\n"))
        .await
        .unwrap();

    let stale = CommitVersionParams {
        document_id: created.document.id,
        version_number: 1,
        source_key: "sources/x/v1_source.md".to_string(),
        pdf_key: "documents/x/v1.pdf".to_string(),
        source_format: ContentFormat::Markdown,
        source_checksum: "0".repeat(64),
        pdf_checksum: "0".repeat(64),
        content: "stale\n".to_string(),
        content_format: ContentFormat::Markdown,
        page_numbers: false,
    };
    let result = h.repo.commit_version(stale).await;
    assert!(matches!(
        result,
        Err(RepoError::VersionConflict { expected: 0 })
    ));
}

#[tokio::test]
async fn missing_blob_is_reported_as_integrity_failure() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Damaged", "content\n"))
        .await
        .unwrap();

    let version = &created.versions[0];
    h.store.remove(&version.pdf_key);

    let result = h.documents.rendered(created.document.id, None).await;
    assert!(matches!(result, Err(AppError::Integrity { .. })));
}

#[tokio::test]
async fn source_download_serves_the_exact_stored_markup() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Sources", "# Exact bytes\n"))
        .await
        .unwrap();

    let download = h
        .documents
        .source(created.document.id, Some(1))
        .await
        .unwrap();
    assert_eq!(download.filename, "v1_source.md");
    assert_eq!(&download.bytes[..], b"# Exact bytes\n");

    let missing = h.documents.source(created.document.id, Some(9)).await;
    assert!(matches!(missing, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn delete_removes_ledger_and_blobs() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Ephemeral", "v1\n"))
        .await
        .unwrap();
    let id = created.document.id;
    h.documents
        .update(
            id,
            UpdateDocument {
                content: "v2\n".to_string(),
                content_format: None,
                page_numbers: None,
                source_ext: None,
            },
        )
        .await
        .unwrap();

    h.documents.delete(id).await.unwrap();

    assert!(matches!(
        h.documents.get(id).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(h.store.keys().is_empty());
}

#[tokio::test]
async fn uploads_keep_their_own_source_extension() {
    let h = support::harness();

    let txt = h
        .documents
        .create_from_upload("notes.txt", b"plain text body\n", false)
        .await
        .unwrap();
    assert!(txt.versions[0].source_key.ends_with("/v1_source.txt"));
    let download = h.documents.source(txt.document.id, None).await.unwrap();
    assert_eq!(download.filename, "v1_source.txt");

    let htm = h
        .documents
        .create_from_upload("page.htm", b"<p>hello</p>", false)
        .await
        .unwrap();
    assert!(htm.versions[0].source_key.ends_with("/v1_source.htm"));
}

#[tokio::test]
async fn delete_survives_blob_removal_failures() {
    let h = support::harness();
    let created = h
        .documents
        .create(markdown_document("Stubborn", "v1\n"))
        .await
        .unwrap();
    let id = created.document.id;

    h.store.fail_deletes(true);
    h.documents.delete(id).await.unwrap();

    // Database state is fully removed even though every blob delete failed.
    assert!(matches!(
        h.documents.get(id).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(!h.store.keys().is_empty());
}

#[tokio::test]
async fn markdown_with_math_still_produces_a_pdf() {
    let h = support::harness();
    let pdf = h
        .convert
        .markdown_to_pdf(
            "Euler noted that $e^{i\\pi} + 1 = 0$.\n\n$$\\int_0^1 x^2\\,dx$$\n".to_string(),
            false,
        )
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[tokio::test]
async fn merge_keeps_the_body_page_count_and_stamps_the_last_page() {
    let h = support::harness();

    let paragraph = "This line repeats to push the body onto a second page. ".repeat(8);
    let body_markdown = format!("# Body\n\n{}\n", vec![paragraph; 30].join("\n\n"));
    let body = h.convert.markdown_to_pdf(body_markdown, true).await.unwrap();
    let footer = h
        .convert
        .markdown_to_pdf("Confidential".to_string(), false)
        .await
        .unwrap();

    let body_pages = Document::load_mem(&body).unwrap().get_pages().len();
    assert!(body_pages >= 2);

    let merged = h.convert.merge_pdfs(body, footer).await.unwrap();
    let merged_doc = Document::load_mem(&merged).unwrap();
    assert_eq!(merged_doc.get_pages().len(), body_pages);
}

#[tokio::test]
async fn merge_rejects_garbage_input() {
    let h = support::harness();
    let footer = h
        .convert
        .markdown_to_pdf("footer".to_string(), false)
        .await
        .unwrap();
    let result = h
        .convert
        .merge_pdfs(b"not a pdf".to_vec(), footer)
        .await;
    assert!(matches!(result, Err(AppError::Compose(_))));
}
