use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommitVersionParams, DocumentsRepo, NewDocument, RepoError,
};
use crate::domain::entities::{DocumentRecord, DocumentVersionRecord};
use crate::domain::types::ContentFormat;

use super::{PostgresRepositories, map_sqlx_error};

const DOCUMENT_COLUMNS: &str = "id, title, folder_slug, current_content, content_format, \
     current_version, page_numbers, created_at, updated_at";

const VERSION_COLUMNS: &str = "document_id, version_number, source_key, pdf_key, \
     source_format, source_checksum, pdf_checksum, created_at";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    title: String,
    folder_slug: String,
    current_content: String,
    content_format: String,
    current_version: i32,
    page_numbers: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl DocumentRow {
    fn into_record(self) -> Result<DocumentRecord, RepoError> {
        let content_format: ContentFormat = self
            .content_format
            .parse()
            .map_err(RepoError::from_persistence)?;
        Ok(DocumentRecord {
            id: self.id,
            title: self.title,
            folder_slug: self.folder_slug,
            current_content: self.current_content,
            content_format,
            current_version: self.current_version,
            page_numbers: self.page_numbers,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VersionRow {
    document_id: Uuid,
    version_number: i32,
    source_key: String,
    pdf_key: String,
    source_format: String,
    source_checksum: String,
    pdf_checksum: String,
    created_at: OffsetDateTime,
}

impl VersionRow {
    fn into_record(self) -> Result<DocumentVersionRecord, RepoError> {
        let source_format: ContentFormat = self
            .source_format
            .parse()
            .map_err(RepoError::from_persistence)?;
        Ok(DocumentVersionRecord {
            document_id: self.document_id,
            version_number: self.version_number,
            source_key: self.source_key,
            pdf_key: self.pdf_key,
            source_format,
            source_checksum: self.source_checksum,
            pdf_checksum: self.pdf_checksum,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn insert_document(&self, doc: NewDocument) -> Result<DocumentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO documents \
                 (id, title, folder_slug, current_content, content_format, \
                  current_version, page_numbers) \
             VALUES ($1, $2, $3, '', $4, 0, $5) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(doc.id)
            .bind(&doc.title)
            .bind(&doc.folder_slug)
            .bind(doc.content_format.as_str())
            .bind(doc.page_numbers)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.into_record()
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepoError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(DocumentRow::into_record).transpose()
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn commit_version(
        &self,
        params: CommitVersionParams,
    ) -> Result<DocumentRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let insert = "INSERT INTO document_versions \
                 (document_id, version_number, source_key, pdf_key, \
                  source_format, source_checksum, pdf_checksum) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)";
        sqlx::query(insert)
            .bind(params.document_id)
            .bind(params.version_number)
            .bind(&params.source_key)
            .bind(&params.pdf_key)
            .bind(params.source_format.as_str())
            .bind(&params.source_checksum)
            .bind(&params.pdf_checksum)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        // The guard on current_version serialises concurrent updates: a row
        // that moved past the expected version matches nothing and the whole
        // transaction rolls back.
        let expected = params.version_number - 1;
        let update = format!(
            "UPDATE documents \
             SET current_content = $1, content_format = $2, current_version = $3, \
                 page_numbers = $4, updated_at = now() \
             WHERE id = $5 AND current_version = $6 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&update)
            .bind(&params.content)
            .bind(params.content_format.as_str())
            .bind(params.version_number)
            .bind(params.page_numbers)
            .bind(params.document_id)
            .bind(expected)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                row.into_record()
            }
            None => {
                tx.rollback().await.map_err(map_sqlx_error)?;
                Err(RepoError::VersionConflict { expected })
            }
        }
    }

    async fn find_version(
        &self,
        document_id: Uuid,
        version: i32,
    ) -> Result<Option<DocumentVersionRecord>, RepoError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 AND version_number = $2"
        );
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(document_id)
            .bind(version)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(VersionRow::into_record).transpose()
    }

    async fn latest_version(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentVersionRecord>, RepoError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 \
             ORDER BY version_number DESC \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(document_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(VersionRow::into_record).transpose()
    }

    async fn list_versions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersionRecord>, RepoError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 \
             ORDER BY version_number"
        );
        let rows = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(document_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(VersionRow::into_record).collect()
    }

    async fn delete_versions(&self, document_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM document_versions WHERE document_id = $1")
            .bind(document_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
