//! Handlers for the document lifecycle endpoints.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use bytes::Bytes;
use uuid::Uuid;

use crate::application::documents::{CreateDocument, UpdateDocument};

use super::error::ApiError;
use super::models::{
    CreateDocumentRequest, DocumentResponse, UpdateDocumentRequest, VersionQuery,
    download_response,
};
use super::ApiState;

pub async fn create(
    State(state): State<ApiState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let details = state
        .documents
        .create(CreateDocument {
            title: request.title,
            content: request.content,
            content_format: request.content_format,
            page_numbers: request.page_numbers,
            source_ext: None,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

pub async fn create_from_upload(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let upload = read_upload(multipart).await?;
    let details = state
        .documents
        .create_from_upload(&upload.filename, &upload.bytes, upload.page_numbers)
        .await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

pub async fn get(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let details = state.documents.get(id).await?;
    Ok(Json(details.into()))
}

pub async fn update(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let details = state
        .documents
        .update(
            id,
            UpdateDocument {
                content: request.content,
                content_format: request.content_format,
                page_numbers: request.page_numbers,
                source_ext: None,
            },
        )
        .await?;
    Ok(Json(details.into()))
}

pub async fn update_from_upload(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<DocumentResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let details = state
        .documents
        .update_from_upload(id, &upload.filename, &upload.bytes)
        .await?;
    Ok(Json(details.into()))
}

pub async fn source(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, ApiError> {
    let download = state.documents.source(id, query.version).await?;
    Ok(download_response(download))
}

pub async fn pdf(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(query): Query<VersionQuery>,
) -> Result<Response, ApiError> {
    let download = state.documents.rendered(id, query.version).await?;
    Ok(download_response(download))
}

pub async fn delete(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub struct Upload {
    pub filename: String,
    pub bytes: Bytes,
    pub page_numbers: bool,
}

/// Pull the `file` part and optional `page_numbers` flag out of a multipart
/// form. Unknown parts are skipped.
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut page_numbers = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::invalid_input(format!("malformed multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::invalid_input(format!("failed to read uploaded file: {err}"))
                })?;
                file = Some((filename, bytes));
            }
            Some("page_numbers") => {
                let value = field.text().await.map_err(|err| {
                    ApiError::invalid_input(format!("failed to read form field: {err}"))
                })?;
                page_numbers = matches!(value.trim(), "1" | "true" | "on" | "yes");
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::invalid_input("multipart form is missing a `file` part"));
    };
    Ok(Upload {
        filename,
        bytes,
        page_numbers,
    })
}
