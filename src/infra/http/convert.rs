//! Handlers for stateless conversion endpoints.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::Response;
use bytes::Bytes;

use crate::domain::types::{ContentFormat, format_for_upload, upload_title};

use super::ApiState;
use super::documents::read_upload;
use super::error::ApiError;
use super::models::{
    HtmlToPdfRequest, MarkdownToHtmlRequest, MarkdownToHtmlResponse, MarkdownToPdfRequest,
    attachment,
};

pub async fn markdown_to_html(
    State(state): State<ApiState>,
    Json(request): Json<MarkdownToHtmlRequest>,
) -> Result<Json<MarkdownToHtmlResponse>, ApiError> {
    let html = state.convert.markdown_to_html(request.markdown).await?;
    Ok(Json(MarkdownToHtmlResponse { html }))
}

pub async fn html_to_pdf(
    State(state): State<ApiState>,
    Json(request): Json<HtmlToPdfRequest>,
) -> Result<Response, ApiError> {
    let pdf = state
        .convert
        .html_to_pdf(request.html, request.page_numbers)
        .await?;
    Ok(attachment("document.pdf", "application/pdf", pdf))
}

pub async fn markdown_to_pdf(
    State(state): State<ApiState>,
    Json(request): Json<MarkdownToPdfRequest>,
) -> Result<Response, ApiError> {
    let pdf = state
        .convert
        .markdown_to_pdf(request.markdown, request.page_numbers)
        .await?;
    Ok(attachment("document.pdf", "application/pdf", pdf))
}

pub async fn upload_markdown_to_html(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let markdown = decode_text_upload(&upload.filename, &upload.bytes, ContentFormat::Markdown)?;
    let html = state.convert.markdown_to_html(markdown).await?;
    let filename = format!("{}.html", upload_title(&upload.filename));
    Ok(attachment(&filename, "text/html; charset=utf-8", html.into_bytes()))
}

pub async fn upload_html_to_pdf(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let html = decode_text_upload(&upload.filename, &upload.bytes, ContentFormat::Html)?;
    let pdf = state.convert.html_to_pdf(html, upload.page_numbers).await?;
    let filename = format!("{}.pdf", upload_title(&upload.filename));
    Ok(attachment(&filename, "application/pdf", pdf))
}

pub async fn upload_markdown_to_pdf(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let markdown = decode_text_upload(&upload.filename, &upload.bytes, ContentFormat::Markdown)?;
    let pdf = state
        .convert
        .markdown_to_pdf(markdown, upload.page_numbers)
        .await?;
    let filename = format!("{}.pdf", upload_title(&upload.filename));
    Ok(attachment(&filename, "application/pdf", pdf))
}

pub async fn merge_pdf(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut body: Option<Bytes> = None;
    let mut footer: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::invalid_input(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().map(str::to_string);
        let slot = match name.as_deref() {
            Some("body") => &mut body,
            Some("footer") => &mut footer,
            _ => continue,
        };
        let bytes = field.bytes().await.map_err(|err| {
            ApiError::invalid_input(format!("failed to read uploaded file: {err}"))
        })?;
        *slot = Some(bytes);
    }

    let (Some(body), Some(footer)) = (body, footer) else {
        return Err(ApiError::invalid_input(
            "multipart form must carry `body` and `footer` PDF parts",
        ));
    };

    let merged = state
        .convert
        .merge_pdfs(body.to_vec(), footer.to_vec())
        .await?;
    Ok(attachment("merged.pdf", "application/pdf", merged))
}

fn decode_text_upload(
    filename: &str,
    bytes: &[u8],
    expected: ContentFormat,
) -> Result<String, ApiError> {
    match format_for_upload(filename) {
        Some((format, _)) if format == expected => {}
        _ => {
            return Err(ApiError::invalid_input(format!(
                "`{filename}` is not a {expected} file"
            )));
        }
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ApiError::invalid_input("uploaded file is not valid utf-8"))?;
    Ok(text.to_string())
}
