//! HTTP surface: router, handlers and error mapping.

pub mod convert;
pub mod documents;
pub mod error;
pub mod models;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router, extract::State};
use serde_json::json;

use crate::application::convert::ConvertService;
use crate::application::documents::DocumentService;
use crate::infra::db::PostgresRepositories;

use self::error::{ApiError, codes};

#[derive(Clone)]
pub struct ApiState {
    pub documents: DocumentService,
    pub convert: ConvertService,
    /// Absent when the router runs against in-memory repositories.
    pub db: Option<PostgresRepositories>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/documents",
            post(documents::create),
        )
        .route("/api/documents/upload", post(documents::create_from_upload))
        .route(
            "/api/documents/{id}",
            get(documents::get)
                .put(documents::update)
                .delete(documents::delete),
        )
        .route(
            "/api/documents/{id}/upload",
            put(documents::update_from_upload),
        )
        .route("/api/documents/{id}/source", get(documents::source))
        .route("/api/documents/{id}/pdf", get(documents::pdf))
        .route("/api/export/markdown-to-html", post(convert::markdown_to_html))
        .route("/api/export/html-to-pdf", post(convert::html_to_pdf))
        .route("/api/export/markdown-to-pdf", post(convert::markdown_to_pdf))
        .route(
            "/api/upload/markdown-to-html",
            post(convert::upload_markdown_to_html),
        )
        .route(
            "/api/upload/html-to-pdf",
            post(convert::upload_html_to_pdf),
        )
        .route(
            "/api/upload/markdown-to-pdf",
            post(convert::upload_markdown_to_pdf),
        )
        .route("/api/upload/merge-pdf", post(convert::merge_pdf))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    if let Some(db) = &state.db {
        db.health_check().await.map_err(|err| {
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::STORAGE,
                format!("database unreachable: {err}"),
            )
        })?;
    }
    Ok(Json(json!({ "status": "ok" })))
}
