//! Stateless conversions: the rendering pipeline without the ledger.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::render::{self, PdfRenderer, RenderError, Transformer};
use crate::domain::types::ContentFormat;

#[derive(Clone)]
pub struct ConvertService {
    transformer: Arc<Transformer>,
    renderer: Arc<PdfRenderer>,
}

impl ConvertService {
    pub fn new(transformer: Arc<Transformer>, renderer: Arc<PdfRenderer>) -> Self {
        Self {
            transformer,
            renderer,
        }
    }

    pub async fn markdown_to_html(&self, markdown: String) -> Result<String, AppError> {
        let transformer = Arc::clone(&self.transformer);
        let html = tokio::task::spawn_blocking(move || {
            transformer.transform(&markdown, ContentFormat::Markdown)
        })
        .await
        .map_err(|err| AppError::Task(err.to_string()))??;
        Ok(html)
    }

    pub async fn html_to_pdf(
        &self,
        html: String,
        page_numbers: bool,
    ) -> Result<Vec<u8>, AppError> {
        let renderer = Arc::clone(&self.renderer);
        let pdf = tokio::task::spawn_blocking(move || renderer.render(&html, page_numbers))
            .await
            .map_err(|err| AppError::Task(err.to_string()))??;
        Ok(pdf)
    }

    pub async fn markdown_to_pdf(
        &self,
        markdown: String,
        page_numbers: bool,
    ) -> Result<Vec<u8>, AppError> {
        let transformer = Arc::clone(&self.transformer);
        let renderer = Arc::clone(&self.renderer);
        let pdf = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RenderError> {
            let html = transformer.transform(&markdown, ContentFormat::Markdown)?;
            renderer.render(&html, page_numbers)
        })
        .await
        .map_err(|err| AppError::Task(err.to_string()))??;
        Ok(pdf)
    }

    pub async fn merge_pdfs(&self, body: Vec<u8>, footer: Vec<u8>) -> Result<Vec<u8>, AppError> {
        let merged =
            tokio::task::spawn_blocking(move || render::merge_with_footer(&body, &footer))
                .await
                .map_err(|err| AppError::Task(err.to_string()))??;
        Ok(merged)
    }
}
