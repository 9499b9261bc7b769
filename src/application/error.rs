//! Application-level error taxonomy.
//!
//! Every service operation resolves into one of these variants; the HTTP
//! layer maps them onto status codes and stable error codes.

use thiserror::Error;

use crate::application::render::{ComposeError, RenderError};
use crate::application::repos::RepoError;
use crate::application::store::StoreError;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{what} not found")]
    NotFound { what: &'static str },
    #[error("document was modified concurrently, retry the update")]
    Conflict,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("artifact store failure: {0}")]
    Storage(#[from] StoreError),
    #[error("version ledger references missing artifact `{key}`")]
    Integrity { key: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("background task failed: {0}")]
    Task(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    pub fn integrity(key: impl Into<String>) -> Self {
        Self::Integrity { key: key.into() }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound { what: "document" },
            RepoError::VersionConflict { .. } => Self::Conflict,
            RepoError::Persistence(message) => Self::Persistence(message),
        }
    }
}
