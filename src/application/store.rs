//! Artifact store trait: an opaque key/value blob store.
//!
//! Keys are the deterministic paths from [`crate::domain::keys`]. Existing
//! version keys are never overwritten; blobs are only deleted wholesale when
//! the owning document is removed.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid artifact key `{key}`")]
    InvalidKey { key: String },
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError>;

    /// `Ok(None)` means the key is absent; transport failures are errors.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Best-effort removal. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
