//! Filesystem-backed artifact store.
//!
//! Artifact keys map directly onto relative paths under the configured
//! root. Keys are validated before every access so a crafted key can never
//! escape the storage directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::application::store::{ArtifactStore, StoreError};

#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        if key.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        let absolute = self.resolve(key)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, &bytes).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let absolute = self.resolve(key)?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let absolute = self.resolve(key)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (_dir, store) = store();
        store
            .put("sources/report_1/v1_source.md", Bytes::from_static(b"# hi"))
            .await
            .unwrap();
        let read = store.get("sources/report_1/v1_source.md").await.unwrap();
        assert_eq!(read, Some(Bytes::from_static(b"# hi")));
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("documents/gone/v1.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_of_absent_key_succeeds() {
        let (_dir, store) = store();
        store.delete("documents/gone/v1.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store();
        for key in ["../outside", "/etc/passwd", ""] {
            assert!(matches!(
                store.get(key).await,
                Err(StoreError::InvalidKey { .. })
            ));
        }
    }
}
