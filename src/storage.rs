//! Blob store for attachment payloads. Attachments are immutable once
//! written; reads may happen any number of times per stored blob.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist a payload and return its opaque storage reference.
    async fn put(&self, bytes: &[u8]) -> Result<String>;

    /// Fetch the full payload for a storage reference.
    async fn read(&self, storage_ref: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed store keeping blobs under `<root>/blobs/<uuid>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join("blobs"),
        }
    }

    fn path_for(&self, storage_ref: &str) -> PathBuf {
        self.root.join(storage_ref)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("failed to create blob directory")?;
        let storage_ref = Uuid::new_v4().to_string();
        tokio::fs::write(self.path_for(&storage_ref), bytes)
            .await
            .with_context(|| format!("failed to write blob {storage_ref}"))?;
        Ok(storage_ref)
    }

    async fn read(&self, storage_ref: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.path_for(storage_ref))
            .await
            .with_context(|| format!("failed to read blob {storage_ref}"))
    }
}
