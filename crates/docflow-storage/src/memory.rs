//! In-memory artifact store for local runs and tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use docflow_models::JobId;

use crate::client::build_output_key;
use crate::error::{StorageError, StorageResult};
use crate::reference::{ArtifactRef, DEFAULT_PUBLIC_HOST};
use crate::store::ArtifactStore;

/// Artifact store holding objects in a map keyed by bucket and key.
pub struct MemoryArtifactStore {
    bucket: String,
    public_host: String,
    output_prefix: String,
    objects: Mutex<HashMap<ArtifactRef, Vec<u8>>>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
    /// Uploads allowed before every further upload fails
    upload_budget: Mutex<Option<usize>>,
}

impl MemoryArtifactStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            public_host: DEFAULT_PUBLIC_HOST.to_string(),
            output_prefix: "processed".to_string(),
            objects: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            upload_budget: Mutex::new(None),
        }
    }

    /// Let `n` uploads succeed, then fail every following one.
    pub fn fail_uploads_after(self, n: usize) -> Self {
        *self.lock_budget() = Some(n);
        self
    }

    /// Store an object and return its `s3://` reference.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) -> String {
        let artifact = ArtifactRef::new(&self.bucket, key);
        let reference = artifact.to_string();
        self.lock_objects().insert(artifact, data.into());
        reference
    }

    /// Object behind a reference, if stored.
    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        let artifact = ArtifactRef::parse(reference, &self.public_host).ok()?;
        self.lock_objects().get(&artifact).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock_objects().len()
    }

    /// Download attempts, successful or not.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Upload attempts, successful or not.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, HashMap<ArtifactRef, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_budget(&self) -> std::sync::MutexGuard<'_, Option<usize>> {
        self.upload_budget.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let artifact = ArtifactRef::parse(reference, &self.public_host)?;
        let data = self
            .lock_objects()
            .get(&artifact)
            .cloned()
            .ok_or_else(|| StorageError::not_found(artifact.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload(&self, src: &Path, key: &str) -> StorageResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        {
            let mut budget = self.lock_budget();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(StorageError::upload_failed(format!(
                        "injected failure for {}",
                        key
                    )));
                }
                *remaining -= 1;
            }
        }

        let data = tokio::fs::read(src).await?;
        let artifact = ArtifactRef::new(&self.bucket, key);
        let reference = artifact.to_https(&self.public_host);
        self.lock_objects().insert(artifact, data);
        Ok(reference)
    }

    fn output_key(&self, job_id: &JobId, file_name: &str) -> String {
        build_output_key(&self.output_prefix, job_id, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_download_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryArtifactStore::new("bucket");

        let src = dir.path().join("out.pdf");
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        tokio::fs::write(&src, &payload).await.unwrap();

        let key = store.output_key(&JobId::from_string("j1"), "out.pdf");
        let reference = store.upload(&src, &key).await.unwrap();
        assert!(reference.starts_with("https://bucket.s3.amazonaws.com/"));

        let dest = dir.path().join("back").join("out.pdf");
        let size = store.download(&reference, &dest).await.unwrap();
        assert_eq!(size, payload.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryArtifactStore::new("bucket");

        let err = store
            .download("s3://bucket/missing.pdf", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(store.download_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_upload_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryArtifactStore::new("bucket").fail_uploads_after(1);
        let src = dir.path().join("a.txt");
        tokio::fs::write(&src, b"a").await.unwrap();

        assert!(store.upload(&src, "k1").await.is_ok());
        assert!(store.upload(&src, "k2").await.is_err());
        assert_eq!(store.upload_count(), 2);
        assert_eq!(store.object_count(), 1);
    }
}
