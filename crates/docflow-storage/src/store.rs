//! Artifact store interface shared by all backends.

use std::path::Path;

use async_trait::async_trait;
use docflow_models::JobId;

use crate::error::StorageResult;

/// Object storage as seen by a worker.
///
/// Implementations resolve inbound references to local files and publish
/// local files under a derived key, handing back a new `https://` reference.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the object behind `reference` into `dest`, returning its size.
    async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64>;

    /// Publish the file at `src` under `key`, returning its `https://` reference.
    async fn upload(&self, src: &Path, key: &str) -> StorageResult<String>;

    /// Key under which an output of `job_id` named `file_name` is published.
    fn output_key(&self, job_id: &JobId, file_name: &str) -> String;
}

/// Guess a content type from a file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain; charset=utf-8",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
