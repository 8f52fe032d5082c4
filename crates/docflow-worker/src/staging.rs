//! Per-job staging directories.
//!
//! Each job gets `<work_dir>/<job id>-<uuid>/`, so concurrent jobs (and a
//! redelivered copy of the same job) never share files. Inputs and every
//! tool output live inside it and go away with it.

use std::io;
use std::path::{Path, PathBuf};

use docflow_models::JobId;
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest file name component kept from an artifact reference.
const MAX_NAME_LEN: usize = 96;

/// Directory owned by one job for its lifetime.
///
/// Call [`StagingArea::cleanup`] on every exit path; dropping an area that
/// was not cleaned up removes it synchronously as a fallback.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    removed: bool,
}

impl StagingArea {
    /// Create a fresh directory for `job_id` under `work_dir`.
    pub async fn create(work_dir: &Path, job_id: &JobId) -> io::Result<Self> {
        let dir = work_dir.join(format!(
            "{}-{}",
            sanitize(job_id.as_str(), "job"),
            Uuid::new_v4()
        ));
        tokio::fs::create_dir_all(&dir).await?;
        debug!("Created staging dir {}", dir.display());
        Ok(Self {
            dir,
            removed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path for the input at `index` of the job's file list.
    ///
    /// The name is the reference's last path segment, reduced to ASCII and
    /// prefixed with its position so duplicate names stay distinct.
    pub fn input_path(&self, index: usize, reference: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}", index, sanitize(reference_name(reference), "input")))
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!("Removed staging dir {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove staging dir {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Last path segment of a reference, without query or fragment.
fn reference_name(reference: &str) -> &str {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    path.rsplit('/').next().unwrap_or(path)
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; replace everything else.
fn sanitize(raw: &str, fallback: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    let mapped: String = decoded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut name = mapped.trim_start_matches('.').to_string();

    if name.len() > MAX_NAME_LEN {
        // Keep the extension, it tells the tools what they are reading.
        let ext = name
            .rfind('.')
            .map(|i| name[i..].to_string())
            .filter(|ext| ext.len() <= 16)
            .unwrap_or_default();
        name.truncate(MAX_NAME_LEN - ext.len());
        name.push_str(&ext);
    }

    if name.trim_matches('_').is_empty() {
        fallback.to_string()
    } else {
        name
    }
}
