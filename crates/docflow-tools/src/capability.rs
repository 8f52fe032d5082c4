//! Capability interface shared by every tool.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docflow_models::{JobOptions, OptionError};

use crate::command::CommandRunner;
use crate::error::{ToolError, ToolResult};

/// Number of input files a tool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Typed option schema for one tool.
///
/// Implementations read every key they use, apply the tool default when it
/// is absent, and reject values that do not fit.
pub trait FromOptions: Sized {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError>;
}

/// Tools that take no options.
impl FromOptions for () {
    fn from_options(_options: &JobOptions) -> Result<Self, OptionError> {
        Ok(())
    }
}

/// Per-job environment handed to a capability.
///
/// Every file a capability creates must live under [`ToolContext::dir`];
/// the caller removes that directory when the job ends.
#[derive(Debug, Clone)]
pub struct ToolContext {
    dir: PathBuf,
    runner: CommandRunner,
}

impl ToolContext {
    pub fn new(dir: impl Into<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            dir: dir.into(),
            runner,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Path for an output file inside the job directory.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Create (if needed) and return a sub-directory for intermediate files.
    pub async fn scratch_dir(&self, name: &str) -> ToolResult<PathBuf> {
        let path = self.dir.join(name);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }
}

/// A transformation selected by tool name.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Exact tool name as sent by the job producer.
    fn name(&self) -> &'static str;

    /// Input files this tool takes.
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }

    /// External programs this tool invokes.
    fn programs(&self) -> &'static [&'static str];

    /// Transform staged inputs into one or more output files.
    ///
    /// Inputs keep the order of the job's file list. An empty return is
    /// treated by callers the same as an error.
    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>>;

    /// Check a file count against [`Capability::arity`].
    fn check_arity(&self, count: usize) -> ToolResult<()> {
        let expected = self.arity();
        if expected.accepts(count) {
            Ok(())
        } else {
            Err(ToolError::Arity {
                tool: self.name().to_string(),
                expected,
                got: count,
            })
        }
    }
}

/// Files in `dir` with the given extension, sorted by name.
pub async fn collect_outputs(dir: &Path, extension: &str) -> ToolResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Fail with [`ToolError::NoOutput`] unless `path` is a non-empty file.
pub async fn ensure_output(tool: &str, path: PathBuf) -> ToolResult<PathBuf> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path),
        _ => Err(ToolError::NoOutput(tool.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Arity::Exactly(2).accepts(2));
        assert!(!Arity::Exactly(2).accepts(1));
        assert!(!Arity::Exactly(2).accepts(3));
        assert!(Arity::AtLeast(2).accepts(5));
        assert!(!Arity::AtLeast(2).accepts(1));
        assert_eq!(Arity::AtLeast(2).to_string(), "at least 2");
    }

    #[tokio::test]
    async fn test_collect_outputs_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-002.png", "page-001.png", "notes.txt", "page-010.PNG"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("nested.png")).await.unwrap();

        let files = collect_outputs(dir.path(), "png").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["page-001.png", "page-002.png", "page-010.PNG"]);
    }

    #[tokio::test]
    async fn test_ensure_output() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        tokio::fs::write(&empty, b"").await.unwrap();
        let full = dir.path().join("full.pdf");
        tokio::fs::write(&full, b"%PDF").await.unwrap();

        assert!(matches!(
            ensure_output("t", empty).await,
            Err(ToolError::NoOutput(_))
        ));
        assert!(matches!(
            ensure_output("t", dir.path().join("missing.pdf")).await,
            Err(ToolError::NoOutput(_))
        ));
        assert_eq!(ensure_output("t", full.clone()).await.unwrap(), full);
    }
}
