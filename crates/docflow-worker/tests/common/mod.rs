//! Shared fixtures: in-memory collaborators and fake capabilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docflow_models::JobOptions;
use docflow_queue::MemoryStatusStore;
use docflow_storage::MemoryArtifactStore;
use docflow_tools::{Arity, Capability, ToolContext, ToolError, ToolRegistry, ToolResult};
use docflow_worker::JobProcessor;

/// Concatenates its inputs into `merged.pdf`.
#[derive(Default)]
pub struct FakeMerge {
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Capability for FakeMerge {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn programs(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        self.seen.lock().unwrap().extend(inputs.iter().cloned());
        let mut merged = Vec::new();
        for input in inputs {
            merged.extend(tokio::fs::read(input).await?);
        }
        let output = ctx.output_path("merged.pdf");
        tokio::fs::write(&output, merged).await?;
        Ok(vec![output])
    }
}

/// Always fails after seeing its input.
#[derive(Default)]
pub struct FailingRotate {
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Capability for FailingRotate {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn programs(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        _ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        assert_eq!(options.get("angle"), Some("90"));
        self.seen.lock().unwrap().extend(inputs.iter().cloned());
        Err(ToolError::command_failed(
            "qpdf",
            "exit status 2",
            Some("qpdf: file is damaged".to_string()),
            Some(2),
        ))
    }
}

/// Writes one file per page: `page-001.png`, `page-002.png`.
pub struct FakeSplit;

#[async_trait]
impl Capability for FakeSplit {
    fn name(&self) -> &'static str {
        "pdf-to-image"
    }

    fn programs(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(
        &self,
        _inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let pages = ctx.scratch_dir("pages").await?;
        let mut outputs = Vec::new();
        for n in 1..=2 {
            let page = pages.join(format!("page-{:03}.png", n));
            tokio::fs::write(&page, format!("page {}", n)).await?;
            outputs.push(page);
        }
        Ok(outputs)
    }
}

/// Reports success without producing anything.
pub struct NoOutput;

#[async_trait]
impl Capability for NoOutput {
    fn name(&self) -> &'static str {
        "compress"
    }

    fn programs(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(
        &self,
        _inputs: &[PathBuf],
        _options: &JobOptions,
        _ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Stages a file, then runs far longer than any test waits.
#[derive(Default)]
pub struct SlowConvert {
    pub started: AtomicBool,
}

impl SlowConvert {
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for SlowConvert {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn programs(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(
        &self,
        _inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let output = ctx.output_path("partial.pdf");
        tokio::fs::write(&output, b"partial").await?;
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![output])
    }
}

pub struct Harness {
    pub store: Arc<MemoryArtifactStore>,
    pub status: Arc<MemoryStatusStore>,
    pub merge: Arc<FakeMerge>,
    pub rotate: Arc<FailingRotate>,
    pub slow: Arc<SlowConvert>,
    pub processor: Arc<JobProcessor>,
    pub work_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryArtifactStore::new("docs"))
    }

    pub fn with_store(store: MemoryArtifactStore) -> Self {
        let store = Arc::new(store);
        let status = Arc::new(MemoryStatusStore::new());
        let merge = Arc::new(FakeMerge::default());
        let rotate = Arc::new(FailingRotate::default());
        let slow = Arc::new(SlowConvert::default());

        let mut registry = ToolRegistry::new();
        registry.register(merge.clone()).unwrap();
        registry.register(rotate.clone()).unwrap();
        registry.register(Arc::new(FakeSplit)).unwrap();
        registry.register(Arc::new(NoOutput)).unwrap();
        registry.register(slow.clone()).unwrap();

        let work_dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            status.clone(),
            Arc::new(registry),
            work_dir.path(),
        ));

        Self {
            store,
            status,
            merge,
            rotate,
            slow,
            processor,
            work_dir,
        }
    }

    /// Entries left in the work dir.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        list(self.work_dir.path())
    }
}

fn list(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
