//! Tool registry (dispatcher).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::capability::Capability;
use crate::error::{ToolError, ToolResult};
use crate::kind::WorkerKind;
use crate::tools;

/// Static table from tool name to capability, built once at startup.
///
/// Lookups are exact and case-sensitive.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Capability>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool served by a worker kind.
    pub fn for_kind(kind: WorkerKind) -> ToolResult<Self> {
        let mut registry = Self::new();
        match kind {
            WorkerKind::Pdf => tools::pdf::register(&mut registry)?,
            WorkerKind::Editor => tools::editor::register(&mut registry)?,
            WorkerKind::Image => tools::image::register(&mut registry)?,
            WorkerKind::Ocr => tools::ocr::register(&mut registry)?,
            WorkerKind::Office => tools::office::register(&mut registry)?,
            WorkerKind::Esign => tools::esign::register(&mut registry)?,
        }
        debug!("Registered {} tools for {} worker", registry.len(), kind);
        Ok(registry)
    }

    /// Add a capability; a second capability with the same name is rejected.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> ToolResult<()> {
        let name = capability.name();
        if self.tools.contains_key(name) {
            return Err(ToolError::DuplicateTool(name.to_string()));
        }
        self.tools.insert(name, capability);
        Ok(())
    }

    pub fn get(&self, tool: &str) -> Option<Arc<dyn Capability>> {
        self.tools.get(tool).cloned()
    }

    /// Look up a tool, failing with [`ToolError::UnknownTool`].
    pub fn resolve(&self, tool: &str) -> ToolResult<Arc<dyn Capability>> {
        self.get(tool)
            .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Every external program the registered tools invoke.
    pub fn required_programs(&self) -> BTreeSet<&'static str> {
        self.tools
            .values()
            .flat_map(|tool| tool.programs().iter().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use docflow_models::JobOptions;

    use crate::capability::ToolContext;

    struct Noop;

    #[async_trait]
    impl Capability for Noop {
        fn name(&self) -> &'static str {
            "noop"
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

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Noop)).unwrap();
        assert!(matches!(
            registry.register(Arc::new(Noop)),
            Err(ToolError::DuplicateTool(_))
        ));
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = ToolRegistry::for_kind(WorkerKind::Pdf).unwrap();
        assert!(registry.resolve("merge").is_ok());
        assert!(matches!(
            registry.resolve("Merge"),
            Err(ToolError::UnknownTool(_))
        ));
        assert!(registry.resolve("merge ").is_err());
        assert!(registry.resolve("mer").is_err());
    }

    #[test]
    fn test_kind_tool_sets() {
        let expect = |kind, names: &[&str]| {
            assert_eq!(ToolRegistry::for_kind(kind).unwrap().names(), names);
        };
        expect(WorkerKind::Pdf, &["compress", "merge", "rotate", "split"]);
        expect(
            WorkerKind::Editor,
            &["edit", "header-footer", "page-numbers", "watermark"],
        );
        expect(
            WorkerKind::Image,
            &["jpg-to-pdf", "pdf-to-jpg", "pdf-to-png", "png-to-pdf"],
        );
        expect(
            WorkerKind::Ocr,
            &[
                "image-to-text",
                "jpg-to-text",
                "ocr",
                "pdf-to-text",
                "png-to-text",
                "scanned-enhance",
            ],
        );
        expect(
            WorkerKind::Office,
            &[
                "excel-to-pdf",
                "pdf-to-excel",
                "pdf-to-ppt",
                "pdf-to-word",
                "ppt-to-pdf",
                "word-to-pdf",
            ],
        );
        expect(WorkerKind::Esign, &["esign"]);
    }

    #[test]
    fn test_kind_tool_sets_are_disjoint() {
        let mut seen = BTreeSet::new();
        for kind in WorkerKind::ALL {
            for name in ToolRegistry::for_kind(kind).unwrap().names() {
                assert!(seen.insert(name), "{} served by more than one kind", name);
            }
        }
    }

    #[test]
    fn test_required_programs() {
        let programs = ToolRegistry::for_kind(WorkerKind::Pdf)
            .unwrap()
            .required_programs();
        assert_eq!(
            programs.into_iter().collect::<Vec<_>>(),
            ["gs", "pdfseparate", "pdfunite", "qpdf"]
        );

        let office = ToolRegistry::for_kind(WorkerKind::Office)
            .unwrap()
            .required_programs();
        assert_eq!(
            office.into_iter().collect::<Vec<_>>(),
            ["pdftoppm", "python3", "soffice"]
        );
    }
}
