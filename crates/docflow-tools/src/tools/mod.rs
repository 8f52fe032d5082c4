//! Tool capabilities, grouped by the worker kind that serves them.
//!
//! Each capability parses its own options into a typed struct and shells out
//! to the external programs it lists. Intermediate files stay inside the job
//! directory handed over in [`crate::ToolContext`].

pub mod editor;
pub mod esign;
pub mod image;
pub mod ocr;
pub mod office;
pub mod pdf;

/// Helpers shared by the raster-based tools.
pub(crate) mod raster {
    use std::path::{Path, PathBuf};

    use crate::capability::{collect_outputs, ToolContext};
    use crate::command::ToolCommand;
    use crate::error::{ToolError, ToolResult};

    /// `convert -density <dpi> <pdf> <dir>/page-%03d.png`
    pub fn rasterize_command(input: &Path, dir: &Path, density: u32) -> ToolCommand {
        ToolCommand::new("convert")
            .arg("-density")
            .arg(density.to_string())
            .path(input)
            .path(dir.join("page-%03d.png"))
    }

    /// Render every page of a PDF to PNG, returning the pages in order.
    pub async fn rasterize(
        tool: &str,
        ctx: &ToolContext,
        input: &Path,
        scratch: &str,
        density: u32,
    ) -> ToolResult<Vec<PathBuf>> {
        let dir = ctx.scratch_dir(scratch).await?;
        ctx.runner()
            .run(&rasterize_command(input, &dir, density))
            .await?;
        let pages = collect_outputs(&dir, "png").await?;
        if pages.is_empty() {
            return Err(ToolError::NoOutput(tool.to_string()));
        }
        Ok(pages)
    }

    /// `convert <pages...> -quality <q> <out>`
    pub fn assemble_command(pages: &[PathBuf], quality: u32, output: &Path) -> ToolCommand {
        ToolCommand::new("convert")
            .paths(pages)
            .arg("-quality")
            .arg(quality.to_string())
            .path(output)
    }

    /// Path for a processed page next to its source: `<dir>/<prefix>-<name>`.
    pub fn sibling(page: &Path, prefix: &str) -> PathBuf {
        let name = page
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        page.with_file_name(format!("{}-{}", prefix, name))
    }
}
