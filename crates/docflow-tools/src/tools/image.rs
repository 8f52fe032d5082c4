//! Image <-> PDF conversion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::JobOptions;

use crate::capability::{collect_outputs, ensure_output, Capability, ToolContext};
use crate::command::ToolCommand;
use crate::error::{ToolError, ToolResult};
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    registry.register(Arc::new(ImageToPdf { name: "jpg-to-pdf" }))?;
    registry.register(Arc::new(ImageToPdf { name: "png-to-pdf" }))?;
    registry.register(Arc::new(PdfToImage {
        name: "pdf-to-jpg",
        extension: "jpg",
    }))?;
    registry.register(Arc::new(PdfToImage {
        name: "pdf-to-png",
        extension: "png",
    }))?;
    Ok(())
}

/// Wrap an image in a single-page PDF.
pub struct ImageToPdf {
    name: &'static str,
}

fn image_to_pdf_command(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("convert").path(input).path(output)
}

#[async_trait]
impl Capability for ImageToPdf {
    fn name(&self) -> &'static str {
        self.name
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let output = ctx.output_path("converted.pdf");
        ctx.runner()
            .run(&image_to_pdf_command(&inputs[0], &output))
            .await?;
        Ok(vec![ensure_output(self.name, output).await?])
    }
}

/// Render each PDF page to an image; one output per page.
pub struct PdfToImage {
    name: &'static str,
    extension: &'static str,
}

fn pdf_to_image_command(input: &Path, dir: &Path, extension: &str) -> ToolCommand {
    ToolCommand::new("convert")
        .args(["-density", "150"])
        .path(input)
        .path(dir.join(format!("page-%03d.{}", extension)))
}

#[async_trait]
impl Capability for PdfToImage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let dir = ctx.scratch_dir("pages").await?;
        ctx.runner()
            .run(&pdf_to_image_command(&inputs[0], &dir, self.extension))
            .await?;
        let pages = collect_outputs(&dir, self.extension).await?;
        if pages.is_empty() {
            return Err(ToolError::NoOutput(self.name.to_string()));
        }
        Ok(pages)
    }
}
