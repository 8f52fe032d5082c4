//! Text recognition and scan cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::{JobOptions, OptionError};

use super::raster::{assemble_command, sibling};
use crate::capability::{collect_outputs, ensure_output, Capability, FromOptions, ToolContext};
use crate::command::ToolCommand;
use crate::error::{ToolError, ToolResult};
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    for name in ["ocr", "pdf-to-text"] {
        registry.register(Arc::new(PdfOcr { name }))?;
    }
    for name in ["image-to-text", "jpg-to-text", "png-to-text"] {
        registry.register(Arc::new(ImageOcr { name }))?;
    }
    registry.register(Arc::new(ScannedEnhance))?;
    Ok(())
}

const MAX_DPI: u32 = 1200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    /// Render and recognition resolution
    pub dpi: u32,
}

impl FromOptions for OcrOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        let dpi: u32 = options.parse_or("dpi", 300)?;
        if dpi == 0 || dpi > MAX_DPI {
            return Err(OptionError::invalid(
                "dpi",
                &dpi.to_string(),
                format!("between 1 and {}", MAX_DPI),
            ));
        }
        Ok(Self { dpi })
    }
}

/// `pdftoppm <pdf> <dir>/page -png -r <dpi>`
fn render_pages_command(input: &Path, dir: &Path, dpi: u32) -> ToolCommand {
    ToolCommand::new("pdftoppm")
        .path(input)
        .path(dir.join("page"))
        .args(["-png", "-r"])
        .arg(dpi.to_string())
}

/// `tesseract <image> <out base> --dpi <dpi>`; writes `<out base>.txt`.
fn tesseract_command(image: &Path, out_base: &Path, dpi: u32) -> ToolCommand {
    ToolCommand::new("tesseract")
        .path(image)
        .path(out_base)
        .arg("--dpi")
        .arg(dpi.to_string())
}

async fn render_pages(tool: &str, ctx: &ToolContext, input: &Path, dpi: u32) -> ToolResult<Vec<PathBuf>> {
    let dir = ctx.scratch_dir("pages").await?;
    ctx.runner()
        .run(&render_pages_command(input, &dir, dpi))
        .await?;
    let pages = collect_outputs(&dir, "png").await?;
    if pages.is_empty() {
        return Err(ToolError::NoOutput(tool.to_string()));
    }
    Ok(pages)
}

/// Recognize the text of every page of a PDF into one text file.
pub struct PdfOcr {
    name: &'static str,
}

#[async_trait]
impl Capability for PdfOcr {
    fn name(&self) -> &'static str {
        self.name
    }

    fn programs(&self) -> &'static [&'static str] {
        &["pdftoppm", "tesseract"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = OcrOptions::from_options(options)?;
        let pages = render_pages(self.name, ctx, &inputs[0], opts.dpi).await?;

        let mut text = String::new();
        for page in &pages {
            let out_base = page.with_extension("");
            ctx.runner()
                .run(&tesseract_command(page, &out_base, opts.dpi))
                .await?;
            let page_text = tokio::fs::read_to_string(out_base.with_extension("txt")).await?;
            text.push_str(&page_text);
            text.push_str("\n\n");
        }

        let output = ctx.output_path("text.txt");
        tokio::fs::write(&output, text).await?;
        Ok(vec![ensure_output(self.name, output).await?])
    }
}

/// Recognize the text of a single image.
pub struct ImageOcr {
    name: &'static str,
}

#[async_trait]
impl Capability for ImageOcr {
    fn name(&self) -> &'static str {
        self.name
    }

    fn programs(&self) -> &'static [&'static str] {
        &["tesseract"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = OcrOptions::from_options(options)?;
        let out_base = ctx.output_path("text");
        ctx.runner()
            .run(&tesseract_command(&inputs[0], &out_base, opts.dpi))
            .await?;
        Ok(vec![ensure_output(self.name, out_base.with_extension("txt")).await?])
    }
}

/// Normalize and boost contrast of a scanned PDF, page by page.
pub struct ScannedEnhance;

fn enhance_command(page: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("convert")
        .path(page)
        .args(["-normalize", "-brightness-contrast", "10x20"])
        .path(output)
}

#[async_trait]
impl Capability for ScannedEnhance {
    fn name(&self) -> &'static str {
        "scanned-enhance"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["pdftoppm", "convert"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = OcrOptions::from_options(options)?;
        let pages = render_pages(self.name(), ctx, &inputs[0], opts.dpi).await?;

        let mut enhanced = Vec::with_capacity(pages.len());
        for page in &pages {
            let out = sibling(page, "enh");
            ctx.runner().run(&enhance_command(page, &out)).await?;
            enhanced.push(out);
        }

        let output = ctx.output_path("enhanced.pdf");
        ctx.runner()
            .run(&assemble_command(&enhanced, 95, &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpi_option() {
        assert_eq!(OcrOptions::from_options(&JobOptions::new()).unwrap().dpi, 300);
        let custom: JobOptions = [("dpi", "150")].into_iter().collect();
        assert_eq!(OcrOptions::from_options(&custom).unwrap().dpi, 150);

        for bad in ["0", "5000", "high"] {
            let options: JobOptions = [("dpi", bad)].into_iter().collect();
            assert!(OcrOptions::from_options(&options).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_render_and_recognize_commands() {
        let render = render_pages_command(Path::new("/job/0-scan.pdf"), Path::new("/job/pages"), 300);
        assert_eq!(render.to_string(), "pdftoppm /job/0-scan.pdf /job/pages/page -png -r 300");

        let ocr = tesseract_command(
            Path::new("/job/pages/page-1.png"),
            Path::new("/job/pages/page-1"),
            300,
        );
        assert_eq!(
            ocr.to_string(),
            "tesseract /job/pages/page-1.png /job/pages/page-1 --dpi 300"
        );
    }

    #[test]
    fn test_enhance_command() {
        let cmd = enhance_command(Path::new("/p/page-1.png"), Path::new("/p/enh-page-1.png"));
        assert_eq!(
            cmd.get_args(),
            ["/p/page-1.png", "-normalize", "-brightness-contrast", "10x20", "/p/enh-page-1.png"]
        );
    }

    #[tokio::test]
    async fn test_invalid_option_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), crate::CommandRunner::new());
        let options: JobOptions = [("dpi", "abc")].into_iter().collect();

        let result = ImageOcr { name: "image-to-text" }
            .run(&[dir.path().join("0-in.png")], &options, &ctx)
            .await;
        assert!(matches!(result, Err(ToolError::InvalidOption(_))));
    }
}
