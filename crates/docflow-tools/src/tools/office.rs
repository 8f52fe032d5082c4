//! Office conversions: documents to PDF through LibreOffice, and PDF back
//! to Word, Excel or PowerPoint through Python converters.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::JobOptions;

use crate::capability::{ensure_output, Capability, ToolContext};
use crate::command::ToolCommand;
use crate::error::ToolResult;
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    for name in ["word-to-pdf", "excel-to-pdf", "ppt-to-pdf"] {
        registry.register(Arc::new(OfficeToPdf { name }))?;
    }
    for format in [OfficeFormat::Word, OfficeFormat::Excel, OfficeFormat::Slides] {
        registry.register(Arc::new(PdfToOffice { format }))?;
    }
    Ok(())
}

/// Convert a Word, Excel or PowerPoint file to PDF.
pub struct OfficeToPdf {
    name: &'static str,
}

/// Headless conversion with a private user profile, so concurrent
/// conversions do not contend for the default profile lock.
fn soffice_command(input: &Path, out_dir: &Path, profile_dir: &Path) -> ToolCommand {
    ToolCommand::new("soffice")
        .arg(format!("-env:UserInstallation=file://{}", profile_dir.display()))
        .args([
            "--headless",
            "--invisible",
            "--nodefault",
            "--nofirststartwizard",
            "--nologo",
            "--convert-to",
            "pdf",
            "--outdir",
        ])
        .path(out_dir)
        .path(input)
}

/// LibreOffice names its output after the input stem.
fn converted_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{}.pdf", stem))
}

#[async_trait]
impl Capability for OfficeToPdf {
    fn name(&self) -> &'static str {
        self.name
    }

    fn programs(&self) -> &'static [&'static str] {
        &["soffice"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let out_dir = ctx.scratch_dir("office").await?;
        let profile_dir = ctx.scratch_dir("office-profile").await?;
        ctx.runner()
            .run(&soffice_command(&inputs[0], &out_dir, &profile_dir))
            .await?;
        let output = converted_path(&inputs[0], &out_dir);
        Ok(vec![ensure_output(self.name, output).await?])
    }
}

/// Target format of a PDF to office conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFormat {
    Word,
    Excel,
    Slides,
}

const PDF_TO_WORD: &str = "\
import sys
from pdf2docx import Converter
cv = Converter(sys.argv[1])
cv.convert(sys.argv[2])
cv.close()
";

const PDF_TO_EXCEL: &str = "\
import sys
import camelot
tables = camelot.read_pdf(sys.argv[1], pages='all')
if tables.n == 0:
    sys.exit('no tables found')
tables.export(sys.argv[2], f='excel')
";

const PDF_TO_SLIDES: &str = "\
import os, sys, tempfile
from pdf2image import convert_from_path
from pptx import Presentation
prs = Presentation()
blank = prs.slide_layouts[6]
with tempfile.TemporaryDirectory(dir=os.path.dirname(sys.argv[2])) as tmp:
    for i, page in enumerate(convert_from_path(sys.argv[1])):
        image = os.path.join(tmp, 'slide-%03d.png' % i)
        page.save(image)
        slide = prs.slides.add_slide(blank)
        slide.shapes.add_picture(image, 0, 0, prs.slide_width, prs.slide_height)
prs.save(sys.argv[2])
";

impl OfficeFormat {
    pub fn tool_name(&self) -> &'static str {
        match self {
            OfficeFormat::Word => "pdf-to-word",
            OfficeFormat::Excel => "pdf-to-excel",
            OfficeFormat::Slides => "pdf-to-ppt",
        }
    }

    fn output_name(&self) -> &'static str {
        match self {
            OfficeFormat::Word => "converted.docx",
            OfficeFormat::Excel => "tables.xlsx",
            OfficeFormat::Slides => "slides.pptx",
        }
    }

    fn script(&self) -> &'static str {
        match self {
            OfficeFormat::Word => PDF_TO_WORD,
            OfficeFormat::Excel => PDF_TO_EXCEL,
            OfficeFormat::Slides => PDF_TO_SLIDES,
        }
    }
}

/// Convert a PDF to an editable office document.
///
/// Runs a short converter script with `python3`; the interpreter needs
/// `pdf2docx`, `camelot` or `python-pptx` with `pdf2image` installed.
pub struct PdfToOffice {
    format: OfficeFormat,
}

fn python_command(format: OfficeFormat, input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("python3")
        .arg("-c")
        .arg(format.script())
        .path(input)
        .path(output)
}

#[async_trait]
impl Capability for PdfToOffice {
    fn name(&self) -> &'static str {
        self.format.tool_name()
    }

    fn programs(&self) -> &'static [&'static str] {
        match self.format {
            // pdf2image shells out to poppler
            OfficeFormat::Slides => &["python3", "pdftoppm"],
            OfficeFormat::Word | OfficeFormat::Excel => &["python3"],
        }
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let output = ctx.output_path(self.format.output_name());
        ctx.runner()
            .run(&python_command(self.format, &inputs[0], &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soffice_command() {
        let cmd = soffice_command(
            Path::new("/job/0-report.docx"),
            Path::new("/job/office"),
            Path::new("/job/office-profile"),
        );
        let args = cmd.get_args();
        assert_eq!(args[0], "-env:UserInstallation=file:///job/office-profile");
        assert!(args.contains(&"--headless".to_string()));
        assert_eq!(&args[args.len() - 2..], ["/job/office", "/job/0-report.docx"]);
    }

    #[test]
    fn test_converted_path_uses_input_stem() {
        assert_eq!(
            converted_path(Path::new("/job/0-report.final.xlsx"), Path::new("/job/office")),
            PathBuf::from("/job/office/0-report.final.pdf")
        );
    }

    #[test]
    fn test_python_command() {
        let cmd = python_command(
            OfficeFormat::Excel,
            Path::new("/job/0-report.pdf"),
            Path::new("/job/tables.xlsx"),
        );
        assert_eq!(cmd.program(), "python3");
        let args = cmd.get_args();
        assert_eq!(args[0], "-c");
        assert!(args[1].contains("camelot.read_pdf"));
        assert_eq!(&args[2..], ["/job/0-report.pdf", "/job/tables.xlsx"]);
    }

    #[test]
    fn test_pdf_to_office_names() {
        let names: Vec<_> = [OfficeFormat::Word, OfficeFormat::Excel, OfficeFormat::Slides]
            .iter()
            .map(|f| (f.tool_name(), f.output_name()))
            .collect();
        assert_eq!(
            names,
            [
                ("pdf-to-word", "converted.docx"),
                ("pdf-to-excel", "tables.xlsx"),
                ("pdf-to-ppt", "slides.pptx"),
            ]
        );
    }

    #[tokio::test]
    async fn test_pdf_to_office_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), crate::command::CommandRunner::new());
        let tool = PdfToOffice {
            format: OfficeFormat::Word,
        };
        let result = tool
            .run(&[dir.path().join("missing.pdf")], &JobOptions::new(), &ctx)
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("converted.docx").exists());
    }
}
