//! PDF page tools: merge, split, compress and rotate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::{JobOptions, OptionError};

use crate::capability::{collect_outputs, ensure_output, Arity, Capability, FromOptions, ToolContext};
use crate::command::ToolCommand;
use crate::error::{ToolError, ToolResult};
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    registry.register(Arc::new(Merge))?;
    registry.register(Arc::new(Split))?;
    registry.register(Arc::new(Compress))?;
    registry.register(Arc::new(Rotate))?;
    Ok(())
}

/// Concatenate two or more PDFs in job order.
pub struct Merge;

fn merge_command(inputs: &[PathBuf], output: &Path) -> ToolCommand {
    ToolCommand::new("pdfunite").paths(inputs).path(output)
}

#[async_trait]
impl Capability for Merge {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }

    fn programs(&self) -> &'static [&'static str] {
        &["pdfunite"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let output = ctx.output_path("merged.pdf");
        ctx.runner().run(&merge_command(inputs, &output)).await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

/// One output PDF per page.
pub struct Split;

fn split_command(input: &Path, dir: &Path) -> ToolCommand {
    ToolCommand::new("pdfseparate")
        .path(input)
        .path(dir.join("page-%03d.pdf"))
}

#[async_trait]
impl Capability for Split {
    fn name(&self) -> &'static str {
        "split"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["pdfseparate"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let dir = ctx.scratch_dir("split").await?;
        ctx.runner().run(&split_command(&inputs[0], &dir)).await?;
        let pages = collect_outputs(&dir, "pdf").await?;
        if pages.is_empty() {
            return Err(ToolError::NoOutput(self.name().to_string()));
        }
        Ok(pages)
    }
}

/// Ghostscript `PDFSETTINGS` preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Screen => "screen",
            CompressionLevel::Ebook => "ebook",
            CompressionLevel::Printer => "printer",
            CompressionLevel::Prepress => "prepress",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "screen" => Ok(CompressionLevel::Screen),
            "ebook" => Ok(CompressionLevel::Ebook),
            "printer" => Ok(CompressionLevel::Printer),
            "prepress" => Ok(CompressionLevel::Prepress),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOptions {
    pub level: CompressionLevel,
}

impl FromOptions for CompressOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        let level = match options.non_empty("level") {
            None => CompressionLevel::default(),
            Some(raw) => raw.parse().map_err(|_| {
                OptionError::invalid("level", raw, "one of screen, ebook, printer, prepress")
            })?,
        };
        Ok(Self { level })
    }
}

/// Re-encode a PDF through Ghostscript.
pub struct Compress;

fn compress_command(input: &Path, output: &Path, level: CompressionLevel) -> ToolCommand {
    ToolCommand::new("gs")
        .args([
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS=/{}", level),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            format!("-sOutputFile={}", output.display()),
        ])
        .path(input)
}

#[async_trait]
impl Capability for Compress {
    fn name(&self) -> &'static str {
        "compress"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["gs"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = CompressOptions::from_options(options)?;
        let output = ctx.output_path("compressed.pdf");
        ctx.runner()
            .run(&compress_command(&inputs[0], &output, opts.level))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateOptions {
    /// Clockwise degrees, a multiple of 90
    pub angle: i32,
}

impl FromOptions for RotateOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        let angle: i32 = options.parse_or("angle", 90)?;
        if angle % 90 != 0 {
            return Err(OptionError::invalid(
                "angle",
                &angle.to_string(),
                "a multiple of 90",
            ));
        }
        Ok(Self { angle })
    }
}

/// Rotate every page of a PDF.
pub struct Rotate;

fn rotate_commands(input: &Path, output: &Path, angle: i32) -> [ToolCommand; 2] {
    [
        ToolCommand::new("qpdf").arg("--check").path(input),
        ToolCommand::new("qpdf")
            .arg(format!("--rotate={}", angle))
            .path(input)
            .path(output),
    ]
}

#[async_trait]
impl Capability for Rotate {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["qpdf"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = RotateOptions::from_options(options)?;
        let output = ctx.output_path("rotated.pdf");
        for cmd in rotate_commands(&inputs[0], &output, opts.angle) {
            ctx.runner().run(&cmd).await?;
        }
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> JobOptions {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_keeps_input_order() {
        let inputs = vec![PathBuf::from("/job/0-b.pdf"), PathBuf::from("/job/1-a.pdf")];
        let cmd = merge_command(&inputs, Path::new("/job/merged.pdf"));
        assert_eq!(
            cmd.get_args(),
            ["/job/0-b.pdf", "/job/1-a.pdf", "/job/merged.pdf"]
        );
        assert_eq!(Merge.arity(), Arity::AtLeast(2));
        assert!(Merge.check_arity(1).is_err());
    }

    #[test]
    fn test_split_pattern() {
        let cmd = split_command(Path::new("/job/0-in.pdf"), Path::new("/job/split"));
        assert_eq!(cmd.get_args(), ["/job/0-in.pdf", "/job/split/page-%03d.pdf"]);
    }

    #[test]
    fn test_compress_options() {
        assert_eq!(
            CompressOptions::from_options(&JobOptions::new()).unwrap().level,
            CompressionLevel::Ebook
        );
        assert_eq!(
            CompressOptions::from_options(&options(&[("level", "Screen")]))
                .unwrap()
                .level,
            CompressionLevel::Screen
        );
        assert!(CompressOptions::from_options(&options(&[("level", "tiny")])).is_err());
    }

    #[test]
    fn test_compress_command() {
        let cmd = compress_command(
            Path::new("/job/0-in.pdf"),
            Path::new("/job/compressed.pdf"),
            CompressionLevel::Printer,
        );
        assert_eq!(cmd.program(), "gs");
        assert!(cmd.get_args().contains(&"-dPDFSETTINGS=/printer".to_string()));
        assert!(cmd
            .get_args()
            .contains(&"-sOutputFile=/job/compressed.pdf".to_string()));
        assert_eq!(cmd.get_args().last().unwrap(), "/job/0-in.pdf");
    }

    #[test]
    fn test_rotate_options() {
        assert_eq!(RotateOptions::from_options(&JobOptions::new()).unwrap().angle, 90);
        assert_eq!(
            RotateOptions::from_options(&options(&[("angle", "-180")]))
                .unwrap()
                .angle,
            -180
        );
        assert!(RotateOptions::from_options(&options(&[("angle", "45")])).is_err());
        assert!(RotateOptions::from_options(&options(&[("angle", "ninety")])).is_err());
    }

    #[test]
    fn test_rotate_checks_before_rotating() {
        let [check, rotate] =
            rotate_commands(Path::new("/job/0-in.pdf"), Path::new("/job/rotated.pdf"), 270);
        assert_eq!(check.to_string(), "qpdf --check /job/0-in.pdf");
        assert_eq!(
            rotate.to_string(),
            "qpdf --rotate=270 /job/0-in.pdf /job/rotated.pdf"
        );
    }
}
