//! Signature stamping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::{JobOptions, OptionError};

use crate::capability::{ensure_output, Arity, Capability, FromOptions, ToolContext};
use crate::command::ToolCommand;
use crate::error::ToolResult;
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    registry.register(Arc::new(Esign))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsignOptions {
    /// Offset from the bottom-left corner, in points
    pub x: i32,
    pub y: i32,
    /// Signature width in pixels; the image is used as-is when unset
    pub width: Option<u32>,
}

impl FromOptions for EsignOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        Ok(Self {
            x: options.parse_or("x", 0)?,
            y: options.parse_or("y", 0)?,
            width: options.parse_opt::<u32>("width")?.filter(|w| *w > 0),
        })
    }
}

/// Stamp a signature image (second file) onto a PDF (first file).
pub struct Esign;

fn resize_command(signature: &Path, width: u32, output: &Path) -> ToolCommand {
    ToolCommand::new("convert")
        .path(signature)
        .arg("-resize")
        .arg(format!("{}x", width))
        .path(output)
}

fn stamp_description(x: i32, y: i32) -> String {
    format!("pos:bl, off:{} {}, scale:1 abs, rot:0", x, y)
}

fn stamp_command(document: &Path, signature: &Path, x: i32, y: i32, output: &Path) -> ToolCommand {
    ToolCommand::new("pdfcpu")
        .args(["stamp", "add", "-mode", "image", "--"])
        .path(signature)
        .arg(stamp_description(x, y))
        .path(document)
        .path(output)
}

#[async_trait]
impl Capability for Esign {
    fn name(&self) -> &'static str {
        "esign"
    }

    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert", "pdfcpu"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = EsignOptions::from_options(options)?;
        let (document, signature) = (&inputs[0], &inputs[1]);

        let signature = match opts.width {
            Some(width) => {
                let resized = ctx.scratch_dir("esign").await?.join("signature.png");
                ctx.runner()
                    .run(&resize_command(signature, width, &resized))
                    .await?;
                resized
            }
            None => signature.clone(),
        };

        let output = ctx.output_path("signed.pdf");
        ctx.runner()
            .run(&stamp_command(document, &signature, opts.x, opts.y, &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esign_options() {
        let defaults = EsignOptions::from_options(&JobOptions::new()).unwrap();
        assert_eq!(
            defaults,
            EsignOptions {
                x: 0,
                y: 0,
                width: None
            }
        );

        let options: JobOptions = [("x", "120"), ("y", "40"), ("width", "200")]
            .into_iter()
            .collect();
        let opts = EsignOptions::from_options(&options).unwrap();
        assert_eq!((opts.x, opts.y, opts.width), (120, 40, Some(200)));

        let zero: JobOptions = [("width", "0")].into_iter().collect();
        assert_eq!(EsignOptions::from_options(&zero).unwrap().width, None);

        let bad: JobOptions = [("x", "left")].into_iter().collect();
        assert!(EsignOptions::from_options(&bad).is_err());
    }

    #[test]
    fn test_takes_document_and_signature() {
        assert!(Esign.check_arity(2).is_ok());
        assert!(Esign.check_arity(1).is_err());
        assert!(Esign.check_arity(3).is_err());
    }

    #[test]
    fn test_stamp_command() {
        let cmd = stamp_command(
            Path::new("/job/0-contract.pdf"),
            Path::new("/job/1-sig.png"),
            10,
            20,
            Path::new("/job/signed.pdf"),
        );
        assert_eq!(
            cmd.get_args(),
            [
                "stamp",
                "add",
                "-mode",
                "image",
                "--",
                "/job/1-sig.png",
                "pos:bl, off:10 20, scale:1 abs, rot:0",
                "/job/0-contract.pdf",
                "/job/signed.pdf",
            ]
        );
    }

    #[test]
    fn test_resize_command() {
        let cmd = resize_command(Path::new("/job/1-sig.png"), 150, Path::new("/job/esign/signature.png"));
        assert_eq!(cmd.to_string(), "convert /job/1-sig.png -resize 150x /job/esign/signature.png");
    }
}
