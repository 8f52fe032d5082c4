//! PDF editing tools: watermark, page numbers, header/footer and edit.
//!
//! The overlay tools rasterize each page, draw on it with ImageMagick and
//! reassemble the pages into a PDF.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use docflow_models::{JobOptions, OptionError};

use super::raster::{assemble_command, rasterize, sibling};
use crate::capability::{ensure_output, Capability, FromOptions, ToolContext};
use crate::command::ToolCommand;
use crate::error::{ToolError, ToolResult};
use crate::registry::ToolRegistry;

pub fn register(registry: &mut ToolRegistry) -> ToolResult<()> {
    registry.register(Arc::new(Watermark))?;
    registry.register(Arc::new(PageNumbers))?;
    registry.register(Arc::new(HeaderFooter))?;
    registry.register(Arc::new(Edit))?;
    Ok(())
}

/// ImageMagick gravity accepted for watermark placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    #[default]
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gravity::NorthWest => "northwest",
            Gravity::North => "north",
            Gravity::NorthEast => "northeast",
            Gravity::West => "west",
            Gravity::Center => "center",
            Gravity::East => "east",
            Gravity::SouthWest => "southwest",
            Gravity::South => "south",
            Gravity::SouthEast => "southeast",
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gravity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "northwest" | "topleft" => Ok(Gravity::NorthWest),
            "north" | "top" => Ok(Gravity::North),
            "northeast" | "topright" => Ok(Gravity::NorthEast),
            "west" | "left" => Ok(Gravity::West),
            "center" | "centre" => Ok(Gravity::Center),
            "east" | "right" => Ok(Gravity::East),
            "southwest" | "bottomleft" => Ok(Gravity::SouthWest),
            "south" | "bottom" => Ok(Gravity::South),
            "southeast" | "bottomright" => Ok(Gravity::SouthEast),
            _ => Err(()),
        }
    }
}

fn positive_u32(options: &JobOptions, key: &str, default: u32) -> Result<u32, OptionError> {
    let value: u32 = options.parse_or(key, default)?;
    if value == 0 {
        return Err(OptionError::invalid(key, "0", "a positive integer"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub text: String,
    pub color: String,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f64,
    /// Text rotation in degrees
    pub angle: f64,
    pub font_size: u32,
    pub position: Gravity,
}

impl FromOptions for WatermarkOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        let opacity: f64 = options.parse_or("opacity", 0.25)?;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(OptionError::invalid(
                "opacity",
                &opacity.to_string(),
                "a number between 0 and 1",
            ));
        }
        let angle: f64 = options.parse_or("angle", 0.0)?;
        if !angle.is_finite() {
            return Err(OptionError::invalid("angle", &angle.to_string(), "a finite number"));
        }
        let position = match options.non_empty("position") {
            None => Gravity::default(),
            Some(raw) => raw
                .parse()
                .map_err(|_| OptionError::invalid("position", raw, "an ImageMagick gravity"))?,
        };

        Ok(Self {
            text: options.get_or("text", "WATERMARK"),
            color: options.get_or("color", "#000000"),
            opacity,
            angle,
            font_size: positive_u32(options, "fontSize", 80)?,
            position,
        })
    }
}

/// Stamp a translucent text layer on every page.
pub struct Watermark;

/// A4 at 300 DPI.
const LAYER_SIZE: &str = "2480x3508";

fn watermark_layer_command(opts: &WatermarkOptions, layer: &Path) -> ToolCommand {
    ToolCommand::new("convert")
        .args(["-size", LAYER_SIZE, "xc:none"])
        .arg("-gravity")
        .arg(opts.position.as_str())
        .arg("-pointsize")
        .arg(opts.font_size.to_string())
        .arg("-fill")
        .arg(opts.color.clone())
        .arg("-annotate")
        .arg(opts.angle.to_string())
        .arg(opts.text.clone())
        .args(["-alpha", "set", "-channel", "A", "-evaluate", "Multiply"])
        .arg(opts.opacity.to_string())
        .arg("+channel")
        .path(layer)
}

fn composite_command(page: &Path, layer: &Path, output: &Path, gravity: Option<Gravity>) -> ToolCommand {
    let cmd = ToolCommand::new("convert").path(page).path(layer);
    let cmd = match gravity {
        Some(g) => cmd.arg("-gravity").arg(g.as_str()),
        None => cmd,
    };
    cmd.args(["-compose", "over", "-composite"]).path(output)
}

#[async_trait]
impl Capability for Watermark {
    fn name(&self) -> &'static str {
        "watermark"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = WatermarkOptions::from_options(options)?;

        let layer = ctx.scratch_dir("watermark").await?.join("layer.png");
        ctx.runner()
            .run(&watermark_layer_command(&opts, &layer))
            .await?;

        let pages = rasterize(self.name(), ctx, &inputs[0], "watermark-pages", 200).await?;
        let mut stamped = Vec::with_capacity(pages.len());
        for page in &pages {
            let out = sibling(page, "wm");
            ctx.runner()
                .run(&composite_command(page, &layer, &out, Some(Gravity::Center)))
                .await?;
            stamped.push(out);
        }

        let output = ctx.output_path("watermarked.pdf");
        ctx.runner()
            .run(&assemble_command(&stamped, 100, &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNumberOptions {
    pub font_size: u32,
    pub color: String,
}

impl FromOptions for PageNumberOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        Ok(Self {
            font_size: positive_u32(options, "fontSize", 50)?,
            color: options.get_or("color", "black"),
        })
    }
}

/// Print "Page N" at the bottom of every page.
pub struct PageNumbers;

fn page_number_command(
    page: &Path,
    number: usize,
    opts: &PageNumberOptions,
    output: &Path,
) -> ToolCommand {
    ToolCommand::new("convert")
        .path(page)
        .args(["-gravity", "south"])
        .arg("-pointsize")
        .arg(opts.font_size.to_string())
        .arg("-fill")
        .arg(opts.color.clone())
        .args(["-annotate", "+0+30"])
        .arg(format!("Page {}", number))
        .path(output)
}

#[async_trait]
impl Capability for PageNumbers {
    fn name(&self) -> &'static str {
        "page-numbers"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = PageNumberOptions::from_options(options)?;

        let pages = rasterize(self.name(), ctx, &inputs[0], "page-numbers", 150).await?;
        let mut numbered = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let out = sibling(page, "pn");
            ctx.runner()
                .run(&page_number_command(page, index + 1, &opts, &out))
                .await?;
            numbered.push(out);
        }

        let output = ctx.output_path("numbered.pdf");
        ctx.runner()
            .run(&assemble_command(&numbered, 100, &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFooterOptions {
    pub header: String,
    pub footer: String,
    pub font_size: u32,
    pub color: String,
    pub margin_top: u32,
    pub margin_bottom: u32,
}

impl FromOptions for HeaderFooterOptions {
    fn from_options(options: &JobOptions) -> Result<Self, OptionError> {
        Ok(Self {
            header: options.get("header").unwrap_or_default().to_string(),
            footer: options.get("footer").unwrap_or_default().to_string(),
            font_size: positive_u32(options, "fontSize", 40)?,
            color: options.get_or("color", "#000000"),
            margin_top: options.parse_or("marginTop", 80)?,
            margin_bottom: options.parse_or("marginBottom", 80)?,
        })
    }
}

/// Draw header and footer text on every page.
pub struct HeaderFooter;

fn identify_command(page: &Path) -> ToolCommand {
    ToolCommand::new("identify")
        .args(["-format", "%w %h"])
        .path(page)
}

/// Parse `identify -format "%w %h"` output.
fn parse_dimensions(stdout: &str) -> Option<(u32, u32)> {
    let mut parts = stdout.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

fn header_footer_layer_command(
    opts: &HeaderFooterOptions,
    (width, height): (u32, u32),
    layer: &Path,
) -> ToolCommand {
    ToolCommand::new("convert")
        .arg("-size")
        .arg(format!("{}x{}", width, height))
        .arg("xc:none")
        .args(["-gravity", "north", "-pointsize"])
        .arg(opts.font_size.to_string())
        .arg("-fill")
        .arg(opts.color.clone())
        .arg("-annotate")
        .arg(format!("+0+{}", opts.margin_top))
        .arg(opts.header.clone())
        .args(["-gravity", "south", "-pointsize"])
        .arg(opts.font_size.to_string())
        .arg("-fill")
        .arg(opts.color.clone())
        .arg("-annotate")
        .arg(format!("+0+{}", opts.margin_bottom))
        .arg(opts.footer.clone())
        .path(layer)
}

#[async_trait]
impl Capability for HeaderFooter {
    fn name(&self) -> &'static str {
        "header-footer"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["convert", "identify"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let opts = HeaderFooterOptions::from_options(options)?;

        let pages = rasterize(self.name(), ctx, &inputs[0], "header-footer", 200).await?;

        let size = ctx.runner().run(&identify_command(&pages[0])).await?;
        let dimensions = parse_dimensions(&size.stdout).ok_or_else(|| {
            ToolError::unexpected_output("identify", format!("page size {:?}", size.stdout))
        })?;

        let layer = ctx.scratch_dir("header-footer-layer").await?.join("layer.png");
        ctx.runner()
            .run(&header_footer_layer_command(&opts, dimensions, &layer))
            .await?;

        let mut framed = Vec::with_capacity(pages.len());
        for page in &pages {
            let out = sibling(page, "hf");
            ctx.runner()
                .run(&composite_command(page, &layer, &out, None))
                .await?;
            framed.push(out);
        }

        let output = ctx.output_path("header-footer.pdf");
        ctx.runner()
            .run(&assemble_command(&framed, 95, &output))
            .await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}

/// Rewrite a PDF through pdftk.
pub struct Edit;

fn edit_command(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("pdftk")
        .path(input)
        .arg("output")
        .path(output)
}

#[async_trait]
impl Capability for Edit {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn programs(&self) -> &'static [&'static str] {
        &["pdftk"]
    }

    async fn run(
        &self,
        inputs: &[PathBuf],
        _options: &JobOptions,
        ctx: &ToolContext,
    ) -> ToolResult<Vec<PathBuf>> {
        let output = ctx.output_path("edited.pdf");
        ctx.runner().run(&edit_command(&inputs[0], &output)).await?;
        Ok(vec![ensure_output(self.name(), output).await?])
    }
}
