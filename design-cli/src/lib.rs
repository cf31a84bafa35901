//! # Design CLI
//!
//! Headless host for the design canvas.
//!
//! ## Usage
//!
//! ```bash
//! # Print areas of the hoodie template
//! design-cli areas --template 5
//!
//! # Re-render a saved design onto the pants template with a background
//! design-cli render --design state.json --template 4 --background pattern.png --out design.jpg
//! ```
//!
//! `render` writes the raster to `--out` and the guide-free upload document
//! next to it with a `.json` extension.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use design_core::{CanvasState, DesignSession, EditorConfig, RasterFormat, TemplateId};
use design_renderer::{AssetImageLoader, SvgRasterizer};

/// Command-line arguments for design-cli.
#[derive(Debug, Clone, Parser)]
#[command(name = "design-cli")]
#[command(about = "Product design canvas: print areas and headless export")]
#[command(version)]
pub struct Cli {
    /// Editor configuration file (JSON)
    #[arg(long, global = true, env = "DESIGN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the print areas of a product template as JSON
    Areas {
        /// Product template id
        #[arg(long)]
        template: TemplateId,
    },

    /// Render a saved design to an image
    Render {
        /// Saved canvas state (JSON)
        #[arg(long)]
        design: PathBuf,

        /// Redraw guides for this template
        #[arg(long)]
        template: Option<TemplateId>,

        /// Fill the print areas with this image
        #[arg(long)]
        background: Option<String>,

        /// Output raster file
        #[arg(long)]
        out: PathBuf,

        /// Output format (defaults to the output file extension)
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// JPEG quality (1-100)
        #[arg(long)]
        quality: Option<u8>,

        /// Output pixels per canvas pixel
        #[arg(long)]
        scale: Option<f32>,

        /// Directory relative image sources are resolved against
        /// (defaults to the design file's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },
}

/// Raster format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// JPEG
    Jpeg,
    /// PNG
    Png,
}

impl From<FormatArg> for RasterFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => Self::Jpeg,
            FormatArg::Png => Self::Png,
        }
    }
}

/// Run a parsed command and return what should be printed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, an input cannot be
/// read, or the export fails.
pub fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = EditorConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match &cli.command {
        Command::Areas { template } => {
            let table = config.print_area_table();
            let areas = table.areas_for(*template);
            Ok(serde_json::to_string_pretty(areas)?)
        }
        Command::Render {
            design,
            template,
            background,
            out,
            format,
            quality,
            scale,
            assets,
        } => {
            let mut config = config;
            config.export.format = format
                .map(RasterFormat::from)
                .or_else(|| format_from_extension(out))
                .unwrap_or(config.export.format);
            if let Some(quality) = quality {
                config.export.quality = *quality;
            }
            if let Some(scale) = scale {
                config.export.scale = *scale;
            }
            config.validate()?;

            let root = assets
                .clone()
                .or_else(|| design.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            let request = RenderRequest {
                design,
                template: *template,
                background: background.as_deref(),
                out,
                root,
            };
            render(&config, &request)
        }
    }
}

struct RenderRequest<'a> {
    design: &'a Path,
    template: Option<TemplateId>,
    background: Option<&'a str>,
    out: &'a Path,
    root: PathBuf,
}

fn render(config: &EditorConfig, request: &RenderRequest<'_>) -> anyhow::Result<String> {
    let json = std::fs::read_to_string(request.design)
        .with_context(|| format!("Failed to read {}", request.design.display()))?;
    let state = CanvasState::from_json(&json).context("Invalid design document")?;

    let assets = Rc::new(AssetImageLoader::with_root(&request.root));
    let mut session = DesignSession::with_system_clock(config, assets.clone());

    let report = session.resume(&state);
    for missing in &report.missing {
        tracing::warn!("Image {} left out: {}", missing.src, missing.reason);
    }

    if let Some(template) = request.template {
        session.draw_guides_for(template);
    }
    if let Some(src) = request.background {
        session
            .apply_background(src)
            .with_context(|| format!("Failed to apply background {src}"))?;
    }

    let rasterizer = SvgRasterizer::new().with_assets(assets);
    let artifact = session.export(&rasterizer)?;

    std::fs::write(request.out, &artifact.raster)
        .with_context(|| format!("Failed to write {}", request.out.display()))?;
    let document_path = request.out.with_extension("json");
    std::fs::write(&document_path, artifact.document.to_json()?)
        .with_context(|| format!("Failed to write {}", document_path.display()))?;

    tracing::info!(
        "Rendered {} ({}x{}, {} bytes)",
        request.out.display(),
        artifact.width,
        artifact.height,
        artifact.raster.len()
    );

    let summary = serde_json::json!({
        "raster": request.out.display().to_string(),
        "document": document_path.display().to_string(),
        "format": artifact.format.extension(),
        "width": artifact.width,
        "height": artifact.height,
        "bytes": artifact.raster.len(),
        "restored": report.restored,
        "missing": report.missing.iter().map(|m| m.src.as_str()).collect::<Vec<_>>(),
    });
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn format_from_extension(path: &Path) -> Option<RasterFormat> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "png" => Some(RasterFormat::Png),
        "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
        _ => None,
    }
}
