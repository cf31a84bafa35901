//! Scene rasterization.
//!
//! Renders a [`Scene`] through an SVG intermediate representation and the
//! resvg/tiny-skia pipeline, then encodes JPEG or PNG.

use std::fmt::Write;
use std::rc::Rc;
use std::sync::Arc;

use design_core::{
    ExportConfig, ExportResult, ObjectKind, Paint, RasterFormat, Rasterizer, Scene, SceneObject,
    TextAlign, TextStyle,
};
use image::ImageEncoder;

use crate::error::{RenderError, RenderResult};
use crate::image::AssetImageLoader;

/// Rasterizes scenes with resvg.
pub struct SvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    assets: Option<Rc<AssetImageLoader>>,
}

impl SvgRasterizer {
    /// Create a rasterizer using the system fonts. Only `data:` image
    /// sources are drawn.
    #[must_use]
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!("Loaded {} font faces", fontdb.len());
        Self {
            fontdb: Arc::new(fontdb),
            assets: None,
        }
    }

    /// Resolve image sources through `assets` so files can be embedded.
    #[must_use]
    pub fn with_assets(mut self, assets: Rc<AssetImageLoader>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Render the scene to encoded bytes in the configured format.
    ///
    /// # Errors
    ///
    /// Returns an error if the SVG cannot be rasterized or encoded.
    pub fn render(&self, scene: &Scene, config: &ExportConfig) -> RenderResult<Vec<u8>> {
        let svg = self.render_to_svg(scene, config);
        let pixmap = self.rasterize_svg(&svg)?;
        match config.format {
            RasterFormat::Png => pixmap.encode_png().map_err(|e| RenderError::Encode {
                format: "PNG",
                reason: e.to_string(),
            }),
            RasterFormat::Jpeg => encode_jpeg(&pixmap, config),
        }
    }

    /// Build the SVG document for a scene. Hidden objects are skipped.
    #[must_use]
    pub fn render_to_svg(&self, scene: &Scene, config: &ExportConfig) -> String {
        let (out_w, out_h) = config.output_dimensions(scene.width, scene.height);
        let (view_w, view_h) = (scene.width, scene.height);

        let mut svg = String::with_capacity(4096);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" width=\"{out_w}\" height=\"{out_h}\" viewBox=\"0 0 {view_w} {view_h}\">",
        );

        let bg = &config.background;
        let bg_alpha = f32::from(bg[3]) / 255.0;
        let _ = write!(
            svg,
            "<rect width=\"100%\" height=\"100%\" fill=\"rgb({},{},{})\" fill-opacity=\"{bg_alpha}\"/>",
            bg[0], bg[1], bg[2],
        );

        if let Some(color) = scene.background_color() {
            let _ = write!(
                svg,
                "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
                escape_xml(color)
            );
        }

        if let Some(image) = scene.background_image() {
            match self.image_href(&image.src) {
                Some(href) => {
                    let _ = write!(
                        svg,
                        "<image width=\"{}\" height=\"{}\" transform=\"scale({} {})\" preserveAspectRatio=\"none\" xlink:href=\"{}\"/>",
                        image.width,
                        image.height,
                        image.scale_x,
                        image.scale_y,
                        escape_xml(&href),
                    );
                }
                None => tracing::warn!("Canvas background {} not embeddable, skipped", image.src),
            }
        }

        for (index, object) in scene.objects_in_order().enumerate() {
            if !object.visible {
                continue;
            }
            self.render_object_svg(&mut svg, index, object);
        }

        svg.push_str("</svg>");
        svg
    }

    fn render_object_svg(&self, svg: &mut String, index: usize, object: &SceneObject) {
        tracing::trace!("Rendering {} {}", object.kind.type_name(), object.id);

        let shape = match &object.kind {
            ObjectKind::Rect => format!(
                "<rect width=\"{}\" height=\"{}\"{}/>",
                object.transform.width,
                object.transform.height,
                paint_attrs(&object.paint),
            ),
            ObjectKind::Circle { radius } => format!(
                "<circle cx=\"{radius}\" cy=\"{radius}\" r=\"{radius}\"{}/>",
                paint_attrs(&object.paint),
            ),
            ObjectKind::Triangle => {
                let (w, h) = (object.transform.width, object.transform.height);
                format!(
                    "<polygon points=\"{},0 {w},{h} 0,{h}\"{}/>",
                    w / 2.0,
                    paint_attrs(&object.paint),
                )
            }
            ObjectKind::Text(style) => text_svg(style, object.transform.width, &object.paint),
            ObjectKind::Image { src, .. } => {
                let Some(href) = self.image_href(src) else {
                    tracing::warn!("Image {} not embeddable, skipped", object.id);
                    return;
                };
                format!(
                    "<image width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" xlink:href=\"{}\"/>",
                    object.transform.width,
                    object.transform.height,
                    escape_xml(&href),
                )
            }
        };

        let tf = &object.transform;
        let placed = format!(
            "<g transform=\"translate({} {}) rotate({}) scale({} {})\">{shape}</g>",
            tf.left, tf.top, tf.angle, tf.scale_x, tf.scale_y,
        );

        // Clip rectangles are absolute, so the clip wraps the transformed group
        match object.clip {
            Some(clip) => {
                let _ = write!(
                    svg,
                    "<defs><clipPath id=\"clip-{index}\" clipPathUnits=\"userSpaceOnUse\"><rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/></clipPath></defs><g clip-path=\"url(#clip-{index})\">{placed}</g>",
                    clip.x, clip.y, clip.width, clip.height,
                );
            }
            None => svg.push_str(&placed),
        }
    }

    fn image_href(&self, src: &str) -> Option<String> {
        if src.starts_with("data:") {
            return Some(src.to_string());
        }
        self.assets
            .as_ref()
            .and_then(|assets| assets.embedded_source(src))
    }

    /// Rasterize an SVG string to a tiny-skia Pixmap.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rasterize_svg(&self, svg: &str) -> RenderResult<tiny_skia::Pixmap> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree =
            usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Svg(e.to_string()))?;

        let px_w = tree.size().width().round() as u32;
        let px_h = tree.size().height().round() as u32;

        let mut pixmap = tiny_skia::Pixmap::new(px_w, px_h).ok_or(RenderError::Pixmap {
            width: px_w,
            height: px_h,
        })?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        Ok(pixmap)
    }
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgRasterizer")
            .field("font_faces", &self.fontdb.len())
            .field("assets", &self.assets.is_some())
            .finish_non_exhaustive()
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, scene: &Scene, config: &ExportConfig) -> ExportResult<Vec<u8>> {
        Ok(self.render(scene, config)?)
    }
}

/// Composite the premultiplied pixmap over the background and encode JPEG.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_jpeg(pixmap: &tiny_skia::Pixmap, config: &ExportConfig) -> RenderResult<Vec<u8>> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let bg = &config.background;
    let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
    for pixel in pixmap.data().chunks_exact(4) {
        let inv = 1.0 - f32::from(pixel[3]) / 255.0;
        for channel in 0..3 {
            let value = f32::from(bg[channel]).mul_add(inv, f32::from(pixel[channel]));
            rgb_data.push(value.round().min(255.0) as u8);
        }
    }

    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, config.quality);
    encoder
        .write_image(&rgb_data, width, height, image::ColorType::Rgb8.into())
        .map_err(|e| RenderError::Encode {
            format: "JPEG",
            reason: e.to_string(),
        })?;

    Ok(buf.into_inner())
}

fn paint_attrs(paint: &Paint) -> String {
    let mut attrs = String::new();
    match &paint.fill {
        Some(fill) => {
            let _ = write!(attrs, " fill=\"{}\"", escape_xml(fill));
        }
        None => attrs.push_str(" fill=\"none\""),
    }
    if let Some(stroke) = &paint.stroke {
        let _ = write!(
            attrs,
            " stroke=\"{}\" stroke-width=\"{}\"",
            escape_xml(stroke),
            paint.stroke_width
        );
        if !paint.stroke_dash.is_empty() {
            let dash: Vec<String> = paint.stroke_dash.iter().map(ToString::to_string).collect();
            let _ = write!(attrs, " stroke-dasharray=\"{}\"", dash.join(" "));
        }
    }
    attrs
}

fn text_svg(style: &TextStyle, box_width: f32, paint: &Paint) -> String {
    let (x, anchor) = match style.text_align {
        TextAlign::Left => (0.0, "start"),
        TextAlign::Center => (box_width / 2.0, "middle"),
        TextAlign::Right => (box_width, "end"),
    };
    let weight = match style.font_weight {
        design_core::FontWeight::Normal => "normal",
        design_core::FontWeight::Bold => "bold",
    };
    let font_style = match style.font_style {
        design_core::FontStyle::Normal => "normal",
        design_core::FontStyle::Italic => "italic",
    };
    format!(
        "<text x=\"{x}\" y=\"{}\" font-size=\"{}\" font-family=\"{}\" font-weight=\"{weight}\" font-style=\"{font_style}\" text-anchor=\"{anchor}\"{}>{}</text>",
        style.font_size,
        style.font_size,
        escape_xml(&style.font_family),
        paint_attrs(paint),
        escape_xml(&style.text),
    )
}

/// Escape special XML characters.
fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
