//! Raster export with print-area guides hidden.

use serde::{Deserialize, Serialize};

use crate::snapshot::CanvasState;
use crate::{ExportError, ExportResult, ObjectId, Scene};

/// Largest raster accepted for upload (5 MiB).
pub const MAX_EXPORT_BYTES: usize = 5 * 1024 * 1024;

/// Encoded raster format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// JPEG, alpha composited onto the background color.
    #[default]
    Jpeg,
    /// PNG with alpha.
    Png,
}

impl RasterFormat {
    /// MIME type of the encoded bytes.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Export quality policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output format.
    pub format: RasterFormat,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Output pixels per canvas pixel.
    pub scale: f32,
    /// Size ceiling for the encoded raster.
    pub max_bytes: usize,
    /// RGBA color behind the scene.
    pub background: [u8; 4],
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: RasterFormat::Jpeg,
            quality: 100,
            scale: 1.5,
            max_bytes: MAX_EXPORT_BYTES,
            background: [255, 255, 255, 255],
        }
    }
}

impl ExportConfig {
    /// Output size in pixels for a canvas of the given size.
    #[must_use]
    pub fn output_dimensions(&self, canvas_width: f32, canvas_height: f32) -> (u32, u32) {
        // Negative or NaN sizes saturate to zero and are rejected as empty
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let dim = |v: f32| (v * self.scale).round().max(0.0) as u32;
        (dim(canvas_width), dim(canvas_height))
    }
}

/// Turns a scene into encoded raster bytes.
pub trait Rasterizer {
    /// Rasterize every visible object on `scene`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Rasterize`] if the backend fails.
    fn rasterize(&self, scene: &Scene, config: &ExportConfig) -> ExportResult<Vec<u8>>;
}

impl<T: Rasterizer + ?Sized> Rasterizer for Box<T> {
    fn rasterize(&self, scene: &Scene, config: &ExportConfig) -> ExportResult<Vec<u8>> {
        (**self).rasterize(scene, config)
    }
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Encoded raster.
    pub raster: Vec<u8>,
    /// Encoding of `raster`.
    pub format: RasterFormat,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Guide-free scene document.
    pub document: CanvasState,
}

/// Hides guides for its lifetime and shows them again on drop.
struct GuideVisibility<'a> {
    scene: &'a mut Scene,
    hidden: Vec<ObjectId>,
}

impl<'a> GuideVisibility<'a> {
    fn hide(scene: &'a mut Scene) -> Self {
        let guides: Vec<_> = scene
            .objects_in_order()
            .filter(|o| o.role.is_guide() && o.visible)
            .map(|o| o.id)
            .collect();
        for id in &guides {
            scene.set_visible(*id, false);
        }
        Self {
            scene,
            hidden: guides,
        }
    }
}

impl Drop for GuideVisibility<'_> {
    fn drop(&mut self) {
        for id in &self.hidden {
            self.scene.set_visible(*id, true);
        }
    }
}

/// Produces the final raster of a scene.
#[derive(Debug, Clone, Default)]
pub struct ExportRenderer {
    config: ExportConfig,
}

impl ExportRenderer {
    /// Create a renderer with the given policy.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// The export policy.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Rasterize `scene` with guides hidden.
    ///
    /// Guide visibility is restored before returning, on success and failure.
    ///
    /// # Errors
    ///
    /// - [`ExportError::EmptyRaster`] for a zero-area output or zero bytes
    /// - [`ExportError::SizeExceeded`] when the raster is above the ceiling
    /// - [`ExportError::Rasterize`] when the backend fails
    pub fn render(&self, scene: &mut Scene, rasterizer: &dyn Rasterizer) -> ExportResult<Vec<u8>> {
        let (width, height) = self.config.output_dimensions(scene.width, scene.height);
        if width == 0 || height == 0 {
            return Err(ExportError::EmptyRaster {
                width,
                height,
                bytes: 0,
            });
        }

        let guard = GuideVisibility::hide(scene);
        tracing::debug!(
            "Exporting {width}x{height} {:?} with {} guides hidden",
            self.config.format,
            guard.hidden.len()
        );
        let bytes = rasterizer.rasterize(&*guard.scene, &self.config)?;
        drop(guard);

        if bytes.is_empty() {
            return Err(ExportError::EmptyRaster {
                width,
                height,
                bytes: 0,
            });
        }
        if bytes.len() > self.config.max_bytes {
            tracing::warn!(
                "Export rejected: {} bytes over the {} byte limit",
                bytes.len(),
                self.config.max_bytes
            );
            return Err(ExportError::SizeExceeded {
                size: bytes.len(),
                limit: self.config.max_bytes,
            });
        }

        tracing::info!("Exported {} bytes", bytes.len());
        Ok(bytes)
    }
}
