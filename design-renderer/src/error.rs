//! Renderer error types.

use design_core::ExportError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rasterizing or loading assets.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The generated SVG could not be parsed.
    #[error("SVG parsing failed: {0}")]
    Svg(String),

    /// The output pixmap could not be allocated.
    #[error("Failed to create {width}x{height} pixmap")]
    Pixmap {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Encoding the raster failed.
    #[error("{format} encoding failed: {reason}")]
    Encode {
        /// Target format name.
        format: &'static str,
        /// Encoder message.
        reason: String,
    },

    /// Resource loading or decoding failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Reading an asset from disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenderError> for ExportError {
    fn from(err: RenderError) -> Self {
        ExportError::Rasterize(err.to_string())
    }
}
