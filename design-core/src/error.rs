//! Error types for canvas operations.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Result type for raster export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur in canvas operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Object not found in scene.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Snapshot serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An image asset could not be loaded.
    #[error("Failed to load image {src}: {reason}")]
    AssetLoad {
        /// The image source that failed.
        src: String,
        /// Why loading failed.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An I/O error occurred while reading configuration or snapshots.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CanvasError {
    /// Build an asset load error.
    pub fn asset(src: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetLoad {
            src: src.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the export pipeline.
///
/// These are distinct from the transport errors of whatever service the
/// raster is uploaded to afterwards.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The rasterizer produced no usable pixels.
    #[error("Canvas produced an empty image ({width}x{height}, {bytes} bytes)")]
    EmptyRaster {
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
        /// Encoded size in bytes.
        bytes: usize,
    },

    /// The encoded raster is larger than the configured ceiling.
    #[error("Image is too large ({size} bytes, limit {limit} bytes). Please reduce canvas size or image quality.")]
    SizeExceeded {
        /// Encoded size in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// The rasterizer backend failed.
    #[error("Canvas conversion failed: {0}")]
    Rasterize(String),
}

impl ExportError {
    /// Size of the rejected raster in whole MiB, rounded, for user messages.
    #[must_use]
    pub fn size_mib(&self) -> Option<usize> {
        match self {
            Self::SizeExceeded { size, .. } => Some((size + 512 * 1024) / (1024 * 1024)),
            _ => None,
        }
    }
}
