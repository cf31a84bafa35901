//! Image loading seam.
//!
//! Loading bitmap sources (stickers, backgrounds, uploaded photos) is the host's
//! job; the core only needs to know whether a source is available and its
//! natural size.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasResult};

/// Cross-origin policy requested when loading an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorsPolicy {
    /// Anonymous cross-origin request, keeps the canvas exportable.
    #[default]
    Anonymous,
    /// Cross-origin request with credentials.
    UseCredentials,
}

/// Natural dimensions of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageInfo {
    /// Whether the image has no pixels.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Loads images by source.
pub trait ImageLoader {
    /// Load an image and report its natural size.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::AssetLoad`] if the source cannot be loaded.
    fn load_image(&self, src: &str, cors: CorsPolicy) -> CanvasResult<ImageInfo>;
}

impl<T: ImageLoader + ?Sized> ImageLoader for Rc<T> {
    fn load_image(&self, src: &str, cors: CorsPolicy) -> CanvasResult<ImageInfo> {
        (**self).load_image(src, cors)
    }
}

impl<T: ImageLoader + ?Sized> ImageLoader for Box<T> {
    fn load_image(&self, src: &str, cors: CorsPolicy) -> CanvasResult<ImageInfo> {
        (**self).load_image(src, cors)
    }
}

/// Image loader over a fixed set of preloaded sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageLoader {
    images: HashMap<String, ImageInfo>,
}

impl MemoryImageLoader {
    /// Create an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with its size.
    #[must_use]
    pub fn with_image(mut self, src: impl Into<String>, width: u32, height: u32) -> Self {
        self.insert(src, width, height);
        self
    }

    /// Register a source with its size.
    pub fn insert(&mut self, src: impl Into<String>, width: u32, height: u32) {
        self.images.insert(src.into(), ImageInfo { width, height });
    }

    /// Forget a source, so later loads of it fail.
    pub fn remove(&mut self, src: &str) -> bool {
        self.images.remove(src).is_some()
    }
}

impl ImageLoader for MemoryImageLoader {
    fn load_image(&self, src: &str, _cors: CorsPolicy) -> CanvasResult<ImageInfo> {
        self.images
            .get(src)
            .copied()
            .ok_or_else(|| CanvasError::asset(src, "not available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let loader = MemoryImageLoader::new().with_image("a.png", 10, 20);
        let info = loader
            .load_image("a.png", CorsPolicy::Anonymous)
            .expect("known source");
        assert_eq!(info, ImageInfo { width: 10, height: 20 });

        let err = loader
            .load_image("b.png", CorsPolicy::Anonymous)
            .expect_err("unknown source");
        assert!(matches!(err, CanvasError::AssetLoad { ref src, .. } if src == "b.png"));
    }

    #[test]
    fn test_shared_loader_delegates() {
        let loader = Rc::new(MemoryImageLoader::new().with_image("x", 1, 1));
        let boxed: Box<dyn ImageLoader> = Box::new(Rc::clone(&loader));
        assert!(boxed.load_image("x", CorsPolicy::Anonymous).is_ok());
    }

    #[test]
    fn test_degenerate_image() {
        assert!(ImageInfo { width: 0, height: 5 }.is_degenerate());
        assert!(!ImageInfo { width: 1, height: 1 }.is_degenerate());
    }
}
