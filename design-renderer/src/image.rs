//! Image asset loading.
//!
//! Resolves `data:` URIs and local files, reads their natural size and keeps
//! each decoded source as a base64 data URI so it can be embedded into the
//! SVG handed to resvg.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use design_core::{CanvasError, CanvasResult, CorsPolicy, ImageInfo, ImageLoader};

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::WebP,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }

    /// MIME type used in data URIs.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// A source that decoded successfully.
#[derive(Debug, Clone)]
struct LoadedAsset {
    info: ImageInfo,
    data_uri: String,
}

/// Decode the payload of a `data:` URI.
///
/// Supports base64 (`data:image/png;base64,...`) and percent-encoded payloads.
///
/// # Errors
///
/// Returns an error if the URI is malformed.
pub fn decode_data_uri(uri: &str) -> RenderResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;

    let (metadata, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    if metadata.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))
    } else {
        percent_decode(payload)
    }
}

/// Encode raw image bytes as a base64 data URI.
#[must_use]
pub fn encode_data_uri(bytes: &[u8]) -> String {
    let mime = ImageFormat::from_magic_bytes(bytes).mime();
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{encoded}")
}

/// Read the natural size of an encoded image without decoding its pixels.
///
/// # Errors
///
/// Returns an error if the format is not recognised or the header is invalid.
pub fn image_dimensions(bytes: &[u8]) -> RenderResult<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))
}

fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = input
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    Ok(result)
}

/// Default limit on the total size of cached data URIs (64 MB).
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
struct CacheEntry {
    asset: LoadedAsset,
    last_used: u64,
}

/// Size-bounded LRU cache of loaded sources.
#[derive(Debug)]
struct AssetCache {
    entries: HashMap<String, CacheEntry>,
    size_bytes: usize,
    max_bytes: usize,
    tick: u64,
    evictions: u64,
}

impl AssetCache {
    fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            size_bytes: 0,
            max_bytes,
            tick: 0,
            evictions: 0,
        }
    }

    fn get(&mut self, src: &str) -> Option<LoadedAsset> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(src).map(|entry| {
            entry.last_used = tick;
            entry.asset.clone()
        })
    }

    fn insert(&mut self, src: &str, asset: LoadedAsset) {
        let size = asset.data_uri.len();
        if size > self.max_bytes {
            tracing::debug!("Not caching {} byte asset (limit {})", size, self.max_bytes);
            return;
        }
        self.remove(src);
        while self.size_bytes + size > self.max_bytes && !self.entries.is_empty() {
            self.evict_lru();
        }
        self.tick += 1;
        self.size_bytes += size;
        self.entries.insert(
            src.to_string(),
            CacheEntry {
                asset,
                last_used: self.tick,
            },
        );
    }

    fn remove(&mut self, src: &str) {
        if let Some(entry) = self.entries.remove(src) {
            self.size_bytes -= entry.asset.data_uri.len();
        }
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.remove(&key);
            self.evictions += 1;
        }
    }
}

/// [`ImageLoader`] over data URIs and local files.
///
/// Loaded sources are kept as data URIs in an LRU cache bounded by
/// [`DEFAULT_CACHE_BYTES`] (see [`AssetImageLoader::with_cache_limit`]).
/// A cached file source is only served while the file still exists, so a
/// deleted asset is reported as missing on the next restore.
///
/// Remote `http(s)` sources are not fetched; the host downloads them and
/// hands over a data URI.
#[derive(Debug)]
pub struct AssetImageLoader {
    root: Option<PathBuf>,
    cache: RefCell<AssetCache>,
}

impl Default for AssetImageLoader {
    fn default() -> Self {
        Self {
            root: None,
            cache: RefCell::new(AssetCache::new(DEFAULT_CACHE_BYTES)),
        }
    }
}

impl AssetImageLoader {
    /// Create a loader resolving relative paths against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Limit the total size of cached data URIs to `max_bytes`.
    #[must_use]
    pub fn with_cache_limit(self, max_bytes: usize) -> Self {
        Self {
            cache: RefCell::new(AssetCache::new(max_bytes)),
            ..self
        }
    }

    /// Data URI for a source, loading it first if needed.
    ///
    /// Returns `None` if the source cannot be loaded.
    #[must_use]
    pub fn embedded_source(&self, src: &str) -> Option<String> {
        self.fetch(src).ok().map(|asset| asset.data_uri)
    }

    /// Number of cached sources.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.borrow().entries.len()
    }

    /// Total size of cached data URIs in bytes.
    #[must_use]
    pub fn cached_bytes(&self) -> usize {
        self.cache.borrow().size_bytes
    }

    /// Number of sources evicted to stay under the cache limit.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.cache.borrow().evictions
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src.strip_prefix("file://").unwrap_or(src));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn fetch(&self, src: &str) -> RenderResult<LoadedAsset> {
        let cached = self.cache.borrow_mut().get(src);
        if let Some(asset) = cached {
            if src.starts_with("data:") || self.resolve(src).is_file() {
                return Ok(asset);
            }
            tracing::debug!("Cached image source {} no longer exists", src);
            self.cache.borrow_mut().remove(src);
        }
        self.load(src)
    }

    fn load(&self, src: &str) -> RenderResult<LoadedAsset> {
        if src.starts_with("http://") || src.starts_with("https://") {
            return Err(RenderError::Resource(
                "remote sources must be fetched by the host".to_string(),
            ));
        }

        let (bytes, data_uri) = if src.starts_with("data:") {
            (decode_data_uri(src)?, src.to_string())
        } else {
            let bytes = std::fs::read(self.resolve(src))?;
            let uri = encode_data_uri(&bytes);
            (bytes, uri)
        };

        let (width, height) = image_dimensions(&bytes)?;
        let asset = LoadedAsset {
            info: ImageInfo { width, height },
            data_uri,
        };
        tracing::debug!(
            "Loaded image asset {}x{} ({} bytes)",
            width,
            height,
            bytes.len()
        );
        self.cache.borrow_mut().insert(src, asset.clone());
        Ok(asset)
    }
}

impl ImageLoader for AssetImageLoader {
    fn load_image(&self, src: &str, _cors: CorsPolicy) -> CanvasResult<ImageInfo> {
        self.fetch(src)
            .map(|asset| asset.info)
            .map_err(|e| CanvasError::asset(src, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageEncoder;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![128u8; (width * height * 4) as usize];
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(&pixels, width, height, image::ColorType::Rgba8.into())
            .expect("encode png");
        buf
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GI"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_extension("JPG"), ImageFormat::Jpeg);
    }

    #[test]
    fn test_data_uri_loads() {
        let loader = AssetImageLoader::new();
        let uri = format!("data:image/png;base64,{PNG_1X1}");
        let info = loader
            .load_image(&uri, CorsPolicy::Anonymous)
            .expect("valid data uri");
        assert_eq!(info, ImageInfo { width: 1, height: 1 });
        assert_eq!(loader.embedded_source(&uri), Some(uri));
    }

    #[test]
    fn test_invalid_data_uris() {
        assert!(decode_data_uri("not a data uri").is_err());
        assert!(decode_data_uri("data:image/png").is_err());
        assert!(decode_data_uri("data:text/plain,%zz").is_err());
        assert_eq!(
            decode_data_uri("data:text/plain,a%20b").expect("percent"),
            b"a b".to_vec()
        );

        let loader = AssetImageLoader::new();
        let err = loader
            .load_image("data:image/png;base64,AAAA", CorsPolicy::Anonymous)
            .expect_err("not an image");
        assert!(matches!(err, CanvasError::AssetLoad { .. }));
    }

    #[test]
    fn test_file_source_is_cached_as_data_uri() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("sticker.png"), png_bytes(8, 4)).expect("write png");

        let loader = AssetImageLoader::with_root(dir.path());
        let info = loader
            .load_image("sticker.png", CorsPolicy::Anonymous)
            .expect("file source");
        assert_eq!(info, ImageInfo { width: 8, height: 4 });
        assert_eq!(loader.cached(), 1);

        let embedded = loader.embedded_source("sticker.png").expect("cached");
        assert!(embedded.starts_with("data:image/png;base64,"));
        assert_eq!(loader.cached_bytes(), embedded.len());
    }

    #[test]
    fn test_deleted_file_is_not_served_from_cache() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("sticker.png");
        std::fs::write(&path, png_bytes(8, 4)).expect("write png");

        let loader = AssetImageLoader::with_root(dir.path());
        loader
            .load_image("sticker.png", CorsPolicy::Anonymous)
            .expect("file source");

        std::fs::remove_file(&path).expect("remove");
        let err = loader
            .load_image("sticker.png", CorsPolicy::Anonymous)
            .expect_err("file is gone");
        assert!(matches!(err, CanvasError::AssetLoad { .. }));
        assert!(loader.embedded_source("sticker.png").is_none());
        assert_eq!(loader.cached(), 0);
        assert_eq!(loader.cached_bytes(), 0);

        // Comes back once the file does
        std::fs::write(&path, png_bytes(2, 2)).expect("rewrite png");
        let info = loader
            .load_image("sticker.png", CorsPolicy::Anonymous)
            .expect("file restored");
        assert_eq!(info, ImageInfo { width: 2, height: 2 });
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(dir.path().join(name), png_bytes(4, 4)).expect("write png");
        }
        let entry_len = AssetImageLoader::with_root(dir.path())
            .embedded_source("a.png")
            .expect("a")
            .len();

        let loader = AssetImageLoader::with_root(dir.path()).with_cache_limit(entry_len * 2);
        loader.load_image("a.png", CorsPolicy::Anonymous).expect("a");
        loader.load_image("b.png", CorsPolicy::Anonymous).expect("b");
        // Touch a so b is the oldest
        loader.load_image("a.png", CorsPolicy::Anonymous).expect("a again");
        loader.load_image("c.png", CorsPolicy::Anonymous).expect("c");

        assert_eq!(loader.cached(), 2);
        assert_eq!(loader.evictions(), 1);
        assert!(loader.cached_bytes() <= entry_len * 2);
        let cache = loader.cache.borrow();
        assert!(cache.entries.contains_key("a.png"));
        assert!(cache.entries.contains_key("c.png"));
        assert!(!cache.entries.contains_key("b.png"));
    }

    #[test]
    fn test_oversized_source_loads_without_caching() {
        let loader = AssetImageLoader::new().with_cache_limit(16);
        let uri = format!("data:image/png;base64,{PNG_1X1}");
        let info = loader
            .load_image(&uri, CorsPolicy::Anonymous)
            .expect("valid data uri");
        assert_eq!(info, ImageInfo { width: 1, height: 1 });
        assert_eq!(loader.cached(), 0);
        assert_eq!(loader.embedded_source(&uri), Some(uri));
    }

    #[test]
    fn test_missing_and_remote_sources_fail() {
        let loader = AssetImageLoader::new();
        assert!(loader
            .load_image("/definitely/not/here.png", CorsPolicy::Anonymous)
            .is_err());
        assert!(loader
            .load_image("https://example.com/a.png", CorsPolicy::UseCredentials)
            .is_err());
        assert!(loader.embedded_source("https://example.com/a.png").is_none());
        assert_eq!(loader.cached(), 0);
    }
}
