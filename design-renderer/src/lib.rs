//! # Design Renderer
//!
//! Raster backend for the design canvas.
//!
//! ```text
//! Scene ──► SVG ──► usvg/resvg ──► tiny-skia Pixmap ──► JPEG / PNG
//!             ▲
//!   AssetImageLoader (data URIs, local files)
//! ```
//!
//! [`SvgRasterizer`] implements [`design_core::Rasterizer`] and
//! [`AssetImageLoader`] implements [`design_core::ImageLoader`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod image;

pub use error::{RenderError, RenderResult};
pub use export::SvgRasterizer;
pub use image::{
    decode_data_uri, encode_data_uri, image_dimensions, AssetImageLoader, ImageFormat,
    DEFAULT_CACHE_BYTES,
};
