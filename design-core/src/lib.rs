//! # Design Core
//!
//! State and history engine for the product design canvas.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  DesignSession                   │
//! ├──────────────────────────────────────────────────┤
//! │  Scene            │  ChangeCapture (debounced)   │
//! │  - Objects        │    → SnapshotCodec           │
//! │  - Render order   │    → HistoryStore            │
//! │  - Mutation hooks │  undo/redo → restore         │
//! ├──────────────────────────────────────────────────┤
//! │  PrintAreaManager │  ExportRenderer              │
//! │  - Guides         │  - Guides hidden             │
//! │  - Clipped bg     │  - Size ceiling              │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Rasterization and image decoding are behind the [`Rasterizer`] and
//! [`ImageLoader`] traits; `design-renderer` provides the real backends.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod asset;
pub mod capture;
pub mod clock;
pub mod config;
pub mod element;
pub mod error;
pub mod export;
pub mod history;
pub mod print_area;
pub mod scene;
pub mod session;
pub mod snapshot;

pub use asset::{CorsPolicy, ImageInfo, ImageLoader, MemoryImageLoader};
pub use capture::{CaptureTimer, ChangeCapture, SuspendedCapture, DEFAULT_DEBOUNCE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EditorConfig;
pub use element::{
    Bounds, FontStyle, FontWeight, ObjectId, ObjectKind, ObjectRole, Paint, SceneObject,
    TextAlign, TextStyle, Transform,
};
pub use error::{CanvasError, CanvasResult, ExportError, ExportResult};
pub use export::{
    ExportArtifact, ExportConfig, ExportRenderer, RasterFormat, Rasterizer, MAX_EXPORT_BYTES,
};
pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use print_area::{cover_fit, CoverFit, PrintArea, PrintAreaManager, PrintAreaTable, TemplateId};
pub use scene::{BackgroundImage, ListenerId, Scene, SceneMutation};
pub use session::DesignSession;
pub use snapshot::{
    CanvasState, MissingAsset, ObjectDocument, RestoreReport, SnapshotCodec, SnapshotVersion,
};

/// Design core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
