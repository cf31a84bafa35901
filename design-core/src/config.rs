//! Editor configuration.
//!
//! Layered from lowest to highest precedence: built-in defaults, an optional
//! JSON file, then environment variables:
//! - `DESIGN_HISTORY_CAPACITY`: retained undo states (default: 50)
//! - `DESIGN_DEBOUNCE_MS`: change-capture quiescence window (default: 150)
//! - `DESIGN_MAX_EXPORT_BYTES`: export size ceiling (default: 5 MiB)

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::DEFAULT_DEBOUNCE_MS;
use crate::export::ExportConfig;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::print_area::{PrintArea, PrintAreaTable, TemplateId};
use crate::scene::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use crate::{CanvasError, CanvasResult};

/// Environment variable overriding [`EditorConfig::history_capacity`].
pub const ENV_HISTORY_CAPACITY: &str = "DESIGN_HISTORY_CAPACITY";
/// Environment variable overriding [`EditorConfig::debounce_ms`].
pub const ENV_DEBOUNCE_MS: &str = "DESIGN_DEBOUNCE_MS";
/// Environment variable overriding the export size ceiling.
pub const ENV_MAX_EXPORT_BYTES: &str = "DESIGN_MAX_EXPORT_BYTES";

/// Longest accepted change-capture quiescence window, in milliseconds.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Settings for one editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Canvas width in pixels.
    pub canvas_width: f32,
    /// Canvas height in pixels.
    pub canvas_height: f32,
    /// Undo states retained.
    pub history_capacity: usize,
    /// Change-capture quiescence window in milliseconds.
    pub debounce_ms: u64,
    /// Raster export policy.
    pub export: ExportConfig,
    /// Per-template print-area overrides.
    pub print_areas: BTreeMap<TemplateId, Vec<PrintArea>>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            export: ExportConfig::default(),
            print_areas: BTreeMap::new(),
        }
    }
}

impl EditorConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an invalid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> CanvasResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!("Loaded editor config from {}", path.display());
        Ok(config)
    }

    /// Defaults, overlaid with the optional file, overlaid with the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is given but cannot be loaded, or if the
    /// merged configuration is invalid.
    pub fn load(path: Option<&Path>) -> CanvasResult<Self> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env().validated()
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Config`] describing the first invalid value.
    pub fn validated(self) -> CanvasResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Apply overrides from process environment variables.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Unparsable values are ignored.
    #[must_use]
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_HISTORY_CAPACITY) {
            self.history_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_DEBOUNCE_MS) {
            self.debounce_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_EXPORT_BYTES) {
            self.export.max_bytes = v;
        }
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Config`] describing the first invalid value.
    pub fn validate(&self) -> CanvasResult<()> {
        if !is_positive(self.canvas_width) || !is_positive(self.canvas_height) {
            return Err(CanvasError::Config(format!(
                "canvas size must be positive, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(CanvasError::Config(format!(
                "debounce window must be at most {MAX_DEBOUNCE_MS} ms, got {}",
                self.debounce_ms
            )));
        }
        if !(1..=100).contains(&self.export.quality) {
            return Err(CanvasError::Config(format!(
                "export quality must be 1-100, got {}",
                self.export.quality
            )));
        }
        if !is_positive(self.export.scale) {
            return Err(CanvasError::Config(format!(
                "export scale must be positive, got {}",
                self.export.scale
            )));
        }
        Ok(())
    }

    /// Change-capture quiescence window.
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Built-in print-area table with this config's overrides applied.
    #[must_use]
    pub fn print_area_table(&self) -> PrintAreaTable {
        self.print_areas.iter().fold(
            PrintAreaTable::builtin(self.canvas_width, self.canvas_height),
            |table, (template, areas)| table.with_template(*template, areas.clone()),
        )
    }
}

/// False for zero, negative and NaN.
fn is_positive(v: f32) -> bool {
    v > 0.0
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {key}={raw}: not a valid number");
            None
        }
    }
}
