//! Editing session: one scene, its undo history and the tools that act on it.

use std::rc::Rc;

use crate::asset::{CorsPolicy, ImageLoader};
use crate::capture::ChangeCapture;
use crate::clock::{Clock, SystemClock};
use crate::config::EditorConfig;
use crate::export::{ExportArtifact, ExportRenderer, Rasterizer};
use crate::history::HistoryStore;
use crate::print_area::{PrintArea, PrintAreaManager, TemplateId};
use crate::scene::BackgroundImage;
use crate::snapshot::{CanvasState, RestoreReport, SnapshotCodec, SnapshotVersion};
use crate::{
    CanvasError, CanvasResult, ExportResult, FontStyle, FontWeight, ObjectId, ObjectKind, Paint,
    Scene, SceneObject, TextStyle, Transform,
};

/// Text placed by [`DesignSession::add_text`].
pub const DEFAULT_TEXT: &str = "Your Text Here";

/// Box a sticker is fitted into.
pub const STICKER_BOX: f32 = 100.0;

/// Line height of a single-line text box, relative to its font size.
const TEXT_LINE_HEIGHT: f32 = 1.16;

/// The design editor's state: scene, history, change capture and print areas.
pub struct DesignSession {
    scene: Scene,
    history: HistoryStore,
    codec: SnapshotCodec,
    capture: ChangeCapture,
    print_areas: PrintAreaManager,
    exporter: ExportRenderer,
    loader: Rc<dyn ImageLoader>,
    clock: Rc<dyn Clock>,
    template: Option<TemplateId>,
}

impl DesignSession {
    /// Create a session. Nothing is recorded until [`begin`](Self::begin) or
    /// [`load_template`](Self::load_template).
    #[must_use]
    pub fn new(config: &EditorConfig, loader: Rc<dyn ImageLoader>, clock: Rc<dyn Clock>) -> Self {
        Self {
            scene: Scene::new(config.canvas_width, config.canvas_height),
            history: HistoryStore::new(config.history_capacity),
            codec: SnapshotCodec::new(),
            capture: ChangeCapture::new(Rc::clone(&clock), config.debounce_window()),
            print_areas: PrintAreaManager::new(config.print_area_table()),
            exporter: ExportRenderer::new(config.export.clone()),
            loader,
            clock,
            template: None,
        }
    }

    /// Create a session on the wall clock.
    #[must_use]
    pub fn with_system_clock(config: &EditorConfig, loader: Rc<dyn ImageLoader>) -> Self {
        Self::new(config, loader, Rc::new(SystemClock))
    }

    /// Start observing the scene and record its current contents as the baseline.
    pub fn begin(&mut self) -> SnapshotVersion {
        self.capture.attach(&mut self.scene);
        self.record_snapshot()
    }

    /// Switch to a product template.
    ///
    /// The scene and history are cleared, the product picture is stretched
    /// over the canvas, guides are drawn for the template's print areas and
    /// the result is recorded as the new baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the product picture cannot be loaded; the session
    /// is left untouched.
    pub fn load_template(
        &mut self,
        template: TemplateId,
        product_image: Option<&str>,
    ) -> CanvasResult<SnapshotVersion> {
        let background = match product_image {
            Some(src) => {
                let info = self.loader.load_image(src, CorsPolicy::Anonymous)?;
                if info.is_degenerate() {
                    return Err(CanvasError::asset(src, "image has no pixels"));
                }
                #[allow(clippy::cast_precision_loss)]
                Some(BackgroundImage::stretched(
                    src,
                    info.width as f32,
                    info.height as f32,
                    self.scene.width,
                    self.scene.height,
                ))
            }
            None => None,
        };

        {
            let mut scene = self.capture.suspend(&mut self.scene);
            scene.clear();
            scene.set_background_image(background);
            let areas = self.print_areas.areas_for(template);
            self.print_areas.draw_guides(areas, &mut scene);
        }

        self.template = Some(template);
        self.history.clear();
        tracing::info!("Loaded template {template}");
        Ok(self.begin())
    }

    /// Reload the current template, discarding the design. Without a
    /// template the scene is emptied.
    ///
    /// # Errors
    ///
    /// Returns an error if the product picture cannot be reloaded.
    pub fn clear_canvas(&mut self) -> CanvasResult<SnapshotVersion> {
        let product = self.scene.background_image().map(|bg| bg.src.clone());
        match self.template {
            Some(template) => self.load_template(template, product.as_deref()),
            None => {
                {
                    let mut scene = self.capture.suspend(&mut self.scene);
                    scene.clear();
                }
                self.history.clear();
                Ok(self.begin())
            }
        }
    }

    /// Replace the scene with a saved state and start a fresh history from it.
    pub fn resume(&mut self, state: &CanvasState) -> RestoreReport {
        let report = {
            let mut scene = self.capture.suspend(&mut self.scene);
            self.codec.restore(state, &mut scene, &*self.loader)
        };
        self.history.clear();
        self.begin();
        report
    }

    /// Capture the scene and push it onto the history.
    pub fn record_snapshot(&mut self) -> SnapshotVersion {
        let state = self.codec.capture(&self.scene, self.clock.now_ms());
        let version = state.version;
        self.history.save_state(state);
        version
    }

    /// Fire the debounce timer if it is due. Returns `true` if a snapshot was recorded.
    pub fn tick(&mut self) -> bool {
        if self.capture.poll() {
            self.record_snapshot();
            true
        } else {
            false
        }
    }

    /// Step back one state. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<RestoreReport> {
        let state = self.history.undo()?;
        let mut scene = self.capture.suspend(&mut self.scene);
        let report = self.codec.restore(state, &mut scene, &*self.loader);
        tracing::debug!("Undo to {}", state.version);
        Some(report)
    }

    /// Step forward one state. Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<RestoreReport> {
        let state = self.history.redo()?;
        let mut scene = self.capture.suspend(&mut self.scene);
        let report = self.codec.restore(state, &mut scene, &*self.loader);
        tracing::debug!("Redo to {}", state.version);
        Some(report)
    }

    /// Whether there is a state to undo to.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether there is a state to redo to.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Add the default text box and make it active.
    pub fn add_text(&mut self) -> ObjectId {
        let style = TextStyle::new(DEFAULT_TEXT, 24.0);
        let height = style.font_size * TEXT_LINE_HEIGHT;
        let text = SceneObject::new(ObjectKind::Text(style))
            .with_transform(Transform::at(50.0, 50.0, 200.0, height))
            .with_paint(Paint::fill("#000"));
        self.add_active(text)
    }

    /// Add the default rectangle.
    pub fn add_rectangle(&mut self) -> ObjectId {
        self.scene.add_object(
            SceneObject::new(ObjectKind::Rect)
                .with_transform(Transform::at(100.0, 100.0, 150.0, 100.0))
                .with_paint(Paint::fill("#3498db")),
        )
    }

    /// Add the default circle.
    pub fn add_circle(&mut self) -> ObjectId {
        let radius = 50.0;
        self.scene.add_object(
            SceneObject::new(ObjectKind::Circle { radius })
                .with_transform(Transform::at(100.0, 100.0, radius * 2.0, radius * 2.0))
                .with_paint(Paint::fill("#e74c3c")),
        )
    }

    /// Add the default triangle.
    pub fn add_triangle(&mut self) -> ObjectId {
        self.scene.add_object(
            SceneObject::new(ObjectKind::Triangle)
                .with_transform(Transform::at(100.0, 100.0, 100.0, 100.0))
                .with_paint(Paint::fill("#2ecc71")),
        )
    }

    /// Add a sticker fitted into a 100 px box, centered on the canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if the sticker cannot be loaded.
    pub fn add_sticker(&mut self, src: &str) -> CanvasResult<ObjectId> {
        let (width, height) = self.natural_size(src)?;
        let scale = (STICKER_BOX / width).min(STICKER_BOX / height);
        Ok(self.add_centered_image(src, width, height, scale))
    }

    /// Add an uploaded image, scaled down to a third of the canvas width, centered.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be loaded.
    pub fn add_image(&mut self, src: &str) -> CanvasResult<ObjectId> {
        let (width, height) = self.natural_size(src)?;
        let max_width = self.scene.width / 3.0;
        let scale = if width > max_width { max_width / width } else { 1.0 };
        Ok(self.add_centered_image(src, width, height, scale))
    }

    /// Set the fill color of the active object.
    ///
    /// Returns `false` when nothing is active.
    pub fn set_text_color(&mut self, color: &str) -> bool {
        self.modify_active(|object| {
            object.paint.fill = Some(color.to_string());
            true
        })
    }

    /// Set the font family of the active text. Returns `false` if no text is active.
    pub fn set_font_family(&mut self, family: &str) -> bool {
        self.modify_active_text(|style| style.font_family = family.to_string())
    }

    /// Set the font size of the active text. Returns `false` if no text is active.
    pub fn set_font_size(&mut self, size: f32) -> bool {
        self.modify_active_text(|style| style.font_size = size)
    }

    /// Toggle bold on the active text. Returns `false` if no text is active.
    pub fn toggle_bold(&mut self) -> bool {
        self.modify_active_text(|style| {
            style.font_weight = match style.font_weight {
                FontWeight::Bold => FontWeight::Normal,
                FontWeight::Normal => FontWeight::Bold,
            };
        })
    }

    /// Toggle italic on the active text. Returns `false` if no text is active.
    pub fn toggle_italic(&mut self) -> bool {
        self.modify_active_text(|style| {
            style.font_style = match style.font_style {
                FontStyle::Italic => FontStyle::Normal,
                FontStyle::Normal => FontStyle::Italic,
            };
        })
    }

    /// Delete the active object. Deleting any background copy removes the
    /// whole background. Returns `false` when nothing is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the active object vanished from the scene.
    pub fn delete_active_object(&mut self) -> CanvasResult<bool> {
        let Some(active) = self.scene.active_object() else {
            return Ok(false);
        };
        if active.role.is_clipped_background() {
            self.print_areas.remove_background(&mut self.scene);
        } else {
            let id = active.id;
            self.scene.remove_object(id)?;
        }
        Ok(true)
    }

    /// Fill the current template's print areas with `src`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be loaded; the previous background stays.
    pub fn apply_background(&mut self, src: &str) -> CanvasResult<Vec<ObjectId>> {
        let areas = self.current_areas().to_vec();
        self.print_areas
            .apply_background(src, &areas, &mut self.scene, &*self.loader)
    }

    /// Remove the clipped background. Returns how many copies were removed.
    pub fn remove_background(&mut self) -> usize {
        self.print_areas.remove_background(&mut self.scene)
    }

    /// Switch the design to a template's print areas and redraw its guides.
    /// The design itself is kept.
    pub fn draw_guides_for(&mut self, template: TemplateId) -> Vec<ObjectId> {
        self.template = Some(template);
        let areas = self.print_areas.areas_for(template).to_vec();
        self.print_areas.draw_guides(&areas, &mut self.scene)
    }

    /// Rasterize the design and build the guide-free upload document.
    ///
    /// # Errors
    ///
    /// Returns an export error if rasterization fails or the raster is empty
    /// or too large.
    pub fn export(&mut self, rasterizer: &dyn Rasterizer) -> ExportResult<ExportArtifact> {
        let raster = self.exporter.render(&mut self.scene, rasterizer)?;
        let (width, height) = self
            .exporter
            .config()
            .output_dimensions(self.scene.width, self.scene.height);
        let document = self
            .codec
            .capture(&self.scene, self.clock.now_ms())
            .upload_document();
        Ok(ExportArtifact {
            raster,
            format: self.exporter.config().format,
            width,
            height,
            document,
        })
    }

    /// Print areas of the current template, or the fallback.
    #[must_use]
    pub fn current_areas(&self) -> &[PrintArea] {
        self.print_areas.areas_for(self.template.unwrap_or(0))
    }

    /// Selected template, if any.
    #[must_use]
    pub fn template(&self) -> Option<TemplateId> {
        self.template
    }

    /// The scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access for direct edits. Changes are captured as usual.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The undo history.
    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// The change capture.
    #[must_use]
    pub fn capture(&self) -> &ChangeCapture {
        &self.capture
    }

    /// The print-area manager.
    #[must_use]
    pub fn print_areas(&self) -> &PrintAreaManager {
        &self.print_areas
    }

    fn add_active(&mut self, object: SceneObject) -> ObjectId {
        let id = self.scene.add_object(object);
        // Just added, so it exists
        let _ = self.scene.set_active_object(Some(id));
        id
    }

    fn natural_size(&self, src: &str) -> CanvasResult<(f32, f32)> {
        let info = self.loader.load_image(src, CorsPolicy::Anonymous)?;
        if info.is_degenerate() {
            return Err(CanvasError::asset(src, "image has no pixels"));
        }
        #[allow(clippy::cast_precision_loss)]
        Ok((info.width as f32, info.height as f32))
    }

    fn add_centered_image(&mut self, src: &str, width: f32, height: f32, scale: f32) -> ObjectId {
        let left = self.scene.width / 2.0 - width * scale / 2.0;
        let top = self.scene.height / 2.0 - height * scale / 2.0;
        let image = SceneObject::new(ObjectKind::Image {
            src: src.to_string(),
            cross_origin: CorsPolicy::Anonymous,
        })
        .with_transform(Transform::at(left, top, width, height).with_scale(scale));
        self.add_active(image)
    }

    fn modify_active<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut SceneObject) -> bool,
    {
        let Some(id) = self.scene.active_object().map(|o| o.id) else {
            return false;
        };
        let mut changed = false;
        let modified = self.scene.modify_object(id, |object| changed = f(object));
        modified.is_ok() && changed
    }

    fn modify_active_text<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut TextStyle),
    {
        let is_text = self.scene.active_object().is_some_and(SceneObject::is_text);
        if !is_text {
            return false;
        }
        self.modify_active(|object| match &mut object.kind {
            ObjectKind::Text(style) => {
                f(style);
                true
            }
            _ => false,
        })
    }
}

impl std::fmt::Debug for DesignSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignSession")
            .field("template", &self.template)
            .field("objects", &self.scene.object_count())
            .field("history", &self.history.len())
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryImageLoader;
    use crate::clock::ManualClock;
    use crate::ObjectRole;

    fn session() -> (DesignSession, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new(0));
        let loader = MemoryImageLoader::new()
            .with_image("tshirt.png", 1000, 1200)
            .with_image("star.png", 400, 200)
            .with_image("photo.jpg", 600, 300)
            .with_image("small.png", 90, 60)
            .with_image("bg.png", 300, 300);
        let session = DesignSession::new(&EditorConfig::default(), Rc::new(loader), clock.clone());
        (session, clock)
    }

    #[test]
    fn test_add_text_defaults() {
        let (mut s, _clock) = session();
        s.begin();
        let id = s.add_text();

        let text = s.scene().object(id).expect("text");
        let ObjectKind::Text(style) = &text.kind else {
            panic!("expected text");
        };
        assert_eq!(style.text, DEFAULT_TEXT);
        assert!((style.font_size - 24.0).abs() < f32::EPSILON);
        assert!((text.transform.left - 50.0).abs() < f32::EPSILON);
        assert!((text.transform.width - 200.0).abs() < f32::EPSILON);
        assert_eq!(text.paint.fill.as_deref(), Some("#000"));
        assert_eq!(s.scene().active_object().map(|o| o.id), Some(id));
    }

    #[test]
    fn test_shape_defaults() {
        let (mut s, _clock) = session();
        let rect = s.add_rectangle();
        let circle = s.add_circle();
        let triangle = s.add_triangle();

        let scene = s.scene();
        assert_eq!(scene.object(rect).and_then(|o| o.paint.fill.as_deref()), Some("#3498db"));
        assert_eq!(scene.object(circle).and_then(|o| o.paint.fill.as_deref()), Some("#e74c3c"));
        assert_eq!(scene.object(triangle).and_then(|o| o.paint.fill.as_deref()), Some("#2ecc71"));
        assert!(scene.active_object().is_none());
    }

    #[test]
    fn test_sticker_fits_box_and_centers() {
        let (mut s, _clock) = session();
        let id = s.add_sticker("star.png").expect("sticker");
        let t = s.scene().object(id).expect("sticker").transform;

        assert!((t.scale_x - 0.25).abs() < f32::EPSILON);
        assert!((t.scaled_width() - 100.0).abs() < 1e-3);
        assert!((t.left - 200.0).abs() < 1e-3);
        assert!((t.top - 275.0).abs() < 1e-3);
    }

    #[test]
    fn test_uploaded_image_scaling() {
        let (mut s, _clock) = session();
        let big = s.add_image("photo.jpg").expect("photo");
        let small = s.add_image("small.png").expect("small");

        let big = s.scene().object(big).expect("photo").transform;
        assert!((big.scaled_width() - 500.0 / 3.0).abs() < 1e-3);
        let small = s.scene().object(small).expect("small").transform;
        assert!((small.scale_x - 1.0).abs() < f32::EPSILON);
        assert!(s.add_image("missing.png").is_err());
    }

    #[test]
    fn test_text_styling_only_applies_to_text() {
        let (mut s, _clock) = session();
        let text = s.add_text();
        assert!(s.toggle_bold());
        assert!(s.toggle_italic());
        assert!(s.set_font_family("Arial"));
        assert!(s.set_font_size(32.0));
        assert!(s.set_text_color("#ff0000"));

        let object = s.scene().object(text).expect("text");
        let ObjectKind::Text(style) = &object.kind else {
            panic!("expected text");
        };
        assert_eq!(style.font_weight, FontWeight::Bold);
        assert_eq!(style.font_style, FontStyle::Italic);
        assert_eq!(style.font_family, "Arial");
        assert_eq!(object.paint.fill.as_deref(), Some("#ff0000"));

        s.add_sticker("star.png").expect("sticker");
        assert!(!s.toggle_bold());
        assert!(s.set_text_color("#00ff00"));
    }

    #[test]
    fn test_load_template_draws_guides_and_baseline() {
        let (mut s, _clock) = session();
        s.add_rectangle();
        s.load_template(4, Some("tshirt.png")).expect("template");

        assert_eq!(s.template(), Some(4));
        assert_eq!(s.scene().object_count(), 2);
        assert!(s.scene().objects_in_order().all(|o| o.role.is_guide()));
        let bg = s.scene().background_image().expect("product picture");
        assert!((bg.scale_x - 0.5).abs() < f32::EPSILON);
        assert_eq!(s.history().len(), 1);
        assert!(!s.can_undo());
        assert!(s.capture().is_attached());
        assert!(!s.capture().timer().is_pending());
    }

    #[test]
    fn test_failed_template_load_leaves_session() {
        let (mut s, _clock) = session();
        s.begin();
        s.add_rectangle();
        assert!(s.load_template(1, Some("nope.png")).is_err());
        assert_eq!(s.scene().object_count(), 1);
        assert_eq!(s.template(), None);
    }

    #[test]
    fn test_repeated_template_loads_keep_one_listener() {
        let (mut s, _clock) = session();
        for template in [1, 4, 5, 1] {
            s.load_template(template, None).expect("template");
        }
        assert_eq!(s.scene().listener_count(), 1);
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn test_delete_background_copy_removes_all_copies() {
        let (mut s, _clock) = session();
        s.load_template(5, None).expect("template");
        let ids = s.apply_background("bg.png").expect("background");
        assert_eq!(ids.len(), 2);

        s.scene_mut()
            .set_active_object(Some(ids[1]))
            .expect("select copy");
        assert!(s.delete_active_object().expect("delete"));
        assert!(s
            .scene()
            .objects_in_order()
            .all(|o| !matches!(o.role, ObjectRole::ClippedBackground { .. })));
        assert_eq!(s.scene().object_count(), 2);
        assert!(!s.delete_active_object().expect("nothing active"));
    }

    #[test]
    fn test_clear_canvas_reloads_template() {
        let (mut s, clock) = session();
        s.load_template(1, Some("tshirt.png")).expect("template");
        s.add_text();
        clock.advance(std::time::Duration::from_millis(200));
        assert!(s.tick());

        s.clear_canvas().expect("clear");
        assert_eq!(s.scene().object_count(), 1);
        assert!(s.scene().background_image().is_some());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn test_draw_guides_for_switches_areas_and_keeps_design() {
        let (mut s, _clock) = session();
        s.begin();
        s.add_circle();

        let guides = s.draw_guides_for(4);
        assert_eq!(guides.len(), 2);
        assert_eq!(s.template(), Some(4));
        assert_eq!(s.current_areas().len(), 2);
        assert_eq!(s.scene().object_count(), 3);

        assert_eq!(s.draw_guides_for(1).len(), 1);
        assert_eq!(s.scene().object_count(), 2);
    }

    #[test]
    fn test_unvalidated_huge_debounce_does_not_panic_on_edit() {
        let max = u64::MAX.to_string();
        let config = EditorConfig::default().apply_env_from(|key: &str| {
            (key == crate::config::ENV_DEBOUNCE_MS).then(|| max.clone())
        });
        let clock = Rc::new(ManualClock::new(5_000));
        let mut s = DesignSession::new(&config, Rc::new(MemoryImageLoader::new()), clock.clone());

        s.begin();
        s.add_rectangle();
        clock.advance(std::time::Duration::from_secs(86_400));
        assert!(!s.tick());
        assert_eq!(s.history().len(), 1);
    }
}
