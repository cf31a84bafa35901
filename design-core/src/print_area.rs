//! Print areas: the printable rectangles of each product template.
//!
//! The manager draws them as dashed guides and fills them with cover-fit,
//! clipped copies of a background image. Both object sets are found on the
//! scene by their [`ObjectRole`] tag, so no identity list has to be kept in
//! sync with undo/redo.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::{CorsPolicy, ImageLoader};
use crate::{
    Bounds, CanvasError, CanvasResult, ObjectId, ObjectKind, ObjectRole, Paint, Scene,
    SceneObject, Transform,
};

/// A printable rectangle in canvas pixels.
pub type PrintArea = Bounds;

/// Product template identifier.
pub type TemplateId = u32;

/// Side of the fallback area used for unknown templates.
pub const DEFAULT_AREA_SIZE: f32 = 300.0;

/// Guide fill color.
pub const GUIDE_FILL: &str = "rgba(0,0,0,0.05)";

/// Guide stroke color.
pub const GUIDE_STROKE: &str = "grey";

/// Template id to print-area lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintAreaTable {
    templates: BTreeMap<TemplateId, Vec<PrintArea>>,
    fallback: Vec<PrintArea>,
}

impl PrintAreaTable {
    /// Built-in product table with a fallback area centered on the canvas.
    #[must_use]
    pub fn builtin(canvas_width: f32, canvas_height: f32) -> Self {
        let mut templates = BTreeMap::new();
        // T-shirt
        templates.insert(1, vec![Bounds::new(180.0, 200.0, 150.0, 200.0)]);
        // Pants, one area per leg
        templates.insert(
            4,
            vec![
                Bounds::new(41.0, 153.0, 59.0, 389.0),
                Bounds::new(400.0, 153.0, 59.0, 389.0),
            ],
        );
        // Hoodie, left and right chest
        templates.insert(
            5,
            vec![
                Bounds::new(95.0, 250.0, 80.0, 100.0),
                Bounds::new(328.0, 250.0, 80.0, 100.0),
            ],
        );
        // Mug
        templates.insert(6, vec![Bounds::new(108.0, 180.0, 190.0, 250.0)]);
        // Phone case
        templates.insert(7, vec![Bounds::new(160.0, 208.0, 180.0, 320.0)]);

        Self {
            templates,
            fallback: vec![Bounds::new(
                (canvas_width - DEFAULT_AREA_SIZE) / 2.0,
                (canvas_height - DEFAULT_AREA_SIZE) / 2.0,
                DEFAULT_AREA_SIZE,
                DEFAULT_AREA_SIZE,
            )],
        }
    }

    /// Override (or add) the areas for one template.
    #[must_use]
    pub fn with_template(mut self, template: TemplateId, areas: Vec<PrintArea>) -> Self {
        self.templates.insert(template, areas);
        self
    }

    /// Areas for a template, or the fallback for unknown ids.
    #[must_use]
    pub fn areas_for(&self, template: TemplateId) -> &[PrintArea] {
        self.templates
            .get(&template)
            .map_or(self.fallback.as_slice(), Vec::as_slice)
    }

    /// Known template ids.
    pub fn templates(&self) -> impl Iterator<Item = TemplateId> + '_ {
        self.templates.keys().copied()
    }
}

impl Default for PrintAreaTable {
    fn default() -> Self {
        Self::builtin(
            crate::scene::DEFAULT_CANVAS_WIDTH,
            crate::scene::DEFAULT_CANVAS_HEIGHT,
        )
    }
}

/// Placement of an image scaled to cover an area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    /// Uniform scale factor.
    pub scale: f32,
    /// Left edge of the scaled image.
    pub left: f32,
    /// Top edge of the scaled image.
    pub top: f32,
}

/// Scale an image by the larger axis ratio so it covers `area`, centered.
#[must_use]
pub fn cover_fit(image_width: f32, image_height: f32, area: &PrintArea) -> CoverFit {
    let scale = (area.width / image_width).max(area.height / image_height);
    let offset_x = (image_width * scale - area.width) / 2.0;
    let offset_y = (image_height * scale - area.height) / 2.0;
    CoverFit {
        scale,
        left: area.x - offset_x,
        top: area.y - offset_y,
    }
}

/// Draws guides and manages clipped backgrounds.
#[derive(Debug, Clone, Default)]
pub struct PrintAreaManager {
    table: PrintAreaTable,
}

impl PrintAreaManager {
    /// Create a manager over a print-area table.
    #[must_use]
    pub fn new(table: PrintAreaTable) -> Self {
        Self { table }
    }

    /// Print areas for a template.
    #[must_use]
    pub fn areas_for(&self, template: TemplateId) -> &[PrintArea] {
        self.table.areas_for(template)
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &PrintAreaTable {
        &self.table
    }

    /// Replace any existing guides with one dashed outline per area, behind all content.
    pub fn draw_guides(&self, areas: &[PrintArea], scene: &mut Scene) -> Vec<ObjectId> {
        let removed = remove_by_role(scene, ObjectRole::is_guide);
        if removed > 0 {
            tracing::debug!("Replacing {removed} print-area guides");
        }

        let mut ids = Vec::with_capacity(areas.len());
        for (index, area) in areas.iter().enumerate().rev() {
            let guide = SceneObject::new(ObjectKind::Rect)
                .with_transform(Transform::at(area.x, area.y, area.width, area.height))
                .with_paint(Paint {
                    fill: Some(GUIDE_FILL.to_string()),
                    stroke: Some(GUIDE_STROKE.to_string()),
                    stroke_width: 1.0,
                    stroke_dash: vec![5.0, 5.0],
                })
                .with_interactive(false)
                .with_role(ObjectRole::Guide { area_index: index });
            let id = scene.add_object(guide);
            // Freshly added, so it is present
            let _ = scene.send_to_back(id);
            ids.push(id);
        }
        ids.reverse();
        tracing::debug!("Drew {} print-area guides", ids.len());
        ids
    }

    /// Fill every area with a cover-fit copy of `src`, clipped to the area.
    ///
    /// The previous background is removed first. The image is loaded before
    /// the scene is touched, so a failed load leaves the scene unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::AssetLoad`] if the image cannot be loaded or has no pixels.
    pub fn apply_background(
        &self,
        src: &str,
        areas: &[PrintArea],
        scene: &mut Scene,
        loader: &dyn ImageLoader,
    ) -> CanvasResult<Vec<ObjectId>> {
        let info = loader.load_image(src, CorsPolicy::Anonymous)?;
        if info.is_degenerate() {
            return Err(CanvasError::asset(src, "image has no pixels"));
        }
        #[allow(clippy::cast_precision_loss)]
        let (width, height) = (info.width as f32, info.height as f32);

        self.remove_background(scene);

        let mut ids = Vec::with_capacity(areas.len());
        for (index, area) in areas.iter().enumerate() {
            let fit = cover_fit(width, height, area);
            let copy = SceneObject::new(ObjectKind::Image {
                src: src.to_string(),
                cross_origin: CorsPolicy::Anonymous,
            })
            .with_transform(Transform::at(fit.left, fit.top, width, height).with_scale(fit.scale))
            .with_interactive(false)
            .with_role(ObjectRole::ClippedBackground { area_index: index })
            .with_clip(*area);
            let id = scene.add_object(copy);
            let _ = scene.send_to_back(id);
            ids.push(id);
        }
        tracing::debug!("Applied background {src} to {} print areas", ids.len());
        Ok(ids)
    }

    /// Remove every clipped background object. Returns how many were removed.
    pub fn remove_background(&self, scene: &mut Scene) -> usize {
        let removed = remove_by_role(scene, ObjectRole::is_clipped_background);
        if removed > 0 {
            tracing::debug!("Removed {removed} background copies");
        }
        removed
    }

    /// Ids of the clipped background objects, in render order.
    #[must_use]
    pub fn background_objects(&self, scene: &Scene) -> Vec<ObjectId> {
        objects_with_role(scene, ObjectRole::is_clipped_background)
    }

    /// Ids of the guide objects, in render order.
    #[must_use]
    pub fn guide_objects(&self, scene: &Scene) -> Vec<ObjectId> {
        objects_with_role(scene, ObjectRole::is_guide)
    }
}

fn objects_with_role(scene: &Scene, pred: fn(&ObjectRole) -> bool) -> Vec<ObjectId> {
    scene
        .objects_in_order()
        .filter(|o| pred(&o.role))
        .map(|o| o.id)
        .collect()
}

fn remove_by_role(scene: &mut Scene, pred: fn(&ObjectRole) -> bool) -> usize {
    objects_with_role(scene, pred)
        .into_iter()
        .filter(|id| scene.remove_object(*id).is_ok())
        .count()
}
