//! Snapshot codec: captures the live scene into an immutable [`CanvasState`]
//! and replays a state back onto a scene.

use serde::{Deserialize, Serialize};

use crate::asset::ImageLoader;
use crate::scene::BackgroundImage;
use crate::{Bounds, CanvasResult, ObjectId, ObjectKind, ObjectRole, Paint, Scene, SceneObject, Transform};

/// Opaque, monotonically increasing snapshot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(u64);

impl SnapshotVersion {
    /// Raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Serialized object attributes. The field list is the snapshot allow-list:
/// selection and visibility are transient and never captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDocument {
    /// Object identifier.
    pub id: ObjectId,
    /// Object content.
    pub kind: ObjectKind,
    /// Geometry.
    #[serde(default)]
    pub transform: Transform,
    /// Fill and stroke.
    #[serde(default)]
    pub paint: Paint,
    /// Selectability.
    #[serde(default = "ObjectDocument::default_interactive")]
    pub selectable: bool,
    /// Pointer interactivity.
    #[serde(default = "ObjectDocument::default_interactive")]
    pub evented: bool,
    /// Guide / clipped background tag.
    #[serde(default)]
    pub role: ObjectRole,
    /// Absolute clip rectangle.
    #[serde(default)]
    pub clip: Option<Bounds>,
}

impl ObjectDocument {
    const fn default_interactive() -> bool {
        true
    }

    /// Convert document to a live, visible scene object.
    #[must_use]
    pub fn to_object(&self) -> SceneObject {
        SceneObject {
            id: self.id,
            kind: self.kind.clone(),
            transform: self.transform,
            paint: self.paint.clone(),
            selectable: self.selectable,
            evented: self.evented,
            visible: true,
            role: self.role,
            clip: self.clip,
        }
    }
}

impl From<&SceneObject> for ObjectDocument {
    fn from(object: &SceneObject) -> Self {
        Self {
            id: object.id,
            kind: object.kind.clone(),
            transform: object.transform,
            paint: object.paint.clone(),
            selectable: object.selectable,
            evented: object.evented,
            role: object.role,
            clip: object.clip,
        }
    }
}

/// Immutable, self-describing snapshot of a scene.
///
/// Unknown fields are ignored and every field added after the first release
/// carries a serde default, so older readers and newer writers interoperate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// Snapshot token.
    pub version: SnapshotVersion,
    /// Capture time in milliseconds.
    #[serde(default)]
    pub captured_at_ms: u64,
    /// Objects in render order.
    pub objects: Vec<ObjectDocument>,
    /// Canvas background color.
    #[serde(default)]
    pub background: Option<String>,
    /// Canvas background picture.
    #[serde(default)]
    pub background_image: Option<BackgroundImage>,
    /// Canvas width in pixels.
    pub width: f32,
    /// Canvas height in pixels.
    pub height: f32,
}

impl CanvasState {
    /// Number of captured objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Copy of this state without print-area guides, for sending to the backend.
    #[must_use]
    pub fn upload_document(&self) -> Self {
        Self {
            objects: self
                .objects
                .iter()
                .filter(|doc| !doc.role.is_guide())
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid snapshot.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// An image that could not be reloaded during restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAsset {
    /// Owning object, `None` for the canvas background picture.
    pub object: Option<ObjectId>,
    /// Image source.
    pub src: String,
    /// Loader error message.
    pub reason: String,
}

/// Outcome of [`SnapshotCodec::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Objects placed on the scene.
    pub restored: usize,
    /// Images dropped because their source failed to load.
    pub missing: Vec<MissingAsset>,
}

impl RestoreReport {
    /// Whether every object and background was restored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Converts between live scenes and snapshots.
#[derive(Debug, Default)]
pub struct SnapshotCodec {
    last_version: u64,
}

impl SnapshotCodec {
    /// Create a codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every object on the scene in render order and stamp a new version.
    pub fn capture(&mut self, scene: &Scene, captured_at_ms: u64) -> CanvasState {
        self.last_version += 1;
        let state = CanvasState {
            version: SnapshotVersion(self.last_version),
            captured_at_ms,
            objects: scene.objects_in_order().map(ObjectDocument::from).collect(),
            background: scene.background_color().map(str::to_string),
            background_image: scene.background_image().cloned(),
            width: scene.width,
            height: scene.height,
        };
        tracing::debug!(
            "Captured snapshot {} with {} objects",
            state.version,
            state.object_count()
        );
        state
    }

    /// Replace the scene's objects and background with those described by `state`.
    ///
    /// Image objects whose source no longer loads are left out and listed in
    /// the report; the rest of the state is still applied.
    pub fn restore(
        &self,
        state: &CanvasState,
        scene: &mut Scene,
        loader: &dyn ImageLoader,
    ) -> RestoreReport {
        let mut report = RestoreReport::default();
        let mut objects = Vec::with_capacity(state.objects.len());

        for doc in &state.objects {
            if let ObjectKind::Image { src, cross_origin } = &doc.kind {
                if let Err(e) = loader.load_image(src, *cross_origin) {
                    tracing::warn!("Dropping image {} from restore: {e}", doc.id);
                    report.missing.push(MissingAsset {
                        object: Some(doc.id),
                        src: src.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
            objects.push(doc.to_object());
        }

        let background_image = match &state.background_image {
            Some(image) => match loader.load_image(&image.src, crate::CorsPolicy::Anonymous) {
                Ok(_) => Some(image.clone()),
                Err(e) => {
                    tracing::warn!("Dropping canvas background from restore: {e}");
                    report.missing.push(MissingAsset {
                        object: None,
                        src: image.src.clone(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        report.restored = objects.len();
        scene.width = state.width;
        scene.height = state.height;
        scene.replace_all(objects, state.background.clone(), background_image);
        tracing::debug!(
            "Restored snapshot {} ({} objects, {} missing assets)",
            state.version,
            report.restored,
            report.missing.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryImageLoader;
    use crate::{CorsPolicy, TextStyle};

    fn sample_scene() -> Scene {
        let mut scene = Scene::new(500.0, 600.0);
        scene.set_background_color(Some("#fafafa".to_string()));
        scene.add_object(
            SceneObject::new(ObjectKind::Rect)
                .with_transform(Transform::at(180.0, 200.0, 150.0, 200.0))
                .with_paint(Paint {
                    fill: Some("rgba(0,0,0,0.05)".to_string()),
                    stroke: Some("grey".to_string()),
                    stroke_width: 1.0,
                    stroke_dash: vec![5.0, 5.0],
                })
                .with_interactive(false)
                .with_role(ObjectRole::Guide { area_index: 0 }),
        );
        scene.add_object(
            SceneObject::new(ObjectKind::Text(TextStyle::new("Hello", 24.0)))
                .with_transform(Transform::at(50.0, 50.0, 200.0, 30.0))
                .with_paint(Paint::fill("#000")),
        );
        scene.add_object(
            SceneObject::new(ObjectKind::Image {
                src: "sticker.png".to_string(),
                cross_origin: CorsPolicy::Anonymous,
            })
            .with_transform(Transform::at(200.0, 250.0, 512.0, 512.0).with_scale(0.2)),
        );
        scene
    }

    fn loader() -> MemoryImageLoader {
        MemoryImageLoader::new().with_image("sticker.png", 512, 512)
    }

    #[test]
    fn test_capture_is_ordered_and_versioned() {
        let scene = sample_scene();
        let mut codec = SnapshotCodec::new();

        let first = codec.capture(&scene, 10);
        let second = codec.capture(&scene, 20);

        assert!(second.version > first.version);
        assert_eq!(first.object_count(), 3);
        let kinds: Vec<_> = first.objects.iter().map(|d| d.kind.type_name()).collect();
        assert_eq!(kinds, vec!["rect", "text", "image"]);
        assert_eq!(first.background.as_deref(), Some("#fafafa"));
    }

    #[test]
    fn test_round_trip_restores_equivalent_scene() {
        let source = sample_scene();
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&source, 0);

        let mut target = Scene::new(10.0, 10.0);
        let report = codec.restore(&state, &mut target, &loader());

        assert!(report.is_complete());
        assert_eq!(report.restored, 3);
        let a: Vec<_> = source.objects_in_order().collect();
        let b: Vec<_> = target.objects_in_order().collect();
        assert_eq!(a, b);
        assert!((target.width - 500.0).abs() < f32::EPSILON);
        assert_eq!(target.background_color(), Some("#fafafa"));
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&sample_scene(), 0);

        let mut scene = Scene::default();
        codec.restore(&state, &mut scene, &loader());
        let once: Vec<_> = scene.objects_in_order().cloned().collect();
        codec.restore(&state, &mut scene, &loader());
        let twice: Vec<_> = scene.objects_in_order().cloned().collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_restore_drops_unloadable_images() {
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&sample_scene(), 0);

        let mut scene = Scene::default();
        let report = codec.restore(&state, &mut scene, &MemoryImageLoader::new());

        assert_eq!(report.restored, 2);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].src, "sticker.png");
        assert!(scene.objects_in_order().all(|o| !matches!(o.kind, ObjectKind::Image { .. })));
    }

    #[test]
    fn test_restore_drops_unloadable_background_picture() {
        let mut source = sample_scene();
        source.set_background_image(Some(BackgroundImage::stretched(
            "tshirt.png",
            1000.0,
            1200.0,
            500.0,
            600.0,
        )));
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&source, 0);

        let mut scene = Scene::default();
        let report = codec.restore(&state, &mut scene, &loader());
        assert_eq!(report.missing.len(), 1);
        assert!(report.missing[0].object.is_none());
        assert!(scene.background_image().is_none());
        assert_eq!(scene.object_count(), 3);
    }

    #[test]
    fn test_visibility_is_not_captured() {
        let mut scene = sample_scene();
        let guide = scene.objects_in_order().next().map(|o| o.id).expect("guide");
        scene.set_visible(guide, false);

        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&scene, 0);
        let mut restored = Scene::default();
        codec.restore(&state, &mut restored, &loader());

        assert!(restored.objects_in_order().all(|o| o.visible));
    }

    #[test]
    fn test_upload_document_strips_guides() {
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&sample_scene(), 0);
        let upload = state.upload_document();

        assert_eq!(upload.object_count(), 2);
        assert!(upload.objects.iter().all(|d| !d.role.is_guide()));
        assert_eq!(state.object_count(), 3);
    }

    #[test]
    fn test_json_ignores_unknown_fields_and_defaults_new_ones() {
        let json = r#"{
            "version": 7,
            "objects": [{
                "id": "6a2f41a3-c54d-4b8f-9c3a-2d9c8a6b1e11",
                "kind": {"type": "rect"},
                "future_field": 42
            }],
            "width": 500,
            "height": 600,
            "thumbnail": "ignored"
        }"#;

        let state = CanvasState::from_json(json).expect("forward compatible");
        assert_eq!(state.version.get(), 7);
        assert_eq!(state.captured_at_ms, 0);
        assert!(state.background.is_none());
        let doc = &state.objects[0];
        assert!(doc.selectable && doc.evented);
        assert_eq!(doc.role, ObjectRole::Content);
        assert!((doc.transform.scale_x - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_json_round_trip() {
        let mut codec = SnapshotCodec::new();
        let state = codec.capture(&sample_scene(), 99);
        let json = state.to_json().expect("serialize");
        let back = CanvasState::from_json(&json).expect("deserialize");
        assert_eq!(state, back);
    }

    mod proptest_tests {
        use super::*;
        use crate::{CorsPolicy, FontStyle, FontWeight, TextAlign, TextStyle};
        use proptest::prelude::*;

        const SOURCES: [&str; 3] = ["a.png", "b.jpg", "c.webp"];

        fn arb_coord() -> impl Strategy<Value = f32> {
            -1000.0f32..1000.0f32
        }

        fn arb_text() -> impl Strategy<Value = TextStyle> {
            (
                "[a-zA-Z0-9 ]{0,24}",
                1.0f32..200.0,
                prop::sample::select(vec!["Arial", "Times New Roman", "Courier"]),
                any::<bool>(),
                any::<bool>(),
                prop::sample::select(vec![TextAlign::Left, TextAlign::Center, TextAlign::Right]),
            )
                .prop_map(|(text, font_size, family, bold, italic, text_align)| TextStyle {
                    text,
                    font_size,
                    font_family: family.to_string(),
                    font_weight: if bold { FontWeight::Bold } else { FontWeight::Normal },
                    font_style: if italic { FontStyle::Italic } else { FontStyle::Normal },
                    text_align,
                })
        }

        fn arb_kind() -> impl Strategy<Value = ObjectKind> {
            prop_oneof![
                arb_text().prop_map(ObjectKind::Text),
                Just(ObjectKind::Rect),
                (1.0f32..300.0).prop_map(|radius| ObjectKind::Circle { radius }),
                Just(ObjectKind::Triangle),
                (prop::sample::select(SOURCES.to_vec()), any::<bool>()).prop_map(
                    |(src, credentials)| ObjectKind::Image {
                        src: src.to_string(),
                        cross_origin: if credentials {
                            CorsPolicy::UseCredentials
                        } else {
                            CorsPolicy::Anonymous
                        },
                    }
                ),
            ]
        }

        fn arb_transform() -> impl Strategy<Value = Transform> {
            (
                arb_coord(),
                arb_coord(),
                0.0f32..800.0,
                0.0f32..800.0,
                0.01f32..10.0,
                0.01f32..10.0,
                -360.0f32..360.0,
            )
                .prop_map(|(left, top, width, height, scale_x, scale_y, angle)| Transform {
                    left,
                    top,
                    width,
                    height,
                    scale_x,
                    scale_y,
                    angle,
                })
        }

        fn arb_paint() -> impl Strategy<Value = Paint> {
            (
                prop::option::of("#[0-9a-f]{6}"),
                prop::option::of("#[0-9a-f]{6}"),
                0.0f32..10.0,
                prop::collection::vec(0.0f32..20.0, 0..4),
            )
                .prop_map(|(fill, stroke, stroke_width, stroke_dash)| Paint {
                    fill,
                    stroke,
                    stroke_width,
                    stroke_dash,
                })
        }

        fn arb_role() -> impl Strategy<Value = ObjectRole> {
            prop_oneof![
                Just(ObjectRole::Content),
                (0usize..4).prop_map(|area_index| ObjectRole::Guide { area_index }),
                (0usize..4).prop_map(|area_index| ObjectRole::ClippedBackground { area_index }),
            ]
        }

        fn arb_object() -> impl Strategy<Value = SceneObject> {
            (
                arb_kind(),
                arb_transform(),
                arb_paint(),
                any::<bool>(),
                any::<bool>(),
                arb_role(),
                prop::option::of((arb_coord(), arb_coord(), 0.0f32..800.0, 0.0f32..800.0)),
            )
                .prop_map(|(kind, transform, paint, selectable, evented, role, clip)| {
                    let mut object = SceneObject::new(kind)
                        .with_transform(transform)
                        .with_paint(paint)
                        .with_role(role);
                    object.selectable = selectable;
                    object.evented = evented;
                    object.clip = clip.map(|(x, y, w, h)| Bounds::new(x, y, w, h));
                    object
                })
        }

        fn all_sources() -> MemoryImageLoader {
            SOURCES
                .iter()
                .fold(MemoryImageLoader::new(), |loader, src| loader.with_image(*src, 64, 48))
        }

        proptest! {
            #[test]
            fn prop_restore_of_capture_reproduces_scene(
                objects in prop::collection::vec(arb_object(), 0..12),
                background in prop::option::of("#[0-9a-f]{6}"),
                hidden in prop::collection::vec(any::<bool>(), 12)
            ) {
                let mut source = Scene::new(500.0, 600.0);
                source.set_background_color(background);
                for object in objects {
                    source.add_object(object);
                }
                let ids: Vec<_> = source.objects_in_order().map(|o| o.id).collect();
                for (id, hide) in ids.iter().zip(&hidden) {
                    source.set_visible(*id, !hide);
                }

                let mut codec = SnapshotCodec::new();
                let state = codec.capture(&source, 0);
                let mut target = Scene::new(1.0, 1.0);
                let report = codec.restore(&state, &mut target, &all_sources());

                prop_assert!(report.is_complete());
                prop_assert_eq!(report.restored, source.object_count());
                prop_assert_eq!(target.background_color(), source.background_color());
                prop_assert!((target.width - source.width).abs() < f32::EPSILON);

                for (a, b) in source.objects_in_order().zip(target.objects_in_order()) {
                    let mut expected = a.clone();
                    expected.visible = true;
                    prop_assert_eq!(&expected, b);
                }
                prop_assert_eq!(codec.capture(&target, 0).objects, state.objects);
            }

            #[test]
            fn prop_upload_document_drops_exactly_the_guides(
                objects in prop::collection::vec(arb_object(), 0..12)
            ) {
                let mut scene = Scene::default();
                for object in objects {
                    scene.add_object(object);
                }
                let mut codec = SnapshotCodec::new();
                let state = codec.capture(&scene, 0);
                let upload = state.upload_document();

                let expected: Vec<_> = state
                    .objects
                    .iter()
                    .filter(|d| !d.role.is_guide())
                    .cloned()
                    .collect();
                prop_assert_eq!(upload.objects, expected);
                prop_assert_eq!(upload.version, state.version);
            }
        }
    }
}
