//! Scene objects - the building blocks of a design.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::CorsPolicy;

/// Unique identifier for a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new unique object ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse an object ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned rectangle in canvas-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Bounds {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this rectangle.
    #[must_use]
    pub fn covers(&self, other: &Bounds) -> bool {
        const EPS: f32 = 1e-3;
        self.x <= other.x + EPS
            && self.y <= other.y + EPS
            && self.right() + EPS >= other.right()
            && self.bottom() + EPS >= other.bottom()
    }

    /// Whether a point lies within the rectangle.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Font weight of a text object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular weight.
    #[default]
    Normal,
    /// Bold weight.
    Bold,
}

/// Font style of a text object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic.
    Italic,
}

/// Horizontal alignment of a text object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

/// Text content and typography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Text content.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Font family name.
    #[serde(default = "TextStyle::default_family")]
    pub font_family: String,
    /// Font weight.
    #[serde(default)]
    pub font_weight: FontWeight,
    /// Font style.
    #[serde(default)]
    pub font_style: FontStyle,
    /// Alignment.
    #[serde(default)]
    pub text_align: TextAlign,
}

impl TextStyle {
    fn default_family() -> String {
        "Times New Roman".to_string()
    }

    /// Create text with the default font family and style.
    #[must_use]
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_family: Self::default_family(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            text_align: TextAlign::Left,
        }
    }
}

/// The type of content an object contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ObjectKind {
    /// A text box.
    Text(TextStyle),
    /// A rectangle filling its transform box.
    Rect,
    /// A circle; the transform box is `2 * radius` square.
    Circle {
        /// Radius in unscaled pixels.
        radius: f32,
    },
    /// An isosceles triangle filling its transform box.
    Triangle,
    /// A bitmap image. The transform box holds its natural size.
    Image {
        /// Image source URI or data URI.
        src: String,
        /// Cross-origin policy used when (re)loading the source.
        #[serde(default)]
        cross_origin: CorsPolicy,
    },
}

impl ObjectKind {
    /// Short type tag, used in logs.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Rect => "rect",
            Self::Circle { .. } => "circle",
            Self::Triangle => "triangle",
            Self::Image { .. } => "image",
        }
    }

    /// Image source, if this is an image.
    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        match self {
            Self::Image { src, .. } => Some(src),
            _ => None,
        }
    }
}

/// Geometry of an object. `left`/`top` are the unrotated top-left corner,
/// `angle` is in degrees around that corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// X position (pixels from left).
    pub left: f32,
    /// Y position (pixels from top).
    pub top: f32,
    /// Unscaled width in pixels.
    pub width: f32,
    /// Unscaled height in pixels.
    pub height: f32,
    /// Horizontal scale factor.
    #[serde(default = "Transform::unit_scale")]
    pub scale_x: f32,
    /// Vertical scale factor.
    #[serde(default = "Transform::unit_scale")]
    pub scale_y: f32,
    /// Rotation in degrees.
    #[serde(default)]
    pub angle: f32,
}

impl Transform {
    const fn unit_scale() -> f32 {
        1.0
    }

    /// An unscaled, unrotated box.
    #[must_use]
    pub const fn at(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }

    /// Apply a uniform scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale_x = scale;
        self.scale_y = scale;
        self
    }

    /// Rendered width.
    #[must_use]
    pub fn scaled_width(&self) -> f32 {
        self.width * self.scale_x
    }

    /// Rendered height.
    #[must_use]
    pub fn scaled_height(&self) -> f32 {
        self.height * self.scale_y
    }

    /// Unrotated bounding box after scaling.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.left,
            self.top,
            self.scaled_width(),
            self.scaled_height(),
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(0.0, 0.0, 100.0, 100.0)
    }
}

/// Fill and stroke attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    /// Fill color (CSS syntax), `None` for no fill.
    #[serde(default)]
    pub fill: Option<String>,
    /// Stroke color, `None` for no stroke.
    #[serde(default)]
    pub stroke: Option<String>,
    /// Stroke width in pixels.
    #[serde(default)]
    pub stroke_width: f32,
    /// Dash pattern for the stroke.
    #[serde(default)]
    pub stroke_dash: Vec<f32>,
}

impl Paint {
    /// Solid fill, no stroke.
    #[must_use]
    pub fn fill(color: impl Into<String>) -> Self {
        Self {
            fill: Some(color.into()),
            ..Self::default()
        }
    }
}

/// What an object is for, which controls export and selection behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectRole {
    /// Regular design content.
    #[default]
    Content,
    /// Print-area outline. Never rasterized, stripped from upload documents.
    Guide {
        /// Index of the print area this guide outlines.
        area_index: usize,
    },
    /// Background fill clipped to one print area.
    ClippedBackground {
        /// Index of the print area this copy is clipped to.
        area_index: usize,
    },
}

impl ObjectRole {
    /// Whether this is a print-area guide.
    #[must_use]
    pub const fn is_guide(&self) -> bool {
        matches!(self, Self::Guide { .. })
    }

    /// Whether this is a clipped background layer.
    #[must_use]
    pub const fn is_clipped_background(&self) -> bool {
        matches!(self, Self::ClippedBackground { .. })
    }

    /// The print area this object belongs to, if any.
    #[must_use]
    pub const fn area_index(&self) -> Option<usize> {
        match self {
            Self::Content => None,
            Self::Guide { area_index } | Self::ClippedBackground { area_index } => {
                Some(*area_index)
            }
        }
    }
}

/// An object placed on the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Unique identifier.
    pub id: ObjectId,
    /// Object content type.
    pub kind: ObjectKind,
    /// Position, size, scale and rotation.
    pub transform: Transform,
    /// Fill and stroke.
    pub paint: Paint,
    /// Whether the user can select the object.
    pub selectable: bool,
    /// Whether the object receives pointer events.
    pub evented: bool,
    /// Transient render visibility. Not part of snapshots.
    pub visible: bool,
    /// Export-control tag.
    pub role: ObjectRole,
    /// Absolute clip rectangle, if rendering is confined to a region.
    pub clip: Option<Bounds>,
}

impl SceneObject {
    /// Create a new interactive content object with the given kind.
    #[must_use]
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            id: ObjectId::new(),
            kind,
            transform: Transform::default(),
            paint: Paint::default(),
            selectable: true,
            evented: true,
            visible: true,
            role: ObjectRole::Content,
            clip: None,
        }
    }

    /// Set the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the paint.
    #[must_use]
    pub fn with_paint(mut self, paint: Paint) -> Self {
        self.paint = paint;
        self
    }

    /// Set both selectability and pointer interactivity.
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.selectable = interactive;
        self.evented = interactive;
        self
    }

    /// Set the role tag.
    #[must_use]
    pub fn with_role(mut self, role: ObjectRole) -> Self {
        self.role = role;
        self
    }

    /// Clip rendering to an absolute rectangle.
    #[must_use]
    pub fn with_clip(mut self, clip: Bounds) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Whether this is text.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, ObjectKind::Text(_))
    }

    /// Check if a point (in canvas coordinates) is within this object.
    #[must_use]
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let inside = self.transform.bounds().contains_point(x, y);
        match self.clip {
            Some(clip) => inside && clip.contains_point(x, y),
            None => inside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_covers() {
        let area = Bounds::new(10.0, 10.0, 100.0, 50.0);
        assert!(Bounds::new(0.0, 0.0, 200.0, 200.0).covers(&area));
        assert!(area.covers(&area));
        assert!(!Bounds::new(20.0, 0.0, 200.0, 200.0).covers(&area));
    }

    #[test]
    fn test_scaled_bounds() {
        let t = Transform::at(5.0, 6.0, 40.0, 20.0).with_scale(2.5);
        let b = t.bounds();
        assert!((b.width - 100.0).abs() < f32::EPSILON);
        assert!((b.height - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_role_tags() {
        assert!(ObjectRole::Guide { area_index: 1 }.is_guide());
        assert!(!ObjectRole::Content.is_guide());
        assert_eq!(
            ObjectRole::ClippedBackground { area_index: 3 }.area_index(),
            Some(3)
        );
        assert_eq!(ObjectRole::Content.area_index(), None);
    }

    #[test]
    fn test_clip_limits_hit_testing() {
        let obj = SceneObject::new(ObjectKind::Rect)
            .with_transform(Transform::at(0.0, 0.0, 100.0, 100.0))
            .with_clip(Bounds::new(0.0, 0.0, 50.0, 50.0));
        assert!(obj.contains_point(25.0, 25.0));
        assert!(!obj.contains_point(75.0, 75.0));
    }

    #[test]
    fn test_kind_serializes_with_type_tag() {
        let json = serde_json::to_value(ObjectKind::Circle { radius: 5.0 }).expect("serialize");
        assert_eq!(json["type"], "circle");
        assert_eq!(json["data"]["radius"], 5.0);
    }
}
