//! Retained scene graph for the design canvas.
//!
//! Objects are kept in render order: index 0 is drawn first (at the back).
//! Structural changes raise [`SceneMutation`] notifications to registered
//! listeners; visibility toggles and z-order moves are silent.

use serde::{Deserialize, Serialize};

use crate::{CanvasError, CanvasResult, ObjectId, SceneObject};

/// Default canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: f32 = 500.0;

/// Default canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: f32 = 600.0;

/// A change to the scene's object set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMutation {
    /// An object was added.
    Added(ObjectId),
    /// An object was removed.
    Removed(ObjectId),
    /// An object's attributes were modified.
    Modified(ObjectId),
}

impl SceneMutation {
    /// The object affected by this mutation.
    #[must_use]
    pub const fn object_id(&self) -> ObjectId {
        match self {
            Self::Added(id) | Self::Removed(id) | Self::Modified(id) => *id,
        }
    }
}

/// Callback invoked for every scene mutation.
pub type MutationListener = Box<dyn FnMut(&SceneMutation)>;

/// Handle returned by [`Scene::on_mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Canvas-level background picture (the product photo behind the design).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundImage {
    /// Image source.
    pub src: String,
    /// Natural width in pixels.
    pub width: f32,
    /// Natural height in pixels.
    pub height: f32,
    /// Horizontal scale applied when drawing.
    pub scale_x: f32,
    /// Vertical scale applied when drawing.
    pub scale_y: f32,
}

impl BackgroundImage {
    /// Stretch an image of the given natural size over the whole canvas.
    #[must_use]
    pub fn stretched(
        src: impl Into<String>,
        width: f32,
        height: f32,
        canvas_width: f32,
        canvas_height: f32,
    ) -> Self {
        Self {
            src: src.into(),
            width,
            height,
            scale_x: canvas_width / width,
            scale_y: canvas_height / height,
        }
    }
}

/// A scene containing all design objects.
pub struct Scene {
    /// Objects in render order.
    objects: Vec<SceneObject>,
    /// Currently active (selected) object.
    active: Option<ObjectId>,
    /// Canvas width in pixels.
    pub width: f32,
    /// Canvas height in pixels.
    pub height: f32,
    background_color: Option<String>,
    background_image: Option<BackgroundImage>,
    listeners: Vec<(ListenerId, MutationListener)>,
    next_listener: u64,
}

impl Scene {
    /// Create a new empty scene with the given canvas size.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            objects: Vec::new(),
            active: None,
            width,
            height,
            background_color: None,
            background_image: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Add an object on top of the scene.
    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = object.id;
        tracing::trace!("Add {} {id}", object.kind.type_name());
        self.objects.push(object);
        self.emit(SceneMutation::Added(id));
        id
    }

    /// Remove an object from the scene.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not found.
    pub fn remove_object(&mut self, id: ObjectId) -> CanvasResult<SceneObject> {
        let index = self
            .index_of(id)
            .ok_or_else(|| CanvasError::ObjectNotFound(id.to_string()))?;
        let object = self.objects.remove(index);
        if self.active == Some(id) {
            self.active = None;
        }
        self.emit(SceneMutation::Removed(id));
        Ok(object)
    }

    /// Modify an object in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not found.
    pub fn modify_object<F>(&mut self, id: ObjectId, f: F) -> CanvasResult<()>
    where
        F: FnOnce(&mut SceneObject),
    {
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| CanvasError::ObjectNotFound(id.to_string()))?;
        f(object);
        // The closure must not be able to re-key the object.
        object.id = id;
        self.emit(SceneMutation::Modified(id));
        Ok(())
    }

    /// Get an object by ID.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Objects in render order, back to front.
    pub fn objects_in_order(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    /// Position of an object in render order.
    #[must_use]
    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    /// Move an object to the back of the render order.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not found.
    pub fn send_to_back(&mut self, id: ObjectId) -> CanvasResult<()> {
        let index = self
            .index_of(id)
            .ok_or_else(|| CanvasError::ObjectNotFound(id.to_string()))?;
        let object = self.objects.remove(index);
        self.objects.insert(0, object);
        Ok(())
    }

    /// Set or clear the active object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not found.
    pub fn set_active_object(&mut self, id: Option<ObjectId>) -> CanvasResult<()> {
        if let Some(id) = id {
            if self.index_of(id).is_none() {
                return Err(CanvasError::ObjectNotFound(id.to_string()));
            }
        }
        self.active = id;
        Ok(())
    }

    /// The active object, if any.
    #[must_use]
    pub fn active_object(&self) -> Option<&SceneObject> {
        self.active.and_then(|id| self.object(id))
    }

    /// Set the transient visibility of an object without raising a mutation.
    ///
    /// Returns `false` if the object does not exist.
    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Canvas background color.
    #[must_use]
    pub fn background_color(&self) -> Option<&str> {
        self.background_color.as_deref()
    }

    /// Set the canvas background color.
    pub fn set_background_color(&mut self, color: Option<String>) {
        self.background_color = color;
    }

    /// Canvas background picture.
    #[must_use]
    pub fn background_image(&self) -> Option<&BackgroundImage> {
        self.background_image.as_ref()
    }

    /// Set the canvas background picture.
    pub fn set_background_image(&mut self, image: Option<BackgroundImage>) {
        self.background_image = image;
    }

    /// Replace every object and the background in one step.
    ///
    /// Raises `Removed` for every previous object, then `Added` for every new one.
    pub fn replace_all(
        &mut self,
        objects: Vec<SceneObject>,
        background_color: Option<String>,
        background_image: Option<BackgroundImage>,
    ) {
        let previous = std::mem::replace(&mut self.objects, objects);
        self.active = None;
        self.background_color = background_color;
        self.background_image = background_image;
        for object in &previous {
            self.emit(SceneMutation::Removed(object.id));
        }
        let added: Vec<_> = self.objects.iter().map(|o| o.id).collect();
        for id in added {
            self.emit(SceneMutation::Added(id));
        }
    }

    /// Remove every object and both backgrounds.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new(), None, None);
    }

    /// Get the number of objects in the scene.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Check if the scene is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Find the topmost interactive object at the given canvas coordinates.
    #[must_use]
    pub fn object_at(&self, x: f32, y: f32) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.evented && o.visible && o.contains_point(x, y))
            .map(|o| o.id)
    }

    /// Register a mutation listener.
    pub fn on_mutation(&mut self, listener: MutationListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a mutation listener. Returns `false` if it was not registered.
    pub fn off_mutation(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&mut self, mutation: SceneMutation) {
        for (_, listener) in &mut self.listeners {
            listener(&mutation);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("objects", &self.objects)
            .field("active", &self.active)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("background_color", &self.background_color)
            .field("background_image", &self.background_image)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
