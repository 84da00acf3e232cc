use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::{
    assets::source::{FontAsset, TextureAsset},
    composition::model::{ImageSpec, ImageType, TextAlignment, TextSpec},
    foundation::core::{HostObject, Placement, Rgba},
};

#[derive(Clone, Debug)]
/// Styled text pushed to a text element.
pub struct TextContent {
    /// String to display.
    pub text: String,
    /// `None` keeps the template's default font.
    pub font: Option<Rc<FontAsset>>,
    /// Point size.
    pub font_size: f32,
    /// Glyph color.
    pub color: Rgba,
    /// Horizontal alignment.
    pub alignment: TextAlignment,
}

impl TextContent {
    /// Content for `spec` drawn with `font`.
    pub fn from_spec(spec: &TextSpec, font: Option<Rc<FontAsset>>) -> Self {
        Self {
            text: spec.text.clone(),
            font,
            font_size: spec.font_size,
            color: spec.font_color,
            alignment: spec.alignment,
        }
    }
}

#[derive(Clone, Debug)]
/// Texture and tint pushed to an image element.
pub struct ImageContent {
    /// `None` draws the tint color only.
    pub texture: Option<Rc<TextureAsset>>,
    /// Tint color.
    pub color: Rgba,
    /// How the texture fills the element.
    pub image_type: ImageType,
}

impl ImageContent {
    /// Content for `spec` drawn with `texture`.
    pub fn from_spec(spec: &ImageSpec, texture: Option<Rc<TextureAsset>>) -> Self {
        Self {
            texture,
            color: spec.color,
            image_type: spec.image_type,
        }
    }
}

#[derive(Clone, Debug)]
/// A change the host applies to one of its objects.
pub enum NodeUpdate {
    /// Rename the object.
    Name(String),
    /// Move, size and rotate the object.
    Placement(Placement),
    /// Replace the text of a text element.
    Text(TextContent),
    /// Replace the content of an image element.
    Image(ImageContent),
    /// Static background of a button.
    Background(ImageContent),
    /// Label of a button, positioned inside the button's frame.
    Label {
        /// Label text.
        content: TextContent,
        /// Label placement within the button.
        placement: Placement,
    },
}

#[derive(Debug)]
/// Failure to instantiate a template. A host may have created part of the object before
/// failing; the instantiator releases it.
pub struct SpawnError {
    /// Object the host created before failing, if any.
    pub partial: Option<HostObject>,
    /// Why the spawn failed.
    pub source: anyhow::Error,
}

impl SpawnError {
    /// Failure that left `object` behind.
    pub fn partial(object: HostObject, source: anyhow::Error) -> Self {
        Self {
            partial: Some(object),
            source,
        }
    }
}

impl From<anyhow::Error> for SpawnError {
    fn from(source: anyhow::Error) -> Self {
        Self {
            partial: None,
            source,
        }
    }
}

/// The scene the engine builds into (a retained-mode UI toolkit, a compositor, a test double).
///
/// All calls happen on the engine's thread. `instantiate` is the only asynchronous
/// operation; everything else takes effect immediately.
pub trait SceneHost {
    /// Create an instance of `template_key` under `parent` (or unparented).
    fn instantiate(
        &self,
        template_key: &str,
        parent: Option<HostObject>,
    ) -> LocalBoxFuture<'static, Result<HostObject, SpawnError>>;

    /// Release an object produced by [`SceneHost::instantiate`], including its host-side children.
    fn release_instance(&self, object: HostObject);

    /// Create an empty group object.
    fn create_empty(&self, name: &str, parent: Option<HostObject>) -> HostObject;

    /// Destroy an object produced by [`SceneHost::create_empty`], including its host-side children.
    fn destroy(&self, object: HostObject);

    /// Apply `update` to `object`.
    fn present(&self, object: HostObject, update: NodeUpdate);
}
