use serde::{Deserialize, Serialize};

use crate::foundation::{
    core::{Euler, Rgba, Vec2, vec2_is_finite},
    error::{VitrineError, VitrineResult},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// How an image stretches its texture inside its rect.
pub enum ImageType {
    /// Stretch the texture over the whole rect.
    #[default]
    Simple,
    /// Nine-slice: corners keep their size, edges and center stretch.
    Sliced,
    /// Repeat the texture at its native size.
    Tiled,
    /// Reveal a fraction of the texture.
    Filled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Text anchoring inside its rect.
pub enum TextAlignment {
    /// Upper left corner.
    TopLeft,
    /// Top edge, centered horizontally.
    Top,
    /// Upper right corner.
    TopRight,
    /// Left edge, centered vertically.
    Left,
    /// Centered on both axes.
    #[default]
    Center,
    /// Right edge, centered vertically.
    Right,
    /// Lower left corner.
    BottomLeft,
    /// Bottom edge, centered horizontally.
    Bottom,
    /// Lower right corner.
    BottomRight,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A textured (or flat colored) rectangle.
pub struct ImageSpec {
    /// Name given to the host object.
    #[serde(default)]
    pub name: String,
    /// Top-left corner, relative to the parent's top-left, y pointing down.
    #[serde(default)]
    pub position: Vec2,
    /// Width and height in canvas units.
    #[serde(default)]
    pub size: Vec2,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: Euler,
    /// Texture path relative to the content root. Empty means color only.
    #[serde(default)]
    pub source_image_path: String,
    /// Tint, or the fill when there is no texture.
    #[serde(default)]
    pub color: Rgba,
    /// How the texture fills the rect.
    #[serde(default)]
    pub image_type: ImageType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A single run of styled text.
pub struct TextSpec {
    /// Name given to the host object.
    #[serde(default)]
    pub name: String,
    /// Top-left corner, relative to the parent's top-left.
    #[serde(default)]
    pub position: Vec2,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: Euler,
    /// Text content. Empty text needs no font size.
    #[serde(default)]
    pub text: String,
    /// Logical font key, resolved through [`crate::FontMap`] before loading.
    #[serde(default)]
    pub font_key: String,
    /// Point size; must be positive when there is text.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Fill color.
    #[serde(default)]
    pub font_color: Rgba,
    /// Anchoring inside the template's rect.
    #[serde(default)]
    pub alignment: TextAlignment,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec2::ZERO,
            rotation: Euler::ZERO,
            text: String::new(),
            font_key: String::new(),
            font_size: default_font_size(),
            font_color: Rgba::WHITE,
            alignment: TextAlignment::Center,
        }
    }
}

fn default_font_size() -> f32 {
    36.0
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A looping video panel with optional audio.
pub struct VideoSpec {
    /// Name given to the host object.
    #[serde(default)]
    pub name: String,
    /// Top-left corner, relative to the parent's top-left.
    #[serde(default)]
    pub position: Vec2,
    /// Panel size; also the render surface size (at least 2x2).
    #[serde(default)]
    pub size: Vec2,
    /// Video path relative to the content root.
    #[serde(default)]
    pub file_path: String,
    /// Audio volume in `[0, 1]`; zero keeps the audio sink stopped.
    #[serde(default)]
    pub volume: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// An on-screen keyboard area; only placed, its behaviour belongs to the host.
pub struct KeyboardSpec {
    /// Name given to the host object.
    #[serde(default)]
    pub name: String,
    /// Top-left corner, relative to the parent's top-left.
    #[serde(default)]
    pub position: Vec2,
    /// Area reserved for the keyboard.
    #[serde(default)]
    pub size: Vec2,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A clickable element with a video or image background, a label and an icon.
pub struct ButtonSpec {
    /// Name given to the host object.
    #[serde(default)]
    pub name: String,
    /// Top-left corner, relative to the parent's top-left.
    #[serde(default)]
    pub position: Vec2,
    /// Button size; also the background video surface size.
    #[serde(default)]
    pub size: Vec2,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: Euler,
    /// Static background, also the fallback when the background video cannot play.
    #[serde(default)]
    pub background_image: Option<ImageSpec>,
    /// Only `filePath` and `volume` are used.
    #[serde(default)]
    pub background_video: Option<VideoSpec>,
    /// Icon built as a child image of the button.
    #[serde(default)]
    pub additional_image: Option<ImageSpec>,
    /// Label drawn over the background.
    #[serde(default)]
    pub text: Option<TextSpec>,
    /// Named sound played on click. Empty means silent.
    #[serde(default)]
    pub sound_key: String,
    /// Popup the input layer should open on click. Empty means none.
    #[serde(default)]
    pub target_popup_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A modal group torn down as a unit when closed.
pub struct PopupSpec {
    /// Root name; `GeneratedPopup` when empty.
    #[serde(default)]
    pub name: String,
    /// Built first, at the popup origin. The other children are placed on it.
    #[serde(default)]
    pub background_image: Option<ImageSpec>,
    /// Text children.
    #[serde(default)]
    pub texts: Vec<TextSpec>,
    /// Image children.
    #[serde(default)]
    pub images: Vec<ImageSpec>,
    /// Button that closes the popup, after playing its sound.
    #[serde(default)]
    pub close_button: Option<ButtonSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A full screen of elements.
pub struct PageSpec {
    /// Root name; `GeneratedPage` when empty.
    #[serde(default)]
    pub name: String,
    /// Top-left corner on the host canvas.
    #[serde(default)]
    pub position: Vec2,
    /// Page size.
    #[serde(default)]
    pub size: Vec2,
    /// Text children.
    #[serde(default)]
    pub texts: Vec<TextSpec>,
    /// Image children.
    #[serde(default)]
    pub images: Vec<ImageSpec>,
    /// Button children.
    #[serde(default)]
    pub buttons: Vec<ButtonSpec>,
    /// Video panels. Entries without a file are skipped.
    #[serde(default)]
    pub videos: Vec<VideoSpec>,
    /// Keyboard placeholders.
    #[serde(default)]
    pub keyboards: Vec<KeyboardSpec>,
}

#[derive(Clone, Copy, Debug)]
/// Any buildable spec, borrowed.
pub enum UiSpec<'a> {
    /// A page and its children.
    Page(&'a PageSpec),
    /// A popup and its children.
    Popup(&'a PopupSpec),
    /// A single button.
    Button(&'a ButtonSpec),
    /// A single image.
    Image(&'a ImageSpec),
    /// A single text.
    Text(&'a TextSpec),
    /// A single video panel.
    Video(&'a VideoSpec),
    /// A single keyboard placeholder.
    Keyboard(&'a KeyboardSpec),
}

impl UiSpec<'_> {
    /// Name of the wrapped spec.
    pub fn name(&self) -> &str {
        match self {
            Self::Page(s) => &s.name,
            Self::Popup(s) => &s.name,
            Self::Button(s) => &s.name,
            Self::Image(s) => &s.name,
            Self::Text(s) => &s.name,
            Self::Video(s) => &s.name,
            Self::Keyboard(s) => &s.name,
        }
    }

    /// Validate the wrapped spec and, for composites, every child.
    pub fn validate(&self) -> VitrineResult<()> {
        match self {
            Self::Page(s) => s.validate(),
            Self::Popup(s) => s.validate(),
            Self::Button(s) => s.validate(),
            Self::Image(s) => s.validate(),
            Self::Text(s) => s.validate(),
            Self::Video(s) => s.validate(),
            Self::Keyboard(s) => s.validate(),
        }
    }
}

impl ImageSpec {
    /// Reject non-finite geometry or color, negative size, and absolute or escaping paths.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "image", self.position, Some(self.size))?;
        if !self.rotation.is_finite() || !self.color.is_finite() {
            return Err(VitrineError::config_invalid(format!(
                "image '{}' rotation/color must be finite",
                self.name
            )));
        }
        if !self.source_image_path.is_empty() {
            validate_rel_source(&self.source_image_path, "image sourceImagePath")?;
        }
        Ok(())
    }
}

impl TextSpec {
    /// Reject non-finite geometry or color, and a non-positive size for non-empty text.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "text", self.position, None)?;
        if !self.rotation.is_finite() || !self.font_color.is_finite() {
            return Err(VitrineError::config_invalid(format!(
                "text '{}' rotation/fontColor must be finite",
                self.name
            )));
        }
        if !self.text.is_empty() && (!self.font_size.is_finite() || self.font_size <= 0.0) {
            return Err(VitrineError::config_invalid(format!(
                "text '{}' fontSize must be finite and > 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl VideoSpec {
    /// Reject non-finite geometry or volume, and absolute or escaping paths.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "video", self.position, Some(self.size))?;
        if !self.volume.is_finite() {
            return Err(VitrineError::config_invalid(format!(
                "video '{}' volume must be finite",
                self.name
            )));
        }
        if !self.file_path.is_empty() {
            validate_rel_source(&self.file_path, "video filePath")?;
        }
        Ok(())
    }
}

impl KeyboardSpec {
    /// Reject non-finite geometry and negative size.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "keyboard", self.position, Some(self.size))
    }
}

impl ButtonSpec {
    /// Validate the button's own rect and each nested spec.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "button", self.position, Some(self.size))?;
        if !self.rotation.is_finite() {
            return Err(VitrineError::config_invalid(format!(
                "button '{}' rotation must be finite",
                self.name
            )));
        }
        if let Some(bg) = &self.background_image {
            bg.validate()?;
        }
        if let Some(video) = &self.background_video {
            video.validate()?;
        }
        if let Some(icon) = &self.additional_image {
            icon.validate()?;
        }
        if let Some(text) = &self.text {
            text.validate()?;
        }
        Ok(())
    }
}

impl PopupSpec {
    /// Validate every child spec. The popup itself has no geometry.
    pub fn validate(&self) -> VitrineResult<()> {
        if let Some(bg) = &self.background_image {
            bg.validate()?;
        }
        for text in &self.texts {
            text.validate()?;
        }
        for image in &self.images {
            image.validate()?;
        }
        if let Some(button) = &self.close_button {
            button.validate()?;
        }
        Ok(())
    }
}

impl PageSpec {
    /// Validate the page rect and every child spec.
    pub fn validate(&self) -> VitrineResult<()> {
        validate_rect(&self.name, "page", self.position, Some(self.size))?;
        for text in &self.texts {
            text.validate()?;
        }
        for image in &self.images {
            image.validate()?;
        }
        for button in &self.buttons {
            button.validate()?;
        }
        for video in &self.videos {
            video.validate()?;
        }
        for keyboard in &self.keyboards {
            keyboard.validate()?;
        }
        Ok(())
    }

    /// Number of direct children a build of this page attempts.
    pub fn child_count(&self) -> usize {
        self.texts.len()
            + self.images.len()
            + self.buttons.len()
            + self.videos.len()
            + self.keyboards.len()
    }
}

fn validate_rect(name: &str, kind: &str, position: Vec2, size: Option<Vec2>) -> VitrineResult<()> {
    if !vec2_is_finite(position) {
        return Err(VitrineError::config_invalid(format!(
            "{kind} '{name}' position must be finite"
        )));
    }
    if let Some(size) = size
        && (!vec2_is_finite(size) || size.x < 0.0 || size.y < 0.0)
    {
        return Err(VitrineError::config_invalid(format!(
            "{kind} '{name}' size must be finite and >= 0"
        )));
    }
    Ok(())
}

fn validate_rel_source(source: &str, field: &str) -> VitrineResult<()> {
    if source.trim().is_empty() {
        return Err(VitrineError::config_invalid(format!(
            "{field} must be non-empty"
        )));
    }
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(VitrineError::config_invalid(format!(
            "{field} must be a relative path"
        )));
    }
    for part in s.split('/') {
        if part == ".." {
            return Err(VitrineError::config_invalid(format!(
                "{field} must not contain '..'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/composition/model.rs"]
mod tests;
