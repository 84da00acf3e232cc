use std::{
    any::Any,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context;
use futures::{FutureExt, future::LocalBoxFuture};

use crate::foundation::error::{VitrineError, VitrineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Kinds of assets the cache can hold.
pub enum AssetKind {
    /// Font resource.
    Font,
    /// Decoded texture.
    Texture,
    /// Opaque material.
    Material,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Cache identity of an asset: its kind plus the resource key it was requested with.
pub struct AssetKey {
    /// What kind of asset this is.
    pub kind: AssetKind,
    /// Resource key as requested.
    pub path: String,
}

impl AssetKey {
    /// Key for `path` of `kind`.
    pub fn new(kind: AssetKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.path)
    }
}

/// A typed asset payload that can live in the cache.
pub trait CachedAsset: Any {
    /// Kind recorded in the handle's key.
    const KIND: AssetKind;
}

#[derive(Clone)]
/// Loaded font resource.
pub struct FontAsset {
    /// Resource name the font was loaded from.
    pub name: String,
    /// Raw font file bytes.
    pub bytes: Rc<Vec<u8>>,
}

impl std::fmt::Debug for FontAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontAsset")
            .field("name", &self.name)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

impl CachedAsset for FontAsset {
    const KIND: AssetKind = AssetKind::Font;
}

#[derive(Clone, Debug)]
/// Decoded texture in premultiplied RGBA8.
pub struct TextureAsset {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Rc<Vec<u8>>,
}

impl CachedAsset for TextureAsset {
    const KIND: AssetKind = AssetKind::Texture;
}

#[derive(Clone, Debug)]
/// Opaque material resource; interpreted by the host.
pub struct MaterialAsset {
    /// Resource name the material was loaded from.
    pub name: String,
    /// Raw material bytes.
    pub bytes: Rc<Vec<u8>>,
}

impl CachedAsset for MaterialAsset {
    const KIND: AssetKind = AssetKind::Material;
}

#[derive(Clone)]
/// Shared handle to a loaded asset. The cache owns the underlying resource; holders only
/// borrow it and never release it themselves.
pub struct AssetHandle {
    key: AssetKey,
    payload: Rc<dyn Any>,
}

impl AssetHandle {
    /// Wrap `value` as the loaded payload for `path`.
    pub fn new<T: CachedAsset>(path: impl Into<String>, value: T) -> Self {
        Self {
            key: AssetKey::new(T::KIND, path),
            payload: Rc::new(value),
        }
    }

    /// Key this handle was loaded under.
    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    /// The payload as `T`, or `None` when it holds another kind.
    pub fn downcast<T: CachedAsset>(&self) -> Option<Rc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }

    /// True when both handles point at the same loaded payload.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl std::fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("key", &self.key)
            .field("payload_ptr", &Rc::as_ptr(&self.payload))
            .finish()
    }
}

/// Where assets actually come from. Implementations perform the (possibly slow) load and
/// free whatever a handle holds when the cache releases it.
pub trait AssetSource {
    /// Load the asset behind `key`.
    fn load(&self, key: &AssetKey) -> LocalBoxFuture<'static, anyhow::Result<AssetHandle>>;

    /// Free what `handle` holds. Called once per loaded handle.
    fn release(&self, handle: &AssetHandle);
}

#[derive(Clone, Debug)]
/// Loads assets from files under a content root.
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Source reading files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Content root paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FsAssetSource {
    fn load(&self, key: &AssetKey) -> LocalBoxFuture<'static, anyhow::Result<AssetHandle>> {
        let root = self.root.clone();
        let key = key.clone();
        async move {
            let norm = normalize_rel_path(&key.path)?;
            let path = root.join(Path::new(&norm));
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read asset bytes from '{}'", path.display()))?;
            let handle = match key.kind {
                AssetKind::Texture => AssetHandle::new(key.path, decode_texture(&bytes)?),
                AssetKind::Font => AssetHandle::new(
                    key.path.clone(),
                    FontAsset {
                        name: key.path,
                        bytes: Rc::new(bytes),
                    },
                ),
                AssetKind::Material => AssetHandle::new(
                    key.path.clone(),
                    MaterialAsset {
                        name: key.path,
                        bytes: Rc::new(bytes),
                    },
                ),
            };
            Ok(handle)
        }
        .boxed_local()
    }

    fn release(&self, handle: &AssetHandle) {
        tracing::trace!(key = %handle.key(), "file asset released");
    }
}

/// Decode an encoded image (PNG, JPEG, ...) into a premultiplied texture.
pub fn decode_texture(bytes: &[u8]) -> anyhow::Result<TextureAsset> {
    let rgba = image::load_from_memory(bytes)
        .context("texture bytes are not a decodable image")?
        .into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixels = rgba.into_raw();
    pixels.chunks_exact_mut(4).for_each(premultiply_pixel);
    Ok(TextureAsset {
        width,
        height,
        rgba8_premul: Rc::new(pixels),
    })
}

/// Scale the color channels of one RGBA8 pixel by its alpha, rounding to nearest.
fn premultiply_pixel(px: &mut [u8]) {
    let alpha = u16::from(px[3]);
    for channel in &mut px[..3] {
        *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
    }
}

/// Clean a path relative to the content root. Backslashes become `/` and empty or `.`
/// segments drop out. Absolute paths, `..` segments and paths naming no file are rejected.
pub fn normalize_rel_path(source: &str) -> VitrineResult<String> {
    let unified = source.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(VitrineError::config_invalid(format!(
            "'{source}' is absolute; content paths resolve against the content root"
        )));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return Err(VitrineError::config_invalid(format!(
                "'{source}' climbs out of the content root"
            )));
        }
        segments.push(segment);
    }
    if segments.is_empty() {
        return Err(VitrineError::config_invalid(format!(
            "'{source}' names no file under the content root"
        )));
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
