//! Vitrine composes declarative UI trees (pages, popups, buttons, images, text, video panels)
//! into a live scene at runtime.
//!
//! An [`Engine`] owns everything one composition needs and nothing is global:
//!
//! - a single-flight [`ResourceCache`] for fonts, textures and materials
//! - a registry of every template instance it spawned, released exactly once
//! - a root [`CancellationScope`] merged into every caller scope
//!
//! Sibling elements are built concurrently on one thread and joined before their parent is
//! marked active. Cancellation, close, deactivation and [`Engine::shutdown`] unwind every
//! render surface, instance and cached asset acquired along the way.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod compose;
mod composition;
mod foundation;
mod media;
mod runtime;
mod scene;

/// In-memory host, video backend, sound output and asset source.
pub mod headless;

pub use crate::assets::cache::ResourceCache;
pub use crate::assets::source::{
    AssetHandle, AssetKey, AssetKind, AssetSource, CachedAsset, FontAsset, FsAssetSource,
    MaterialAsset, TextureAsset, decode_texture, normalize_rel_path,
};
pub use crate::compose::engine::{
    ClickEffects, Engine, EngineHosts, ParentRef, ShutdownReport, WeakEngine,
};
pub use crate::composition::model::{
    ButtonSpec, ImageSpec, ImageType, KeyboardSpec, PageSpec, PopupSpec, TextAlignment, TextSpec,
    UiSpec, VideoSpec,
};
pub use crate::composition::settings::{
    EngineConfig, FontMap, RuntimeProfile, Settings, SoundSetting, TemplateKeys, VideoSettings,
};
pub use crate::foundation::core::{
    Euler, HostObject, NodeId, Placement, Rgba, Size, SurfaceId, Vec2,
};
pub use crate::foundation::error::{VitrineError, VitrineResult};
pub use crate::media::sound::{AudioFormat, SoundBoard, SoundClip, SoundOutput};
pub use crate::media::video::{
    PlaybackConfig, PrepareState, PrepareWait, SubscriptionId, VideoBackend, VideoResourceBinder,
};
pub use crate::runtime::cancel::CancellationScope;
pub use crate::scene::graph::{ClickAction, CloseCallback, LiveNode, NodeKind, NodeOrigin, NodeState};
pub use crate::scene::host::{ImageContent, NodeUpdate, SceneHost, SpawnError, TextContent};
