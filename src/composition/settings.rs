use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    composition::model::{PageSpec, PopupSpec},
    foundation::error::{VitrineError, VitrineResult},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// Exact-match table from logical font keys to loadable font resource names.
pub struct FontMap(BTreeMap<String, String>);

impl FontMap {
    /// Build a map from `(key, resource)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Map `key` to its resource name. Unmapped keys and keys mapped to an empty
    /// string pass through unchanged.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        match self.0.get(key) {
            Some(mapped) if !mapped.is_empty() => mapped,
            _ => key,
        }
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key is mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A named one-shot sound.
pub struct SoundSetting {
    /// Key buttons use to request this sound.
    pub key: String,
    /// Clip path relative to `<content root>/Audio`.
    pub clip_path: String,
    /// Playback volume, `1.0` when omitted.
    #[serde(default = "default_sound_volume")]
    pub volume: f32,
}

fn default_sound_volume() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Template keys instantiated for each leaf kind.
pub struct TemplateKeys {
    /// Template for text leaves.
    pub text: String,
    /// Template for image leaves.
    pub image: String,
    /// Template for buttons.
    pub button: String,
    /// Template for video panels.
    pub video: String,
    /// Template for keyboards.
    pub keyboard: String,
}

impl Default for TemplateKeys {
    fn default() -> Self {
        Self {
            text: "Prefabs/TextPrefab.prefab".to_string(),
            image: "Prefabs/ImagePrefab.prefab".to_string(),
            button: "Prefabs/ButtonPrefab.prefab".to_string(),
            video: "Prefabs/VideoPlayerPrefab.prefab".to_string(),
            keyboard: "Prefabs/KeyboardPrefab.prefab".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
/// Video preparation and codec fallback knobs.
pub struct VideoSettings {
    /// Seconds a video may take to prepare before it is given up on.
    pub prepare_timeout_secs: f64,
    /// Milliseconds between prepare checks.
    pub poll_interval_ms: u64,
    /// Extension that may be unreliable on some runtimes.
    pub primary_extension: String,
    /// Same-named alternate used when the primary is unreliable.
    pub fallback_extension: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            prepare_timeout_secs: 10.0,
            poll_interval_ms: 16,
            primary_extension: "webm".to_string(),
            fallback_extension: "mp4".to_string(),
        }
    }
}

impl VideoSettings {
    /// Prepare timeout as a [`Duration`].
    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.prepare_timeout_secs)
    }

    /// Poll interval as a [`Duration`], never below one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Global settings document: font/sound tables, timings and the layout itself.
pub struct Settings {
    /// Seconds without input before the host returns to its title screen.
    #[serde(default = "default_inactivity_time")]
    pub inactivity_time: f64,
    /// Seconds used by the host's fade transitions.
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f64,
    /// Logical font keys to font resource names.
    #[serde(default)]
    pub font_map: FontMap,
    /// Sounds buttons can play on click.
    #[serde(default)]
    pub sounds: Vec<SoundSetting>,
    /// Template keys per leaf kind.
    #[serde(default)]
    pub templates: TemplateKeys,
    /// Video preparation knobs.
    #[serde(default)]
    pub video: VideoSettings,
    /// Page layouts.
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    /// Popup layouts.
    #[serde(default)]
    pub popups: Vec<PopupSpec>,
}

fn default_inactivity_time() -> f64 {
    60.0
}

fn default_fade_duration() -> f64 {
    0.2
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inactivity_time: default_inactivity_time(),
            fade_duration: default_fade_duration(),
            font_map: FontMap::default(),
            sounds: Vec::new(),
            templates: TemplateKeys::default(),
            video: VideoSettings::default(),
            pages: Vec::new(),
            popups: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse and validate a settings document.
    pub fn from_json_str(json: &str) -> VitrineResult<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| VitrineError::serde(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate the settings file at `path`.
    pub fn load(path: impl AsRef<Path>) -> VitrineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read settings from '{}'", path.display()))?;
        let settings = Self::from_json_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            pages = settings.pages.len(),
            popups = settings.popups.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Reject non-finite timings, empty template keys, bad sounds and invalid layouts.
    pub fn validate(&self) -> VitrineResult<()> {
        for (name, value) in [
            ("inactivityTime", self.inactivity_time),
            ("fadeDuration", self.fade_duration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VitrineError::config_invalid(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        let timeout = self.video.prepare_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(VitrineError::config_invalid(
                "video prepareTimeoutSecs must be finite and > 0",
            ));
        }
        for (name, key) in [
            ("text", &self.templates.text),
            ("image", &self.templates.image),
            ("button", &self.templates.button),
            ("video", &self.templates.video),
            ("keyboard", &self.templates.keyboard),
        ] {
            if key.trim().is_empty() {
                return Err(VitrineError::config_invalid(format!(
                    "templates.{name} must be non-empty"
                )));
            }
        }
        for sound in &self.sounds {
            if sound.key.is_empty() || sound.clip_path.is_empty() {
                return Err(VitrineError::config_invalid(
                    "sound entries need a key and a clipPath",
                ));
            }
            if !sound.volume.is_finite() {
                return Err(VitrineError::config_invalid(format!(
                    "sound '{}' volume must be finite",
                    sound.key
                )));
            }
        }
        for page in &self.pages {
            page.validate()?;
        }
        for popup in &self.popups {
            popup.validate()?;
        }
        Ok(())
    }

    /// Page layout named `name`.
    pub fn page(&self, name: &str) -> Option<&PageSpec> {
        self.pages.iter().find(|p| p.name == name)
    }

    /// Popup layout named `name`.
    pub fn popup(&self, name: &str) -> Option<&PopupSpec> {
        self.popups.iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What the current runtime can be trusted with.
pub struct RuntimeProfile {
    /// Whether the primary video format (webm) plays reliably.
    pub primary_video_reliable: bool,
    /// Whether files under the content root can be checked for existence.
    pub can_check_files: bool,
}

impl RuntimeProfile {
    /// Conservative profile for the compilation target.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self {
                primary_video_reliable: false,
                can_check_files: true,
            }
        } else if cfg!(target_os = "android") {
            Self {
                primary_video_reliable: true,
                can_check_files: false,
            }
        } else if cfg!(target_os = "linux") {
            Self {
                primary_video_reliable: true,
                can_check_files: true,
            }
        } else {
            Self {
                primary_video_reliable: false,
                can_check_files: true,
            }
        }
    }
}

#[derive(Clone, Debug)]
/// Everything [`crate::Engine::init`] needs besides its collaborators.
pub struct EngineConfig {
    /// Global settings and layouts.
    pub settings: Settings,
    /// Directory relative asset, audio and video paths resolve against.
    pub content_root: PathBuf,
    /// What this runtime can be trusted with.
    pub runtime: RuntimeProfile,
}

impl EngineConfig {
    /// Config for `settings` rooted at `content_root`, using [`RuntimeProfile::current`].
    pub fn new(settings: Settings, content_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            content_root: content_root.into(),
            runtime: RuntimeProfile::current(),
        }
    }

    /// Replace the runtime profile.
    pub fn with_runtime(mut self, runtime: RuntimeProfile) -> Self {
        self.runtime = runtime;
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/settings.rs"]
mod tests;
