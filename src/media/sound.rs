use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::composition::settings::SoundSetting;

/// Container format of a sound clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF WAVE.
    Wav,
    /// Ogg Vorbis.
    Ogg,
    /// MPEG layer III.
    Mp3,
}

impl AudioFormat {
    /// Pick the decoder from the file extension. Unknown extensions are treated as WAV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("ogg") => Self::Ogg,
            Some("mp3") => Self::Mp3,
            _ => Self::Wav,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A named clip ready to hand to a [`SoundOutput`].
pub struct SoundClip {
    /// Key the clip is registered under.
    pub key: String,
    /// Absolute clip path.
    pub path: PathBuf,
    /// Format picked from the extension.
    pub format: AudioFormat,
    /// Default volume from settings.
    pub volume: f32,
}

/// Fire-and-forget audio playback provided by the host.
pub trait SoundOutput {
    /// Play `clip` once at `volume` in `[0, 1]`. Returns `false` if the output is unavailable.
    fn play_one_shot(&self, clip: &SoundClip, volume: f32) -> bool;
}

/// Named one-shot sounds, keyed as in [`crate::Settings::sounds`].
pub struct SoundBoard {
    clips: BTreeMap<String, SoundClip>,
    output: Rc<dyn SoundOutput>,
}

impl SoundBoard {
    /// Clip paths resolve under `<content_root>/Audio`.
    pub fn from_settings(
        sounds: &[SoundSetting],
        content_root: &Path,
        output: Rc<dyn SoundOutput>,
    ) -> Self {
        let audio_dir = content_root.join("Audio");
        let clips = sounds
            .iter()
            .map(|s| {
                let path = audio_dir.join(s.clip_path.replace('\\', "/"));
                let clip = SoundClip {
                    key: s.key.clone(),
                    format: AudioFormat::from_path(&path),
                    path,
                    volume: s.volume,
                };
                (s.key.clone(), clip)
            })
            .collect();
        Self { clips, output }
    }

    /// Play the clip registered under `key`. `volume` overrides the configured volume; the
    /// result is clamped to `[0, 1]`.
    pub fn play(&self, key: &str, volume: Option<f32>) -> bool {
        let Some(clip) = self.clips.get(key) else {
            tracing::warn!(key, "sound key not found");
            return false;
        };
        let volume = volume.unwrap_or(clip.volume);
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.output.play_one_shot(clip, volume)
    }

    /// Clip registered under `key`.
    pub fn clip(&self, key: &str) -> Option<&SoundClip> {
        self.clips.get(key)
    }

    /// Number of registered clips.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether no clip is registered.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl std::fmt::Debug for SoundBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundBoard")
            .field("clips", &self.clips.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/sound.rs"]
mod tests;
