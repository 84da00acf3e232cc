use std::{
    cell::Cell,
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use tokio::time::Instant;
use url::Url;

use crate::{
    assets::source::normalize_rel_path,
    composition::settings::{RuntimeProfile, VideoSettings},
    foundation::{
        core::{HostObject, SurfaceId, Vec2},
        error::{VitrineError, VitrineResult},
    },
    runtime::cancel::CancellationScope,
};

#[derive(Clone, Debug, PartialEq)]
/// Playback setup applied to a player before preparation.
pub struct PlaybackConfig {
    /// `file://` URL of the video.
    pub url: Url,
    /// Whether playback restarts at the end.
    pub looping: bool,
    /// Object whose audio output plays the video's first audio track.
    pub audio_sink: HostObject,
    /// Sink volume in `[0, 1]`.
    pub volume: f32,
}

/// Handle for one error-event subscription on a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Video decoding and presentation provided by the host platform.
pub trait VideoBackend {
    /// Allocate an off-screen surface of the given pixel size.
    fn create_surface(&self, width: u32, height: u32) -> SurfaceId;
    /// Free a surface from [`create_surface`](Self::create_surface).
    fn release_surface(&self, surface: SurfaceId);
    /// Route `player`'s frames into `surface` (`None` unbinds).
    fn bind_output(&self, player: HostObject, surface: Option<SurfaceId>);
    /// Show `surface` on `display` (`None` clears it).
    fn bind_display(&self, display: HostObject, surface: Option<SurfaceId>);

    /// Apply `config` to `player`.
    fn configure(&self, player: HostObject, config: &PlaybackConfig);
    /// URL configured on `player`, if any.
    fn source(&self, player: HostObject) -> Option<Url>;
    /// Start preparing `player` asynchronously.
    fn prepare(&self, player: HostObject);
    /// Whether `player` has finished preparing.
    fn is_prepared(&self, player: HostObject) -> bool;
    /// Start playback.
    fn play(&self, player: HostObject);
    /// Stop playback.
    fn stop(&self, player: HostObject);
    /// Seek back to the start.
    fn rewind(&self, player: HostObject);
    /// Start the audio sink's output.
    fn start_audio(&self, sink: HostObject);

    /// Register `handler` for `player`'s error events.
    fn subscribe_errors(
        &self,
        player: HostObject,
        handler: Box<dyn Fn(&str)>,
    ) -> SubscriptionId;
    /// Drop a registration from [`subscribe_errors`](Self::subscribe_errors).
    fn unsubscribe(&self, player: HostObject, subscription: SubscriptionId);

    /// Whether `path` exists. Only asked on runtimes that can check files.
    fn file_exists(&self, path: &Path) -> bool;
}

/// Outcome of one [`PrepareWait::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareState {
    /// Still within the deadline.
    Waiting,
    /// The player reported ready.
    Prepared,
    /// The scope was cancelled first.
    Cancelled,
    /// The deadline passed.
    TimedOut,
}

#[derive(Clone, Copy, Debug)]
/// Deadline bookkeeping for a prepare poll. Each [`step`](Self::step) reports the latest
/// observation plus the time since the previous step.
pub struct PrepareWait {
    elapsed: Duration,
    deadline: Duration,
}

impl PrepareWait {
    /// Wait that times out after `deadline`.
    pub fn new(deadline: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            deadline,
        }
    }

    /// Preparedness wins over cancellation, cancellation over the deadline.
    pub fn step(&mut self, prepared: bool, cancelled: bool, dt: Duration) -> PrepareState {
        if prepared {
            return PrepareState::Prepared;
        }
        if cancelled {
            return PrepareState::Cancelled;
        }
        self.elapsed += dt;
        if self.elapsed > self.deadline {
            PrepareState::TimedOut
        } else {
            PrepareState::Waiting
        }
    }

    /// Time accumulated across steps.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

struct ErrorSubscription<'a> {
    backend: &'a dyn VideoBackend,
    player: HostObject,
    id: SubscriptionId,
}

impl Drop for ErrorSubscription<'_> {
    fn drop(&mut self) {
        self.backend.unsubscribe(self.player, self.id);
    }
}

/// Binds video players to render surfaces and audio sinks, and resolves playable URLs
/// under the content root.
pub struct VideoResourceBinder {
    backend: Rc<dyn VideoBackend>,
    content_root: PathBuf,
    runtime: RuntimeProfile,
    settings: VideoSettings,
}

impl VideoResourceBinder {
    /// Binder for `backend` resolving paths under `content_root`.
    pub fn new(
        backend: Rc<dyn VideoBackend>,
        content_root: impl Into<PathBuf>,
        runtime: RuntimeProfile,
        settings: VideoSettings,
    ) -> Self {
        Self {
            backend,
            content_root: content_root.into(),
            runtime,
            settings,
        }
    }

    /// Prepare and fallback knobs in use.
    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// `file://` URL for `rel` under the content root. A primary-format path is swapped for
    /// its same-named fallback when the runtime can't be trusted with the primary format and
    /// the fallback file is present. Runtimes that can't check for files keep the original.
    pub fn resolve_playable_url(&self, rel: &str) -> VitrineResult<Url> {
        let norm = normalize_rel_path(rel)?;
        let original = self.content_root.join(Path::new(&norm));
        let path = match self.fallback_for(&original) {
            Some(alt) => {
                tracing::debug!(from = %original.display(), to = %alt.display(), "using fallback video");
                alt
            }
            None => original,
        };

        let abs = std::path::absolute(&path).map_err(|e| {
            VitrineError::config_invalid(format!("video path '{}': {e}", path.display()))
        })?;
        Url::from_file_path(&abs).map_err(|()| {
            VitrineError::config_invalid(format!("video path '{}' is not a file URL", abs.display()))
        })
    }

    fn fallback_for(&self, path: &Path) -> Option<PathBuf> {
        let ext = path.extension()?.to_str()?;
        if !ext.eq_ignore_ascii_case(&self.settings.primary_extension)
            || self.runtime.primary_video_reliable
            || !self.runtime.can_check_files
        {
            return None;
        }
        let alt = path.with_extension(&self.settings.fallback_extension);
        self.backend.file_exists(&alt).then_some(alt)
    }

    /// Create a surface of at least 2x2 for `size` and bind it as `player`'s output and
    /// `display`'s input. The caller owns the surface.
    pub fn wire_output(&self, player: HostObject, display: HostObject, size: Vec2) -> SurfaceId {
        let width = surface_extent(size.x);
        let height = surface_extent(size.y);
        let surface = self.backend.create_surface(width, height);
        self.backend.bind_output(player, Some(surface));
        self.backend.bind_display(display, Some(surface));
        tracing::trace!(?player, ?surface, width, height, "render surface wired");
        surface
    }

    /// Unbind and release a surface from [`wire_output`](Self::wire_output).
    pub fn release_surface(&self, player: HostObject, display: HostObject, surface: SurfaceId) {
        self.backend.bind_output(player, None);
        self.backend.bind_display(display, None);
        self.backend.release_surface(surface);
        tracing::trace!(?player, ?surface, "render surface released");
    }

    /// Configure looping playback of `url` with audio into `audio_sink`, prepare, and play.
    ///
    /// Returns `false` on timeout or cancellation. Player error events are logged while this
    /// runs; the subscription is removed on every exit path.
    pub async fn prepare_and_play(
        &self,
        player: HostObject,
        url: &Url,
        audio_sink: HostObject,
        volume: f32,
        scope: &CancellationScope,
        timeout: Duration,
    ) -> bool {
        let errors = Rc::new(Cell::new(0u32));
        let counter = errors.clone();
        let id = self.backend.subscribe_errors(
            player,
            Box::new(move |msg: &str| {
                counter.set(counter.get() + 1);
                tracing::error!(?player, error = msg, "video player error");
            }),
        );
        let _subscription = ErrorSubscription {
            backend: self.backend.as_ref(),
            player,
            id,
        };

        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.backend.configure(
            player,
            &PlaybackConfig {
                url: url.clone(),
                looping: true,
                audio_sink,
                volume,
            },
        );
        self.backend.prepare(player);

        match self.wait_prepared(player, scope, timeout).await {
            PrepareState::Prepared => {}
            PrepareState::Cancelled => {
                tracing::debug!(?player, "video prepare cancelled");
                return false;
            }
            PrepareState::TimedOut | PrepareState::Waiting => {
                tracing::error!(?player, %url, ?timeout, errors = errors.get(), "video prepare timed out");
                return false;
            }
        }

        self.backend.play(player);
        if volume > 0.0 {
            self.backend.start_audio(audio_sink);
        }
        true
    }

    /// Stop, re-prepare, rewind and play a player that already has a source.
    pub async fn restart_from_start(
        &self,
        player: HostObject,
        scope: &CancellationScope,
        timeout: Duration,
    ) -> bool {
        if self.backend.source(player).is_none() {
            tracing::warn!(?player, "no video source configured; nothing to restart");
            return false;
        }
        self.backend.stop(player);
        self.backend.prepare(player);
        if self.wait_prepared(player, scope, timeout).await != PrepareState::Prepared {
            return false;
        }
        self.backend.rewind(player);
        self.backend.play(player);
        true
    }

    async fn wait_prepared(
        &self,
        player: HostObject,
        scope: &CancellationScope,
        timeout: Duration,
    ) -> PrepareState {
        let mut wait = PrepareWait::new(timeout);
        let poll = self.settings.poll_interval();
        let mut dt = Duration::ZERO;
        loop {
            let state = wait.step(self.backend.is_prepared(player), scope.is_cancelled(), dt);
            if state != PrepareState::Waiting {
                return state;
            }
            let tick = Instant::now();
            tokio::time::sleep(poll).await;
            dt = tick.elapsed();
        }
    }
}

impl std::fmt::Debug for VideoResourceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoResourceBinder")
            .field("content_root", &self.content_root)
            .field("runtime", &self.runtime)
            .field("settings", &self.settings)
            .finish()
    }
}

fn surface_extent(v: f64) -> u32 {
    if v.is_finite() && v > 2.0 {
        v.round().min(u32::MAX as f64) as u32
    } else {
        2
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/video.rs"]
mod tests;
