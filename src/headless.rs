//! In-memory collaborators: a scene host, video backend and sound output that only record
//! what the engine asks of them, plus an asset source that never touches the disk.
//!
//! Used by the `vitrine compose` dry run and by tests. Latencies are real `tokio::time`
//! sleeps, so a paused test clock drives them deterministically.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, HashMap},
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};

use futures::{FutureExt, future::LocalBoxFuture};
use tokio::time::Instant;
use url::Url;

use crate::{
    assets::source::{
        AssetHandle, AssetKey, AssetKind, AssetSource, FontAsset, MaterialAsset, TextureAsset,
    },
    compose::engine::EngineHosts,
    foundation::core::{HostObject, SurfaceId},
    media::{
        sound::{SoundClip, SoundOutput},
        video::{PlaybackConfig, SubscriptionId, VideoBackend},
    },
    scene::host::{NodeUpdate, SceneHost, SpawnError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// How an object came into existence on the headless host.
pub enum ObjectOrigin {
    /// Spawned from the named template.
    Template(String),
    /// Created empty with the given name.
    Empty(String),
}

/// What the headless host knows about one object.
#[derive(Clone, Debug)]
pub struct ObjectRecord {
    /// How the object was created.
    pub origin: ObjectOrigin,
    /// Host parent at creation.
    pub parent: Option<HostObject>,
    /// False once released or destroyed.
    pub alive: bool,
}

#[derive(Clone, Debug, Default)]
/// Observable state of one video player.
pub struct PlayerState {
    /// Last playback config applied.
    pub config: Option<PlaybackConfig>,
    /// Surface receiving frames.
    pub output: Option<SurfaceId>,
    /// Surface being displayed.
    pub display: Option<SurfaceId>,
    /// Whether playback is running.
    pub playing: bool,
    /// Whether the audio sink was started.
    pub audio_started: bool,
    /// Number of stop calls.
    pub stops: u32,
    /// Number of rewind calls.
    pub rewinds: u32,
    prepare_started: Option<Instant>,
}

struct HostState {
    next_id: u64,
    spawn_latency: Duration,
    template_latency: HashMap<String, Duration>,
    /// Failing templates; `true` leaves a partially created object behind.
    failing: HashMap<String, bool>,
    /// `None` never finishes preparing.
    prepare_delay: Option<Duration>,
    objects: BTreeMap<HostObject, ObjectRecord>,
    spawned: usize,
    released: Vec<HostObject>,
    destroyed: Vec<HostObject>,
    surfaces: BTreeMap<SurfaceId, (u32, u32)>,
    released_surfaces: Vec<SurfaceId>,
    players: BTreeMap<HostObject, PlayerState>,
    subscriptions: BTreeMap<SubscriptionId, (HostObject, Rc<dyn Fn(&str)>)>,
    updates: Vec<(HostObject, NodeUpdate)>,
    sounds: Vec<(String, f32)>,
    files: BTreeSet<PathBuf>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            next_id: 1,
            spawn_latency: Duration::ZERO,
            template_latency: HashMap::new(),
            failing: HashMap::new(),
            prepare_delay: Some(Duration::ZERO),
            objects: BTreeMap::new(),
            spawned: 0,
            released: Vec::new(),
            destroyed: Vec::new(),
            surfaces: BTreeMap::new(),
            released_surfaces: Vec::new(),
            players: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            updates: Vec::new(),
            sounds: Vec::new(),
            files: BTreeSet::new(),
        }
    }
}

impl HostState {
    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn add_object(&mut self, origin: ObjectOrigin, parent: Option<HostObject>) -> HostObject {
        let object = HostObject(self.mint());
        self.objects.insert(
            object,
            ObjectRecord {
                origin,
                parent,
                alive: true,
            },
        );
        object
    }

    /// Mark `object` and every host-side descendant dead.
    fn kill(&mut self, object: HostObject) {
        let mut stack = vec![object];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.objects.get_mut(&next) {
                record.alive = false;
            }
            stack.extend(
                self.objects
                    .iter()
                    .filter(|(_, r)| r.alive && r.parent == Some(next))
                    .map(|(o, _)| *o),
            );
        }
    }
}

#[derive(Clone, Default)]
/// Recording [`SceneHost`], [`VideoBackend`] and [`SoundOutput`] in one.
pub struct HeadlessHost {
    state: Rc<RefCell<HostState>>,
}

impl HeadlessHost {
    /// Host with no latency, no failures and players that prepare immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators for [`crate::Engine::init`], all backed by this host.
    pub fn hosts(&self, assets: Rc<dyn AssetSource>) -> EngineHosts {
        let this = Rc::new(self.clone());
        EngineHosts {
            scene: this.clone(),
            video: this.clone(),
            assets,
            sound: this,
        }
    }

    /// Delay applied to every template instantiation.
    pub fn set_spawn_latency(&self, latency: Duration) {
        self.state.borrow_mut().spawn_latency = latency;
    }

    /// Delay for one template, overriding the global latency.
    pub fn set_template_latency(&self, template: &str, latency: Duration) {
        self.state
            .borrow_mut()
            .template_latency
            .insert(template.to_string(), latency);
    }

    /// Make `template` fail to instantiate, optionally leaving a partial object behind.
    pub fn fail_template(&self, template: &str, leave_partial: bool) {
        self.state
            .borrow_mut()
            .failing
            .insert(template.to_string(), leave_partial);
    }

    /// Time from `prepare` until a player reports prepared; `None` never prepares.
    pub fn set_prepare_delay(&self, delay: Option<Duration>) {
        self.state.borrow_mut().prepare_delay = delay;
    }

    /// Register a file [`VideoBackend::file_exists`] reports as present.
    pub fn add_file(&self, path: impl Into<PathBuf>) {
        self.state.borrow_mut().files.insert(path.into());
    }

    /// Deliver a player error event to current subscribers.
    pub fn emit_player_error(&self, player: HostObject, message: &str) {
        let handlers: Vec<_> = self
            .state
            .borrow()
            .subscriptions
            .values()
            .filter(|(p, _)| *p == player)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(message);
        }
    }

    /// Record of `object`, dead or alive.
    pub fn record(&self, object: HostObject) -> Option<ObjectRecord> {
        self.state.borrow().objects.get(&object).cloned()
    }

    /// Whether `object` exists and has not been released or destroyed.
    pub fn is_alive(&self, object: HostObject) -> bool {
        self.state
            .borrow()
            .objects
            .get(&object)
            .is_some_and(|r| r.alive)
    }

    /// Objects not yet released or destroyed.
    pub fn live_objects(&self) -> Vec<HostObject> {
        self.state
            .borrow()
            .objects
            .iter()
            .filter(|(_, r)| r.alive)
            .map(|(o, _)| *o)
            .collect()
    }

    /// Template instantiations that completed successfully.
    pub fn spawned(&self) -> usize {
        self.state.borrow().spawned
    }

    /// Objects passed to [`SceneHost::release_instance`], in call order.
    pub fn released(&self) -> Vec<HostObject> {
        self.state.borrow().released.clone()
    }

    /// Objects passed to [`SceneHost::destroy`], in call order.
    pub fn destroyed(&self) -> Vec<HostObject> {
        self.state.borrow().destroyed.clone()
    }

    /// Surfaces created and not yet released.
    pub fn live_surfaces(&self) -> Vec<SurfaceId> {
        self.state.borrow().surfaces.keys().copied().collect()
    }

    /// Pixel size `surface` was created with.
    pub fn surface_size(&self, surface: SurfaceId) -> Option<(u32, u32)> {
        self.state.borrow().surfaces.get(&surface).copied()
    }

    /// Surfaces released, in call order.
    pub fn released_surfaces(&self) -> Vec<SurfaceId> {
        self.state.borrow().released_surfaces.clone()
    }

    /// State of `player`, if it was ever configured or prepared.
    pub fn player(&self, player: HostObject) -> Option<PlayerState> {
        self.state.borrow().players.get(&player).cloned()
    }

    /// Error subscriptions currently registered.
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Updates presented to `object`, in call order.
    pub fn updates_for(&self, object: HostObject) -> Vec<NodeUpdate> {
        self.state
            .borrow()
            .updates
            .iter()
            .filter(|(o, _)| *o == object)
            .map(|(_, u)| u.clone())
            .collect()
    }

    /// One-shot sounds played, as `(key, volume)`.
    pub fn sounds_played(&self) -> Vec<(String, f32)> {
        self.state.borrow().sounds.clone()
    }
}

impl SceneHost for HeadlessHost {
    fn instantiate(
        &self,
        template_key: &str,
        parent: Option<HostObject>,
    ) -> LocalBoxFuture<'static, Result<HostObject, SpawnError>> {
        let state = self.state.clone();
        let template = template_key.to_string();
        let latency = {
            let s = state.borrow();
            s.template_latency
                .get(&template)
                .copied()
                .unwrap_or(s.spawn_latency)
        };
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut s = state.borrow_mut();
            if let Some(&leave_partial) = s.failing.get(&template) {
                let err = anyhow::anyhow!("template '{template}' is not available");
                if leave_partial {
                    let partial = s.add_object(ObjectOrigin::Template(template), parent);
                    return Err(SpawnError::partial(partial, err));
                }
                return Err(err.into());
            }
            s.spawned += 1;
            Ok(s.add_object(ObjectOrigin::Template(template), parent))
        }
        .boxed_local()
    }

    fn release_instance(&self, object: HostObject) {
        let mut s = self.state.borrow_mut();
        s.released.push(object);
        s.kill(object);
    }

    fn create_empty(&self, name: &str, parent: Option<HostObject>) -> HostObject {
        self.state
            .borrow_mut()
            .add_object(ObjectOrigin::Empty(name.to_string()), parent)
    }

    fn destroy(&self, object: HostObject) {
        let mut s = self.state.borrow_mut();
        s.destroyed.push(object);
        s.kill(object);
    }

    fn present(&self, object: HostObject, update: NodeUpdate) {
        self.state.borrow_mut().updates.push((object, update));
    }
}

impl VideoBackend for HeadlessHost {
    fn create_surface(&self, width: u32, height: u32) -> SurfaceId {
        let mut s = self.state.borrow_mut();
        let surface = SurfaceId(s.mint());
        s.surfaces.insert(surface, (width, height));
        surface
    }

    fn release_surface(&self, surface: SurfaceId) {
        let mut s = self.state.borrow_mut();
        s.surfaces.remove(&surface);
        s.released_surfaces.push(surface);
    }

    fn bind_output(&self, player: HostObject, surface: Option<SurfaceId>) {
        self.state
            .borrow_mut()
            .players
            .entry(player)
            .or_default()
            .output = surface;
    }

    fn bind_display(&self, display: HostObject, surface: Option<SurfaceId>) {
        self.state
            .borrow_mut()
            .players
            .entry(display)
            .or_default()
            .display = surface;
    }

    fn configure(&self, player: HostObject, config: &PlaybackConfig) {
        self.state
            .borrow_mut()
            .players
            .entry(player)
            .or_default()
            .config = Some(config.clone());
    }

    fn source(&self, player: HostObject) -> Option<Url> {
        self.state
            .borrow()
            .players
            .get(&player)
            .and_then(|p| p.config.as_ref())
            .map(|c| c.url.clone())
    }

    fn prepare(&self, player: HostObject) {
        self.state
            .borrow_mut()
            .players
            .entry(player)
            .or_default()
            .prepare_started = Some(Instant::now());
    }

    fn is_prepared(&self, player: HostObject) -> bool {
        let s = self.state.borrow();
        let Some(delay) = s.prepare_delay else {
            return false;
        };
        s.players
            .get(&player)
            .and_then(|p| p.prepare_started)
            .is_some_and(|started| started.elapsed() >= delay)
    }

    fn play(&self, player: HostObject) {
        self.state
            .borrow_mut()
            .players
            .entry(player)
            .or_default()
            .playing = true;
    }

    fn stop(&self, player: HostObject) {
        let mut s = self.state.borrow_mut();
        let p = s.players.entry(player).or_default();
        p.playing = false;
        p.stops += 1;
    }

    fn rewind(&self, player: HostObject) {
        self.state
            .borrow_mut()
            .players
            .entry(player)
            .or_default()
            .rewinds += 1;
    }

    fn start_audio(&self, sink: HostObject) {
        self.state
            .borrow_mut()
            .players
            .entry(sink)
            .or_default()
            .audio_started = true;
    }

    fn subscribe_errors(&self, player: HostObject, handler: Box<dyn Fn(&str)>) -> SubscriptionId {
        let mut s = self.state.borrow_mut();
        let id = SubscriptionId(s.mint());
        s.subscriptions.insert(id, (player, Rc::from(handler)));
        id
    }

    fn unsubscribe(&self, _player: HostObject, subscription: SubscriptionId) {
        self.state.borrow_mut().subscriptions.remove(&subscription);
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.state.borrow().files.contains(path) || path.is_file()
    }
}

impl SoundOutput for HeadlessHost {
    fn play_one_shot(&self, clip: &SoundClip, volume: f32) -> bool {
        self.state
            .borrow_mut()
            .sounds
            .push((clip.key.clone(), volume));
        true
    }
}

impl std::fmt::Debug for HeadlessHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("HeadlessHost")
            .field("objects", &s.objects.len())
            .field("surfaces", &s.surfaces.len())
            .finish()
    }
}

#[derive(Default)]
struct MemoryState {
    latency: Duration,
    failing: BTreeSet<String>,
    loads: BTreeMap<AssetKey, u32>,
    released: Vec<AssetKey>,
}

#[derive(Clone, Default)]
/// Asset source that fabricates small in-memory assets for any key.
pub struct MemoryAssetSource {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryAssetSource {
    /// Source with no latency and no failing keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every load.
    pub fn set_latency(&self, latency: Duration) {
        self.state.borrow_mut().latency = latency;
    }

    /// Make every load of `path` (any kind) fail.
    pub fn fail_key(&self, path: &str) {
        self.state.borrow_mut().failing.insert(path.to_string());
    }

    /// Loads issued for `key` so far.
    pub fn load_count(&self, key: &AssetKey) -> u32 {
        self.state.borrow().loads.get(key).copied().unwrap_or(0)
    }

    /// Loads issued across all keys.
    pub fn total_loads(&self) -> u32 {
        self.state.borrow().loads.values().sum()
    }

    /// Keys released, in call order.
    pub fn released(&self) -> Vec<AssetKey> {
        self.state.borrow().released.clone()
    }
}

impl AssetSource for MemoryAssetSource {
    fn load(&self, key: &AssetKey) -> LocalBoxFuture<'static, anyhow::Result<AssetHandle>> {
        let latency = {
            let mut s = self.state.borrow_mut();
            *s.loads.entry(key.clone()).or_default() += 1;
            s.latency
        };
        let state = self.state.clone();
        let key = key.clone();
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if state.borrow().failing.contains(&key.path) {
                anyhow::bail!("asset '{}' is not available", key.path);
            }
            let name = key.path.clone();
            Ok(match key.kind {
                AssetKind::Font => AssetHandle::new(
                    key.path,
                    FontAsset {
                        name,
                        bytes: Rc::new(Vec::new()),
                    },
                ),
                AssetKind::Texture => AssetHandle::new(
                    key.path,
                    TextureAsset {
                        width: 1,
                        height: 1,
                        rgba8_premul: Rc::new(vec![255; 4]),
                    },
                ),
                AssetKind::Material => AssetHandle::new(
                    key.path,
                    MaterialAsset {
                        name,
                        bytes: Rc::new(Vec::new()),
                    },
                ),
            })
        }
        .boxed_local()
    }

    fn release(&self, handle: &AssetHandle) {
        self.state.borrow_mut().released.push(handle.key().clone());
    }
}

impl std::fmt::Debug for MemoryAssetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAssetSource")
            .field("loads", &self.total_loads())
            .finish()
    }
}
