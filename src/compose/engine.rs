use std::{
    cell::{Cell, RefCell},
    fmt::Write as _,
    rc::{Rc, Weak},
};

use crate::{
    assets::{
        cache::ResourceCache,
        source::{AssetSource, CachedAsset},
    },
    composition::{
        model::{PageSpec, PopupSpec, UiSpec},
        settings::{EngineConfig, Settings},
    },
    foundation::{
        core::{HostObject, NodeId, SurfaceId},
        error::{VitrineError, VitrineResult},
    },
    media::{
        sound::{SoundBoard, SoundOutput},
        video::{VideoBackend, VideoResourceBinder},
    },
    runtime::cancel::CancellationScope,
    scene::{
        graph::{ClickAction, CloseCallback, LiveNode, NodeOrigin, NodeState, SceneGraph},
        host::SceneHost,
        instantiate::TemplateInstantiator,
        teardown::{self, DisposeCtx},
    },
};

/// The collaborators an engine builds into and loads from.
pub struct EngineHosts {
    /// Scene templates are spawned into.
    pub scene: Rc<dyn SceneHost>,
    /// Backend that plays video panels.
    pub video: Rc<dyn VideoBackend>,
    /// Source the resource cache loads from.
    pub assets: Rc<dyn AssetSource>,
    /// Output for click sounds.
    pub sound: Rc<dyn SoundOutput>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where a built node attaches.
pub enum ParentRef {
    /// A host object the engine did not build (a canvas, a screen root).
    Host(HostObject),
    /// A live node of this engine.
    Node(NodeId),
    /// No parent; the node stays unattached.
    Detached,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// What activating a node did.
pub struct ClickEffects {
    /// Whether a click sound was played.
    pub sound_played: bool,
    /// Popup the caller should open with [`Engine::build_popup`].
    pub open_popup: Option<String>,
    /// Popup root that was closed.
    pub closed_popup: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Counts of what [`Engine::shutdown`] released. All zero on repeated calls.
pub struct ShutdownReport {
    /// Video surfaces released.
    pub surfaces_released: usize,
    /// Tracked template instances released.
    pub instances_released: usize,
    /// Objects created directly by the engine and destroyed.
    pub objects_destroyed: usize,
    /// Cached assets released.
    pub assets_released: usize,
}

#[derive(Clone, Copy, Debug)]
/// Resolved attachment point inside a build.
pub(crate) struct Parent {
    pub(crate) node: Option<NodeId>,
    pub(crate) object: Option<HostObject>,
}

/// Per-engine state: the cache, the instantiator and its registry, the live node graph
/// and the root cancellation scope. Nothing here is shared between engines.
pub(crate) struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) scene: Rc<dyn SceneHost>,
    pub(crate) graph: RefCell<SceneGraph>,
    pub(crate) cache: ResourceCache,
    pub(crate) instantiator: TemplateInstantiator,
    pub(crate) video: VideoResourceBinder,
    pub(crate) sounds: SoundBoard,
    pub(crate) root_scope: CancellationScope,
    shut_down: Cell<bool>,
}

impl EngineContext {
    pub(crate) fn dispose_ctx(&self) -> DisposeCtx<'_> {
        DisposeCtx {
            graph: &self.graph,
            instantiator: &self.instantiator,
            video: &self.video,
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.config.settings
    }

    fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.replace(true) {
            return ShutdownReport::default();
        }
        self.root_scope.cancel();

        let surfaces = self.graph.borrow().surfaces();
        for (id, surface) in &surfaces {
            let object = self.graph.borrow().get(*id).map(|n| n.object);
            if let Some(object) = object {
                self.video.release_surface(object, object, *surface);
            }
        }
        let instances_released = self.instantiator.release_all();

        let mut plain: Vec<_> = {
            let graph = self.graph.borrow();
            graph
                .ids()
                .into_iter()
                .filter_map(|id| graph.get(id))
                .filter(|n| n.origin == NodeOrigin::Plain)
                .map(|n| (n.id, n.object))
                .collect()
        };
        plain.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, object) in &plain {
            self.scene.destroy(*object);
        }

        let assets_released = self.cache.release_all();
        self.graph.borrow_mut().clear();

        let report = ShutdownReport {
            surfaces_released: surfaces.len(),
            instances_released,
            objects_destroyed: plain.len(),
            assets_released,
        };
        tracing::debug!(?report, "engine shut down");
        report
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        if !self.shut_down.get() {
            self.shutdown();
        }
    }
}

#[derive(Clone)]
/// Runtime UI composition engine. Clones share the same engine; the last clone dropped
/// shuts it down if [`Engine::shutdown`] was never called.
pub struct Engine {
    ctx: Rc<EngineContext>,
}

impl Engine {
    /// Validate `config` and create an engine with its own cache, registry and root scope.
    pub fn init(config: EngineConfig, hosts: EngineHosts) -> VitrineResult<Self> {
        config.settings.validate()?;
        let video = VideoResourceBinder::new(
            hosts.video,
            config.content_root.clone(),
            config.runtime,
            config.settings.video.clone(),
        );
        let sounds =
            SoundBoard::from_settings(&config.settings.sounds, &config.content_root, hosts.sound);
        tracing::debug!(
            content_root = %config.content_root.display(),
            sounds = sounds.len(),
            fonts = config.settings.font_map.len(),
            "engine initialized"
        );
        Ok(Self {
            ctx: Rc::new(EngineContext {
                scene: hosts.scene.clone(),
                graph: RefCell::new(SceneGraph::default()),
                cache: ResourceCache::new(hosts.assets),
                instantiator: TemplateInstantiator::new(hosts.scene),
                video,
                sounds,
                root_scope: CancellationScope::new(),
                shut_down: Cell::new(false),
                config,
            }),
        })
    }

    fn ensure_live(&self) -> VitrineResult<()> {
        if self.ctx.shut_down.get() {
            Err(VitrineError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn scope_for(&self, caller: &CancellationScope) -> CancellationScope {
        CancellationScope::merge(&self.ctx.root_scope, caller)
    }

    fn resolve_parent(&self, parent: ParentRef) -> VitrineResult<Parent> {
        match parent {
            ParentRef::Host(object) => Ok(Parent {
                node: None,
                object: Some(object),
            }),
            ParentRef::Node(id) => {
                let graph = self.ctx.graph.borrow();
                let node = graph.get(id).ok_or_else(|| {
                    VitrineError::config_invalid(format!("parent node {id} is not live"))
                })?;
                Ok(Parent {
                    node: Some(id),
                    object: Some(node.object),
                })
            }
            ParentRef::Detached => Ok(Parent {
                node: None,
                object: None,
            }),
        }
    }

    /// A failure observed after shutdown is reported as [`VitrineError::ShutDown`].
    fn after_shutdown<T>(&self, result: VitrineResult<T>) -> VitrineResult<T> {
        match result {
            Err(_) if self.ctx.shut_down.get() => Err(VitrineError::ShutDown),
            other => other,
        }
    }

    /// Build any spec under `parent`. `Ok(None)` means the spec asked for nothing (a video
    /// panel without a file).
    pub async fn build(
        &self,
        spec: UiSpec<'_>,
        parent: ParentRef,
        scope: &CancellationScope,
    ) -> VitrineResult<Option<NodeId>> {
        self.ensure_live()?;
        spec.validate()?;
        let parent = self.resolve_parent(parent)?;
        let scope = self.scope_for(scope);
        let result = self.ctx.build_spec(spec, parent, &scope).await;
        self.after_shutdown(result)
    }

    /// Build a page under a host surface.
    pub async fn build_page(
        &self,
        spec: &PageSpec,
        parent: HostObject,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        self.ensure_live()?;
        spec.validate()?;
        let scope = self.scope_for(scope);
        let parent = Parent {
            node: None,
            object: Some(parent),
        };
        let result = self.ctx.build_page(spec, parent, &scope).await;
        self.after_shutdown(result)
    }

    /// Build a popup under a host surface. `on_close` runs with the popup root when its
    /// close button is clicked, before the popup is torn down.
    pub async fn build_popup(
        &self,
        spec: &PopupSpec,
        parent: HostObject,
        on_close: Option<CloseCallback>,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        self.ensure_live()?;
        spec.validate()?;
        let scope = self.scope_for(scope);
        let parent = Parent {
            node: None,
            object: Some(parent),
        };
        let result = self.ctx.build_popup(spec, parent, on_close, &scope).await;
        self.after_shutdown(result)
    }

    /// Load an asset through the engine's cache.
    pub async fn load<T: CachedAsset>(
        &self,
        key: &str,
        scope: &CancellationScope,
    ) -> VitrineResult<Rc<T>> {
        self.ensure_live()?;
        let scope = self.scope_for(scope);
        let result = self.ctx.cache.load::<T>(key, &scope).await;
        self.after_shutdown(result)
    }

    /// Run the actions bound to `node`: its click sound, popup close, and report of the
    /// popup it opens.
    pub fn click(&self, node: NodeId) -> VitrineResult<ClickEffects> {
        self.ensure_live()?;
        let actions = self
            .ctx
            .graph
            .borrow()
            .get(node)
            .map(|n| n.actions.clone())
            .ok_or_else(|| VitrineError::config_invalid(format!("node {node} is not live")))?;

        let mut effects = ClickEffects::default();
        for action in actions {
            match action {
                ClickAction::PlaySound(key) => {
                    effects.sound_played |= self.ctx.sounds.play(&key, None);
                }
                ClickAction::OpenPopup(name) => effects.open_popup = Some(name),
                ClickAction::ClosePopup { root, on_close } => {
                    if let Some(on_close) = on_close {
                        on_close.call(root);
                    }
                    self.deactivate(root);
                    if self.node_state(root) == Some(NodeState::Disposed) {
                        effects.closed_popup = Some(root);
                    }
                }
            }
        }
        Ok(effects)
    }

    /// Restart the video bound to `node` from its first frame. Closing the node stops the
    /// restart before anything plays.
    pub async fn restart_video(
        &self,
        node: NodeId,
        scope: &CancellationScope,
    ) -> VitrineResult<bool> {
        self.ensure_live()?;
        let (object, node_scope) = self
            .ctx
            .graph
            .borrow()
            .get(node)
            .filter(|n| n.surface.is_some())
            .map(|n| (n.object, n.scope.clone()))
            .ok_or_else(|| {
                VitrineError::config_invalid(format!("node {node} has no live video"))
            })?;
        let scope = CancellationScope::merge(&node_scope, scope);
        let timeout = self.ctx.video.settings().prepare_timeout();
        Ok(self
            .ctx
            .video
            .restart_from_start(object, &scope, timeout)
            .await)
    }

    /// Deactivate a composite (page or popup). Idempotent; `false` if nothing happened.
    pub fn deactivate(&self, root: NodeId) -> bool {
        if self.ctx.shut_down.get() {
            return false;
        }
        teardown::deactivate(&self.ctx.dispose_ctx(), root)
    }

    /// Dispose any live node and its subtree.
    pub fn close(&self, node: NodeId) -> bool {
        if self.ctx.shut_down.get() {
            return false;
        }
        let composite = self
            .ctx
            .graph
            .borrow()
            .get(node)
            .map(|n| n.teardown.is_some());
        match composite {
            Some(true) => self.deactivate(node),
            Some(false) => teardown::dispose_subtree(&self.ctx.dispose_ctx(), node) > 0,
            None => false,
        }
    }

    /// Cancel in-flight builds and release every surface, tracked instance, plain object
    /// and cached asset. Later calls do nothing and every other operation fails with
    /// [`VitrineError::ShutDown`].
    pub fn shutdown(&self) -> ShutdownReport {
        self.ctx.shutdown()
    }

    /// Handle that doesn't keep the engine alive, for callbacks the engine itself stores.
    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            ctx: Rc::downgrade(&self.ctx),
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.ctx.shut_down.get()
    }

    /// Global settings the engine was initialised with.
    pub fn settings(&self) -> &Settings {
        self.ctx.settings()
    }

    /// Full configuration the engine was initialised with.
    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Snapshot of a live node.
    pub fn node(&self, id: NodeId) -> Option<LiveNode> {
        self.ctx.graph.borrow().get(id).cloned()
    }

    /// First live node (in build order) named `name`, including nodes still building.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.ctx.graph.borrow().find(name)
    }

    /// `Disposed` for nodes this engine built and has since torn down.
    pub fn node_state(&self, id: NodeId) -> Option<NodeState> {
        self.ctx.graph.borrow().state(id)
    }

    /// Number of nodes in the scene graph, building or active.
    pub fn live_nodes(&self) -> usize {
        self.ctx.graph.borrow().len()
    }

    /// Instances currently held by the tracked-instance registry.
    pub fn tracked_count(&self) -> usize {
        self.ctx.instantiator.tracked_count()
    }

    /// Whether the node's host object is in the tracked-instance registry.
    pub fn is_tracked(&self, id: NodeId) -> bool {
        let object = self.ctx.graph.borrow().get(id).map(|n| n.object);
        object.is_some_and(|o| self.ctx.instantiator.is_tracked(o))
    }

    /// Surfaces currently bound to live video nodes.
    pub fn live_surfaces(&self) -> Vec<(NodeId, SurfaceId)> {
        self.ctx.graph.borrow().surfaces()
    }

    /// `PartialConstruction` if any child of the composite `id` failed to build.
    pub fn check_complete(&self, id: NodeId) -> VitrineResult<()> {
        let graph = self.ctx.graph.borrow();
        let node = graph
            .get(id)
            .ok_or_else(|| VitrineError::config_invalid(format!("node {id} is not live")))?;
        if node.failures.is_empty() {
            Ok(())
        } else {
            Err(VitrineError::PartialConstruction {
                node: node.name.clone(),
                failed: node.failures.clone(),
            })
        }
    }

    /// Indented dump of the live subtree at `id`.
    pub fn render_tree(&self, id: NodeId) -> Option<String> {
        let graph = self.ctx.graph.borrow();
        graph.get(id)?;
        let mut out = String::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((next, depth)) = stack.pop() {
            let Some(node) = graph.get(next) else {
                continue;
            };
            let _ = write!(
                out,
                "{:indent$}{:?} '{}' {} {:?}",
                "",
                node.kind,
                node.name,
                node.id,
                node.state,
                indent = depth * 2
            );
            if let Some(surface) = node.surface {
                let _ = write!(out, " surface={}", surface.0);
            }
            if !node.failures.is_empty() {
                let _ = write!(out, " failed=[{}]", node.failures.join("; "));
            }
            out.push('\n');
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Some(out)
    }
}

/// Non-owning engine handle, held by click handlers and other callbacks.
#[derive(Clone)]
pub struct WeakEngine {
    ctx: Weak<EngineContext>,
}

impl WeakEngine {
    /// The engine, unless every strong handle has been dropped.
    pub fn upgrade(&self) -> Option<Engine> {
        self.ctx.upgrade().map(|ctx| Engine { ctx })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("live_nodes", &self.live_nodes())
            .field("tracked", &self.tracked_count())
            .field("cache", &self.ctx.cache)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
