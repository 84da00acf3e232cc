use std::rc::Rc;

use futures::{
    FutureExt,
    future::{LocalBoxFuture, join_all},
};

use crate::{
    assets::source::{FontAsset, TextureAsset},
    compose::engine::{EngineContext, Parent},
    composition::model::{
        ButtonSpec, ImageSpec, KeyboardSpec, PageSpec, PopupSpec, TextSpec, UiSpec, VideoSpec,
    },
    foundation::{
        core::{Euler, HostObject, NodeId, Placement, Vec2},
        error::{VitrineError, VitrineResult},
    },
    runtime::cancel::CancellationScope,
    scene::{
        graph::{ClickAction, CloseCallback, NodeKind, NodeOrigin, NodeState},
        host::{ImageContent, NodeUpdate, TextContent},
        teardown,
    },
};

type ChildBuild<'a> = (String, LocalBoxFuture<'a, VitrineResult<Option<NodeId>>>);

impl EngineContext {
    pub(crate) async fn build_spec(
        &self,
        spec: UiSpec<'_>,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<Option<NodeId>> {
        match spec {
            UiSpec::Page(s) => self.build_page(s, parent, scope).await.map(Some),
            UiSpec::Popup(s) => self.build_popup(s, parent, None, scope).await.map(Some),
            UiSpec::Button(s) => self.build_button(s, parent, scope).await.map(Some),
            UiSpec::Image(s) => self.build_image(s, parent, scope).await.map(Some),
            UiSpec::Text(s) => self.build_text(s, parent, scope).await.map(Some),
            UiSpec::Video(s) => self.build_video(s, parent, scope).await,
            UiSpec::Keyboard(s) => self.build_keyboard(s, parent, scope).await.map(Some),
        }
    }

    /// Host object and scope of a live node. The scope is cancelled when the node is
    /// disposed, whether by this build unwinding or by a close from outside.
    fn live_handle(&self, id: NodeId) -> VitrineResult<(HostObject, CancellationScope)> {
        self.graph
            .borrow()
            .get(id)
            .map(|n| (n.object, n.scope.clone()))
            .ok_or(VitrineError::Cancelled)
    }

    fn present(&self, object: HostObject, update: NodeUpdate) {
        self.scene.present(object, update);
    }

    fn dispose(&self, id: NodeId) {
        teardown::dispose_subtree(&self.dispose_ctx(), id);
    }

    /// Spawn `template` and record the instance as a `Building` node under `parent`.
    async fn spawn_leaf(
        &self,
        template: &str,
        name: &str,
        kind: NodeKind,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let object = self.instantiator.spawn(template, parent.object, scope).await?;
        let parent_gone = parent.node.is_some_and(|p| !self.graph.borrow().is_live(p));
        if parent_gone {
            self.instantiator.release_one(object);
            return Err(VitrineError::Cancelled);
        }
        let id = self
            .graph
            .borrow_mut()
            .insert(name, kind, NodeOrigin::Tracked, object, parent.node, scope);
        if !name.is_empty() {
            self.present(object, NodeUpdate::Name(name.to_string()));
        }
        Ok(id)
    }

    /// Commit a populated leaf, or unwind it if populating failed or was cancelled. `scope`
    /// is the leaf's own scope.
    fn finish_leaf(
        &self,
        id: NodeId,
        populated: VitrineResult<()>,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let outcome = populated.and_then(|()| scope.checkpoint()).and_then(|()| {
            if self.graph.borrow().is_live(id) {
                Ok(())
            } else {
                Err(VitrineError::Cancelled)
            }
        });
        match outcome {
            Ok(()) => {
                self.graph.borrow_mut().set_state(id, NodeState::Active);
                Ok(id)
            }
            Err(err) => {
                self.dispose(id);
                Err(err)
            }
        }
    }

    async fn load_font(
        &self,
        key: &str,
        scope: &CancellationScope,
    ) -> VitrineResult<Option<Rc<FontAsset>>> {
        if key.is_empty() {
            return Ok(None);
        }
        let resolved = self.settings().font_map.resolve(key);
        self.cache.load::<FontAsset>(resolved, scope).await.map(Some)
    }

    async fn load_texture(
        &self,
        path: &str,
        scope: &CancellationScope,
    ) -> VitrineResult<Option<Rc<TextureAsset>>> {
        if path.is_empty() {
            return Ok(None);
        }
        self.cache.load::<TextureAsset>(path, scope).await.map(Some)
    }

    #[tracing::instrument(skip(self, spec, parent, scope), fields(text = %spec.name))]
    pub(crate) async fn build_text(
        &self,
        spec: &TextSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let template = &self.settings().templates.text;
        let id = self
            .spawn_leaf(template, &spec.name, NodeKind::Text, parent, scope)
            .await?;
        let (object, scope) = self.live_handle(id)?;
        let populated = async {
            let font = self.load_font(&spec.font_key, &scope).await?;
            scope.checkpoint()?;
            self.present(object, NodeUpdate::Text(TextContent::from_spec(spec, font)));
            self.present(
                object,
                NodeUpdate::Placement(Placement::from_top_left(
                    spec.position,
                    None,
                    spec.rotation,
                )),
            );
            Ok::<_, VitrineError>(())
        }
        .await;
        self.finish_leaf(id, populated, &scope)
    }

    #[tracing::instrument(skip(self, spec, parent, scope), fields(image = %spec.name))]
    pub(crate) async fn build_image(
        &self,
        spec: &ImageSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let template = &self.settings().templates.image;
        let id = self
            .spawn_leaf(template, &spec.name, NodeKind::Image, parent, scope)
            .await?;
        let (object, scope) = self.live_handle(id)?;
        let populated = async {
            let texture = self.load_texture(&spec.source_image_path, &scope).await?;
            scope.checkpoint()?;
            self.present(
                object,
                NodeUpdate::Image(ImageContent::from_spec(spec, texture)),
            );
            self.present(
                object,
                NodeUpdate::Placement(Placement::from_top_left(
                    spec.position,
                    Some(spec.size),
                    spec.rotation,
                )),
            );
            Ok::<_, VitrineError>(())
        }
        .await;
        self.finish_leaf(id, populated, &scope)
    }

    pub(crate) async fn build_keyboard(
        &self,
        spec: &KeyboardSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let template = &self.settings().templates.keyboard;
        let id = self
            .spawn_leaf(template, &spec.name, NodeKind::Keyboard, parent, scope)
            .await?;
        let (object, scope) = self.live_handle(id)?;
        self.present(
            object,
            NodeUpdate::Placement(Placement::from_top_left(
                spec.position,
                Some(spec.size),
                Euler::ZERO,
            )),
        );
        self.finish_leaf(id, Ok(()), &scope)
    }

    /// A video panel without a file builds nothing. A panel whose video fails to start is
    /// kept (blank) and the failure logged.
    #[tracing::instrument(skip(self, spec, parent, scope), fields(video = %spec.name))]
    pub(crate) async fn build_video(
        &self,
        spec: &VideoSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<Option<NodeId>> {
        if spec.file_path.is_empty() {
            tracing::debug!("video has no file; skipped");
            return Ok(None);
        }
        scope.checkpoint()?;
        let template = &self.settings().templates.video;
        let id = self
            .spawn_leaf(template, &spec.name, NodeKind::Video, parent, scope)
            .await?;
        let (object, scope) = self.live_handle(id)?;
        let populated = async {
            self.present(
                object,
                NodeUpdate::Placement(Placement::from_top_left(
                    spec.position,
                    Some(spec.size),
                    Euler::ZERO,
                )),
            );
            if !self.start_video(id, object, spec.size, spec, &scope).await? {
                tracing::error!(file = %spec.file_path, "failed to prepare video");
            }
            Ok::<_, VitrineError>(())
        }
        .await;
        self.finish_leaf(id, populated, &scope).map(Some)
    }

    /// Wire a surface for `object` (owned by node `id` from here on) and start `video` on it.
    /// `scope` is the node's scope, so disposing the node stops the prepare wait before
    /// anything plays. `Ok(false)` when the video did not start; cancellation is an error.
    async fn start_video(
        &self,
        id: NodeId,
        object: HostObject,
        size: Vec2,
        video: &VideoSpec,
        scope: &CancellationScope,
    ) -> VitrineResult<bool> {
        scope.checkpoint()?;
        let surface = self.video.wire_output(object, object, size);
        if let Some(node) = self.graph.borrow_mut().get_mut(id) {
            node.surface = Some(surface);
        }
        let url = self.video.resolve_playable_url(&video.file_path)?;
        let timeout = self.video.settings().prepare_timeout();
        let started = self
            .video
            .prepare_and_play(object, &url, object, video.volume, scope, timeout)
            .await;
        scope.checkpoint()?;
        Ok(started)
    }

    fn release_node_surface(&self, id: NodeId, object: HostObject) {
        let surface = self
            .graph
            .borrow_mut()
            .get_mut(id)
            .and_then(|n| n.surface.take());
        if let Some(surface) = surface {
            self.video.release_surface(object, object, surface);
        }
    }

    #[tracing::instrument(skip(self, spec, parent, scope), fields(button = %spec.name))]
    pub(crate) async fn build_button(
        &self,
        spec: &ButtonSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        let template = &self.settings().templates.button;
        let id = self
            .spawn_leaf(template, &spec.name, NodeKind::Button, parent, scope)
            .await?;
        let (object, scope) = self.live_handle(id)?;
        let populated = self.populate_button(id, object, spec, &scope).await;
        self.finish_leaf(id, populated, &scope)
    }

    async fn populate_button(
        &self,
        id: NodeId,
        object: HostObject,
        spec: &ButtonSpec,
        scope: &CancellationScope,
    ) -> VitrineResult<()> {
        self.present(
            object,
            NodeUpdate::Placement(Placement::from_top_left(
                spec.position,
                Some(spec.size),
                spec.rotation,
            )),
        );

        let mut video_playing = false;
        if let Some(video) = spec
            .background_video
            .as_ref()
            .filter(|v| !v.file_path.is_empty())
        {
            video_playing = match self.start_video(id, object, spec.size, video, scope).await {
                Ok(started) => started,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "background video unusable");
                    false
                }
            };
            if !video_playing {
                self.release_node_surface(id, object);
            }
        }

        if !video_playing && let Some(bg) = &spec.background_image {
            let texture = match self.load_texture(&bg.source_image_path, scope).await {
                Ok(texture) => texture,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "background image unusable; using its color");
                    None
                }
            };
            scope.checkpoint()?;
            self.present(
                object,
                NodeUpdate::Background(ImageContent::from_spec(bg, texture)),
            );
        }

        if let Some(label) = spec.text.as_ref().filter(|t| !t.text.is_empty()) {
            let font = self.load_font(&label.font_key, scope).await?;
            scope.checkpoint()?;
            self.present(
                object,
                NodeUpdate::Label {
                    content: TextContent::from_spec(label, font),
                    placement: Placement::local(label.position, label.rotation),
                },
            );
        }

        if let Some(icon) = spec
            .additional_image
            .as_ref()
            .filter(|i| !i.source_image_path.is_empty())
        {
            let here = Parent {
                node: Some(id),
                object: Some(object),
            };
            match self.build_image(icon, here, scope).await {
                Ok(_) => {}
                Err(err) if err.is_cancelled() && scope.is_cancelled() => return Err(err),
                Err(err) if err.is_cancelled() => {
                    tracing::debug!(icon = %icon.name, "button icon closed while building");
                }
                Err(err) => {
                    tracing::warn!(icon = %icon.name, error = %err, "button icon skipped");
                    if let Some(node) = self.graph.borrow_mut().get_mut(id) {
                        node.failures.push(format!("image '{}': {err}", icon.name));
                    }
                }
            }
        }

        let mut graph = self.graph.borrow_mut();
        let node = graph.get_mut(id).ok_or(VitrineError::Cancelled)?;
        if !spec.sound_key.is_empty() {
            node.actions
                .push(ClickAction::PlaySound(spec.sound_key.clone()));
        }
        if !spec.target_popup_name.is_empty() {
            node.actions
                .push(ClickAction::OpenPopup(spec.target_popup_name.clone()));
        }
        Ok(())
    }

    /// Await every child build, then settle the composite `root`: `Active` with recorded
    /// failures, or torn down if the call was cancelled or `root` itself was disposed.
    /// `scope` is the call's scope. A child that was closed on its own is simply left out.
    async fn settle_children(
        &self,
        root: NodeId,
        children: Vec<ChildBuild<'_>>,
        mut failures: Vec<String>,
        scope: &CancellationScope,
    ) -> VitrineResult<()> {
        let (names, builds): (Vec<_>, Vec<_>) = children.into_iter().unzip();
        let results = join_all(builds).await;

        let mut shut_down = false;
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(_) => {}
                Err(VitrineError::Cancelled) => {
                    tracing::debug!(child = %name, "child build cancelled");
                }
                Err(VitrineError::ShutDown) => shut_down = true,
                Err(err) => {
                    tracing::warn!(child = %name, error = %err, "child build failed; omitted");
                    failures.push(format!("{name}: {err}"));
                }
            }
        }

        if shut_down {
            return Err(VitrineError::ShutDown);
        }
        if scope.is_cancelled() || !self.graph.borrow().is_live(root) {
            tracing::debug!(%root, "composite build cancelled; unwinding");
            self.dispose(root);
            return Err(VitrineError::Cancelled);
        }

        let mut graph = self.graph.borrow_mut();
        if let Some(node) = graph.get_mut(root) {
            node.state = NodeState::Active;
            node.failures = failures;
        }
        Ok(())
    }

    /// Create the empty root of a page or popup. Children are built under the returned
    /// scope, which closing the root cancels.
    fn create_composite(
        &self,
        name: &str,
        fallback: &str,
        kind: NodeKind,
        parent: Parent,
        scope: &CancellationScope,
    ) -> (NodeId, HostObject, CancellationScope) {
        let name = if name.is_empty() { fallback } else { name };
        let object = self.scene.create_empty(name, parent.object);
        let mut graph = self.graph.borrow_mut();
        let id = graph.insert(name, kind, NodeOrigin::Plain, object, parent.node, scope);
        let node_scope = graph
            .get(id)
            .map(|n| n.scope.clone())
            .unwrap_or_else(|| scope.clone());
        (id, object, node_scope)
    }

    #[tracing::instrument(skip(self, spec, parent, scope), fields(page = %spec.name))]
    pub(crate) async fn build_page(
        &self,
        spec: &PageSpec,
        parent: Parent,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        scope.checkpoint()?;
        let (root, object, root_scope) =
            self.create_composite(&spec.name, "GeneratedPage", NodeKind::Page, parent, scope);
        self.present(
            object,
            NodeUpdate::Placement(Placement::from_top_left(
                spec.position,
                Some(spec.size),
                Euler::ZERO,
            )),
        );

        let here = Parent {
            node: Some(root),
            object: Some(object),
        };
        let mut children: Vec<ChildBuild<'_>> = Vec::with_capacity(spec.child_count());
        for text in &spec.texts {
            children.push((
                format!("text '{}'", text.name),
                self.build_text(text, here, &root_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }
        for image in &spec.images {
            children.push((
                format!("image '{}'", image.name),
                self.build_image(image, here, &root_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }
        for button in &spec.buttons {
            children.push((
                format!("button '{}'", button.name),
                self.build_button(button, here, &root_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }
        for video in &spec.videos {
            children.push((
                format!("video '{}'", video.name),
                self.build_video(video, here, &root_scope).boxed_local(),
            ));
        }
        for keyboard in &spec.keyboards {
            children.push((
                format!("keyboard '{}'", keyboard.name),
                self.build_keyboard(keyboard, here, &root_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }

        self.settle_children(root, children, Vec::new(), scope).await?;
        tracing::debug!(%root, "page built");
        Ok(root)
    }

    /// The background is built first at the popup's origin; texts, images and the close
    /// button are then built concurrently on top of it (on the root if it failed).
    #[tracing::instrument(skip(self, spec, parent, on_close, scope), fields(popup = %spec.name))]
    pub(crate) async fn build_popup(
        &self,
        spec: &PopupSpec,
        parent: Parent,
        on_close: Option<CloseCallback>,
        scope: &CancellationScope,
    ) -> VitrineResult<NodeId> {
        scope.checkpoint()?;
        let (root, object, root_scope) =
            self.create_composite(&spec.name, "GeneratedPopup", NodeKind::Popup, parent, scope);
        let mut container = Parent {
            node: Some(root),
            object: Some(object),
        };
        let mut container_scope = root_scope.clone();

        let mut failures = Vec::new();
        if let Some(bg) = &spec.background_image {
            let bg = ImageSpec {
                position: Vec2::ZERO,
                ..bg.clone()
            };
            match self.build_image(&bg, container, &root_scope).await {
                Ok(id) => {
                    if let Ok((bg_object, bg_scope)) = self.live_handle(id) {
                        container = Parent {
                            node: Some(id),
                            object: Some(bg_object),
                        };
                        container_scope = bg_scope;
                    }
                }
                Err(VitrineError::Cancelled)
                    if scope.is_cancelled() || !self.graph.borrow().is_live(root) =>
                {
                    self.dispose(root);
                    return Err(VitrineError::Cancelled);
                }
                Err(VitrineError::Cancelled) => {
                    tracing::debug!("popup background closed while building; using the root");
                }
                Err(VitrineError::ShutDown) => return Err(VitrineError::ShutDown),
                Err(err) => {
                    tracing::warn!(error = %err, "popup background failed; building on the root");
                    failures.push(format!("background '{}': {err}", bg.name));
                }
            }
        }

        let child_scope = &container_scope;
        let mut children: Vec<ChildBuild<'_>> = Vec::new();
        for text in &spec.texts {
            children.push((
                format!("text '{}'", text.name),
                self.build_text(text, container, child_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }
        for image in &spec.images {
            children.push((
                format!("image '{}'", image.name),
                self.build_image(image, container, child_scope)
                    .map(|r| r.map(Some))
                    .boxed_local(),
            ));
        }
        if let Some(close) = &spec.close_button {
            let on_close = on_close.clone();
            children.push((
                format!("close button '{}'", close.name),
                async move {
                    let id = self.build_button(close, container, child_scope).await?;
                    if let Some(node) = self.graph.borrow_mut().get_mut(id) {
                        node.actions.push(ClickAction::ClosePopup { root, on_close });
                    }
                    Ok(Some(id))
                }
                .boxed_local(),
            ));
        }

        self.settle_children(root, children, failures, scope).await?;
        tracing::debug!(%root, "popup built");
        Ok(root)
    }
}
