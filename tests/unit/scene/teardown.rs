use std::rc::Rc;

use super::*;
use crate::{
    composition::settings::{RuntimeProfile, VideoSettings},
    foundation::core::Vec2,
    headless::HeadlessHost,
    runtime::cancel::CancellationScope,
    scene::{graph::NodeKind, host::SceneHost},
};

struct Fixture {
    host: HeadlessHost,
    graph: RefCell<SceneGraph>,
    inst: TemplateInstantiator,
    video: VideoResourceBinder,
}

impl Fixture {
    fn new() -> Self {
        let host = HeadlessHost::new();
        Self {
            graph: RefCell::new(SceneGraph::default()),
            inst: TemplateInstantiator::new(Rc::new(host.clone())),
            video: VideoResourceBinder::new(
                Rc::new(host.clone()),
                "/content",
                RuntimeProfile::current(),
                VideoSettings::default(),
            ),
            host,
        }
    }

    fn ctx(&self) -> DisposeCtx<'_> {
        DisposeCtx {
            graph: &self.graph,
            instantiator: &self.inst,
            video: &self.video,
        }
    }

    async fn tracked(&self, kind: NodeKind, parent: NodeId) -> NodeId {
        let parent_obj = self.graph.borrow().get(parent).unwrap().object();
        let obj = self
            .inst
            .spawn("Prefabs/Leaf", Some(parent_obj), &CancellationScope::never())
            .await
            .unwrap();
        self.graph
            .borrow_mut()
            .insert(
                "leaf",
                kind,
                NodeOrigin::Tracked,
                obj,
                Some(parent),
                &CancellationScope::never(),
            )
    }
}

#[tokio::test]
async fn deactivation_releases_surfaces_and_routes_by_origin() {
    let fx = Fixture::new();
    let root_obj = fx.host.create_empty("popup", None);
    let root = fx.graph.borrow_mut().insert(
        "popup",
        NodeKind::Popup,
        NodeOrigin::Plain,
        root_obj,
        None,
        &CancellationScope::never(),
    );
    let video = fx.tracked(NodeKind::Video, root).await;
    let image = fx.tracked(NodeKind::Image, root).await;
    let icon = fx.tracked(NodeKind::Image, image).await;

    let video_obj = fx.graph.borrow().get(video).unwrap().object();
    let surface = fx.video.wire_output(video_obj, video_obj, Vec2::new(64.0, 64.0));
    fx.graph.borrow_mut().get_mut(video).unwrap().surface = Some(surface);

    assert!(deactivate(&fx.ctx(), root));
    assert_eq!(fx.inst.tracked_count(), 0);
    assert_eq!(fx.host.released_surfaces(), vec![surface]);
    assert_eq!(fx.host.destroyed(), vec![root_obj]);
    assert_eq!(fx.host.released().len(), 3);
    assert!(fx.host.live_objects().is_empty());
    for id in [root, video, image, icon] {
        assert_eq!(fx.graph.borrow().state(id), Some(NodeState::Disposed));
    }
    assert_eq!(fx.graph.borrow().len(), 0);

    assert!(!deactivate(&fx.ctx(), root));
    assert_eq!(fx.host.released_surfaces().len(), 1);
}

#[tokio::test]
async fn leaves_have_no_coordinator() {
    let fx = Fixture::new();
    let root_obj = fx.host.create_empty("page", None);
    let root = fx.graph.borrow_mut().insert(
        "page",
        NodeKind::Page,
        NodeOrigin::Plain,
        root_obj,
        None,
        &CancellationScope::never(),
    );
    let leaf = fx.tracked(NodeKind::Text, root).await;
    assert!(!deactivate(&fx.ctx(), leaf));

    assert_eq!(dispose_subtree(&fx.ctx(), leaf), 1);
    assert!(fx.graph.borrow().get(root).unwrap().children().is_empty());
    assert!(deactivate(&fx.ctx(), root));
    assert_eq!(fx.host.destroyed(), vec![root_obj]);
}

#[tokio::test]
async fn already_released_instance_is_skipped() {
    let fx = Fixture::new();
    let root_obj = fx.host.create_empty("page", None);
    let root = fx.graph.borrow_mut().insert(
        "page",
        NodeKind::Page,
        NodeOrigin::Plain,
        root_obj,
        None,
        &CancellationScope::never(),
    );
    let leaf = fx.tracked(NodeKind::Text, root).await;
    let leaf_obj = fx.graph.borrow().get(leaf).unwrap().object();
    assert!(fx.inst.release_one(leaf_obj));

    assert_eq!(dispose_subtree(&fx.ctx(), root), 2);
    assert_eq!(fx.host.released(), vec![leaf_obj]);
}

#[tokio::test]
async fn disposal_cancels_node_scopes() {
    let fx = Fixture::new();
    let root_obj = fx.host.create_empty("page", None);
    let root = fx.graph.borrow_mut().insert(
        "page",
        NodeKind::Page,
        NodeOrigin::Plain,
        root_obj,
        None,
        &CancellationScope::never(),
    );
    let kept = fx.tracked(NodeKind::Text, root).await;
    let closed = fx.tracked(NodeKind::Image, root).await;
    let kept_scope = fx.graph.borrow().get(kept).unwrap().scope.clone();
    let closed_scope = fx.graph.borrow().get(closed).unwrap().scope.clone();

    assert_eq!(dispose_subtree(&fx.ctx(), closed), 1);
    assert!(closed_scope.is_cancelled());
    assert!(!kept_scope.is_cancelled());

    assert!(deactivate(&fx.ctx(), root));
    assert!(kept_scope.is_cancelled());
}
