use std::cell::{Cell, RefCell};

use crate::{
    foundation::core::NodeId,
    media::video::VideoResourceBinder,
    scene::{
        graph::{NodeOrigin, NodeState, SceneGraph},
        instantiate::TemplateInstantiator,
    },
};

/// What disposal needs to reach: the graph, the instantiator that owns tracked spawns,
/// and the binder that owns surface release.
pub(crate) struct DisposeCtx<'a> {
    pub(crate) graph: &'a RefCell<SceneGraph>,
    pub(crate) instantiator: &'a TemplateInstantiator,
    pub(crate) video: &'a VideoResourceBinder,
}

#[derive(Clone, Debug, Default)]
/// Attached to composite roots. Deactivation disposes the composite's children and then
/// the root itself, once.
pub(crate) struct TeardownCoordinator {
    deactivated: Cell<bool>,
}

/// Deactivate the composite rooted at `root`. Returns `false` when `root` has no
/// coordinator, is already gone, or was deactivated before.
pub(crate) fn deactivate(ctx: &DisposeCtx<'_>, root: NodeId) -> bool {
    let children = {
        let graph = ctx.graph.borrow();
        let Some(node) = graph.get(root) else {
            return false;
        };
        let Some(teardown) = &node.teardown else {
            return false;
        };
        if teardown.deactivated.replace(true) {
            return false;
        }
        node.children.clone()
    };

    tracing::debug!(%root, children = children.len(), "deactivating composite");
    for child in children {
        dispose_subtree(ctx, child);
    }
    dispose_subtree(ctx, root);
    true
}

/// Dispose `id` and everything below it, children first. Each node's scope is cancelled so
/// work still running on it stops at its next checkpoint. Surfaces are released before
/// the owning object; tracked spawns go back through the instantiator and plain objects
/// are destroyed directly. Returns the number of nodes disposed.
pub(crate) fn dispose_subtree(ctx: &DisposeCtx<'_>, id: NodeId) -> usize {
    let order = ctx.graph.borrow().subtree_post_order(id);
    let mut disposed = 0;
    for next in order {
        let taken = {
            let mut graph = ctx.graph.borrow_mut();
            graph.get_mut(next).map(|node| {
                node.state = NodeState::Disposed;
                node.scope.cancel();
                (node.object, node.origin, node.surface.take())
            })
        };
        let Some((object, origin, surface)) = taken else {
            continue;
        };

        if let Some(surface) = surface {
            ctx.video.release_surface(object, object, surface);
        }
        match origin {
            NodeOrigin::Tracked => {
                if !ctx.instantiator.release_one(object) {
                    tracing::trace!(node = %next, ?object, "instance already released");
                }
            }
            NodeOrigin::Plain => ctx.instantiator.host().destroy(object),
        }
        ctx.graph.borrow_mut().remove(next);
        disposed += 1;
    }
    disposed
}

#[cfg(test)]
#[path = "../../tests/unit/scene/teardown.rs"]
mod tests;
