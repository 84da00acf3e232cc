use std::{collections::BTreeMap, rc::Rc};

use crate::{
    foundation::core::{HostObject, NodeId, SurfaceId},
    runtime::cancel::CancellationScope,
    scene::teardown::TeardownCoordinator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// What spec a live node was built from.
pub enum NodeKind {
    /// A page layout.
    Page,
    /// A popup layout.
    Popup,
    /// A button.
    Button,
    /// A static image.
    Image,
    /// A text label.
    Text,
    /// A video panel.
    Video,
    /// An on-screen keyboard.
    Keyboard,
}

impl NodeKind {
    /// Pages and popups, which own child nodes.
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Page | Self::Popup)
    }
}

/// Lifecycle of a live node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Spawned; content or children are still being built.
    Building,
    /// Fully built and attached.
    Active,
    /// Terminal; the node has been torn down.
    Disposed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// How the node's host object came to be, which decides how it is disposed.
pub enum NodeOrigin {
    /// Spawned from a template and tracked by the instantiator.
    Tracked,
    /// Created directly as an empty group; destroyed directly.
    Plain,
}

/// Invoked with the popup root when a popup's close affordance is activated.
#[derive(Clone)]
pub struct CloseCallback(Rc<dyn Fn(NodeId)>);

impl CloseCallback {
    /// Wrap `f` as a close callback.
    pub fn new(f: impl Fn(NodeId) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn call(&self, root: NodeId) {
        (self.0)(root)
    }
}

impl std::fmt::Debug for CloseCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CloseCallback(..)")
    }
}

#[derive(Clone, Debug)]
/// Side effect bound to a node's activation.
pub enum ClickAction {
    /// Play the sound registered under this key.
    PlaySound(String),
    /// Ask the caller to open the popup with this name.
    OpenPopup(String),
    /// Close a popup.
    ClosePopup {
        /// Root of the popup to close.
        root: NodeId,
        /// Called with `root` once the popup is torn down.
        on_close: Option<CloseCallback>,
    },
}

#[derive(Clone, Debug)]
/// Runtime instance built from exactly one spec. Children are structurally owned: disposing
/// a node disposes its subtree.
pub struct LiveNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) state: NodeState,
    pub(crate) origin: NodeOrigin,
    pub(crate) object: HostObject,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) surface: Option<SurfaceId>,
    pub(crate) actions: Vec<ClickAction>,
    pub(crate) teardown: Option<TeardownCoordinator>,
    pub(crate) failures: Vec<String>,
    /// Cancelled when the node is disposed; in-flight work on the node checks it.
    pub(crate) scope: CancellationScope,
}

impl LiveNode {
    /// Id of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Spec name the node was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spec kind the node was built from.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// How the host object was created.
    pub fn origin(&self) -> NodeOrigin {
        self.origin
    }

    /// Host object backing the node.
    pub fn object(&self) -> HostObject {
        self.object
    }

    /// Parent node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in build order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Render surface owned by this node (video panels and video-backed buttons).
    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Actions bound to the node's activation.
    pub fn actions(&self) -> &[ClickAction] {
        &self.actions
    }

    /// Children of a composite that failed to build, as `name: reason`.
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

#[derive(Debug, Default)]
/// Arena of live nodes for one engine. Disposed nodes are removed; ids are never reused,
/// so any id this graph handed out and no longer holds is known to be disposed.
pub(crate) struct SceneGraph {
    nodes: BTreeMap<NodeId, LiveNode>,
    next_id: u64,
}

impl SceneGraph {
    /// Add a `Building` node. Its scope is a child of `scope`, the scope it is built under.
    pub(crate) fn insert(
        &mut self,
        name: &str,
        kind: NodeKind,
        origin: NodeOrigin,
        object: HostObject,
        parent: Option<NodeId>,
        scope: &CancellationScope,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }
        self.nodes.insert(
            id,
            LiveNode {
                id,
                name: name.to_string(),
                kind,
                state: NodeState::Building,
                origin,
                object,
                parent,
                children: Vec::new(),
                surface: None,
                actions: Vec::new(),
                teardown: kind.is_composite().then(TeardownCoordinator::default),
                failures: Vec::new(),
                scope: scope.child(),
            },
        );
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&LiveNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut LiveNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<NodeState> {
        match self.nodes.get(&id) {
            Some(node) => Some(node.state),
            None if id.0 < self.next_id => Some(NodeState::Disposed),
            None => None,
        }
    }

    pub(crate) fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    pub(crate) fn is_live(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn set_state(&mut self, id: NodeId, state: NodeState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    /// `id` and its descendants, children before parents, siblings in reverse build order.
    pub(crate) fn subtree_post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((next, expanded)) = stack.pop() {
            let Some(node) = self.nodes.get(&next) else {
                continue;
            };
            if expanded {
                out.push(next);
                continue;
            }
            stack.push((next, true));
            for &child in &node.children {
                stack.push((child, false));
            }
        }
        out
    }

    /// Remove `id` from its parent's child list and drop it from the arena.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<LiveNode> {
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }
        Some(node)
    }

    pub(crate) fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn surfaces(&self) -> Vec<(NodeId, SurfaceId)> {
        self.nodes
            .values()
            .filter_map(|n| n.surface.map(|s| (n.id, s)))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/graph.rs"]
mod tests;
